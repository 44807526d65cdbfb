use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reabed_core::BedConfig;
use reabed_server::BedServer;
use reabed_web::{create_router, WebState};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Reanimation bed simulator server.
#[derive(Debug, Parser)]
#[command(name = "reabed-server", version, about)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(short = 'a', long = "address")]
    address: Option<String>,

    /// Command port
    #[arg(short, long)]
    port: Option<u16>,

    /// Notification port
    #[arg(short = 'l', long = "notification-port")]
    notification_port: Option<u16>,

    /// REST API port
    #[arg(long)]
    http_port: Option<u16>,

    /// Do not start the REST API
    #[arg(long)]
    no_http: bool,

    /// Device file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Device file poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Write logs to <DIR>/reabed-server.log as well
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Load the config file, if any, and apply explicit flags over it.
    fn config(&self) -> anyhow::Result<BedConfig> {
        let mut config = match &self.config {
            Some(path) => BedConfig::load(path)?,
            None => BedConfig::default(),
        };
        if let Some(address) = &self.address {
            config.host = address.clone();
        }
        if let Some(port) = self.port {
            config.command_port = port;
        }
        if let Some(port) = self.notification_port {
            config.notify_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if self.no_http {
            config.enable_http = false;
        }
        if let Some(file) = &self.file {
            config.device_file = file.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        Ok(config)
    }
}

/// Install the global subscriber. The returned guard flushes the log file on drop.
fn init_tracing(args: &Args) -> anyhow::Result<Option<WorkerGuard>> {
    let default_filter = if args.debug {
        "debug"
    } else {
        "info,reabed_server=debug"
    };
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, "reabed-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&args)?;
    let config = args.config()?;

    tracing::info!("Reanimation bed server starting...");

    let server = BedServer::new(config.clone());
    let device = server.device();
    let bound = server.bind().await?;

    let bed_handle = tokio::spawn(async move {
        if let Err(e) = bound.serve().await {
            tracing::error!("Bed server error: {}", e);
        }
    });

    let http_handle = tokio::spawn(async move {
        if !config.enable_http {
            return std::future::pending().await;
        }
        let state = Arc::new(WebState::new(device, config.clone()));
        if let Err(e) = start_http_server(&config.http_addr(), state).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = bed_handle => {
            tracing::warn!("Bed server stopped");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Start the HTTP API server
async fn start_http_server(addr: &str, state: reabed_web::AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
