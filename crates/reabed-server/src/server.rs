//! Reanimation bed server.
//!
//! This module wires the pieces together:
//! - binds the command and notification ports
//! - creates the backing file if needed
//! - spawns the ingestor and both accept loops

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reabed_core::BedConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::device::Device;
use crate::error::ServerError;
use crate::ingestor::Ingestor;
use crate::{command, notification};

/// The reanimation bed server.
pub struct BedServer {
    config: BedConfig,
    device: Arc<Device>,
}

impl BedServer {
    /// Create a new server with the given configuration.
    pub fn new(config: BedConfig) -> Self {
        let device = Arc::new(Device::new(config.device_file.clone()));
        Self { config, device }
    }

    /// Shared device context, for collaborators such as the REST façade.
    pub fn device(&self) -> Arc<Device> {
        self.device.clone()
    }

    pub fn config(&self) -> &BedConfig {
        &self.config
    }

    /// Bind both listening ports.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let command = bind(&self.config.command_addr()).await?;
        let notify = bind(&self.config.notify_addr()).await?;
        Ok(BoundServer {
            command,
            notify,
            device: self.device,
            poll_interval: self.config.poll_interval(),
        })
    }

    /// Bind and serve until one of the long-lived tasks stops.
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.serve().await
    }
}

async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// A server whose ports are bound but not yet served.
pub struct BoundServer {
    command: TcpListener,
    notify: TcpListener,
    device: Arc<Device>,
    poll_interval: Duration,
}

impl BoundServer {
    pub fn command_addr(&self) -> std::io::Result<SocketAddr> {
        self.command.local_addr()
    }

    pub fn notify_addr(&self) -> std::io::Result<SocketAddr> {
        self.notify.local_addr()
    }

    pub fn device(&self) -> Arc<Device> {
        self.device.clone()
    }

    /// Serve both ports and run the ingestor.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.device.ensure_backing_file().await?;

        if let Ok(addr) = self.command.local_addr() {
            info!("Command server listening on {}", addr);
        }
        if let Ok(addr) = self.notify.local_addr() {
            info!("Notification server listening on {}", addr);
        }

        let ingestor = Ingestor::new(self.device.clone(), self.poll_interval);
        let ingest_handle = tokio::spawn(ingestor.run());
        let command_handle = tokio::spawn(command::accept_loop(self.command, self.device.clone()));
        let notify_handle = tokio::spawn(notification::accept_loop(
            self.notify,
            self.device.clone(),
        ));

        tokio::select! {
            _ = ingest_handle => warn!("Ingestor stopped"),
            _ = command_handle => warn!("Command server stopped"),
            _ = notify_handle => warn!("Notification server stopped"),
        }

        Ok(())
    }
}
