//! # reabed-web
//!
//! REST API for the reanimation bed server.
//!
//! The REST layer is a thin façade over the same [`Device`] the command
//! server uses: reads return the current state, writes go through the set
//! path (validate, then rewrite the backing file). It takes no part in the
//! subscription protocol; subscribers learn about REST writes once the
//! ingestor picks them up.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reabed_web::{create_router, WebState};
//!
//! let state = WebState::new(server.device(), config.clone());
//! let app = create_router(Arc::new(state));
//!
//! let listener = TcpListener::bind(config.http_addr()).await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod routes;

// Re-exports
pub use routes::create_router;

use std::sync::Arc;

use reabed_core::BedConfig;
use reabed_server::Device;

/// Shared state for all route handlers.
pub struct WebState {
    pub device: Arc<Device>,
    pub config: BedConfig,
}

impl WebState {
    pub fn new(device: Arc<Device>, config: BedConfig) -> Self {
        Self { device, config }
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<WebState>;
