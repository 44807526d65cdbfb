//! Error types for the server crate.
//!
//! None of these are fatal to the process: each is handled inside the unit
//! of work that produced it (one request, one poll pass, one connection).

use std::path::PathBuf;

use reabed_core::ValidationError;
use thiserror::Error;

/// A set operation could not be completed.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A value was out of range; nothing was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backing file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The ingestor could not read its source this pass.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("device file {} unavailable: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The server could not start.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}
