//! # reabed-core
//!
//! Core data model and state store for the reanimation bed simulator.
//!
//! This crate provides:
//! - Data model types (DeviceState, Angles, Field, Topic)
//! - Range validation with typed errors
//! - The backing file record codec
//! - In-memory store implementation
//! - Configuration types
//!
//! This crate is intentionally runtime-agnostic and contains no async code
//! and no I/O besides reading the configuration file.

pub mod config;
pub mod model;
pub mod record;
pub mod store;

pub use config::{BedConfig, ConfigError};
pub use model::*;
pub use record::RecordError;
pub use store::{MemoryStore, StateStore};
