//! # reabed-server
//!
//! Runtime side of the reanimation bed simulator, built on tokio:
//! - [`Device`]: the shared server context owning the state store, the
//!   subscriber registry and the backing file
//! - [`Ingestor`]: polls the backing file and applies changes
//! - Command server: `get_*` / `set_*` requests on one port
//! - Notification server: subscriptions and pushes on a second port
//! - [`BedServer`]: binds both ports and runs everything

pub mod command;
pub mod device;
pub mod error;
pub mod ingestor;
pub mod notification;
pub mod server;
pub mod subscription;

pub use device::Device;
pub use error::{DeviceError, IngestError, ServerError};
pub use ingestor::Ingestor;
pub use reabed_core::{Angles, BedConfig, DeviceState, Topic};
pub use server::{BedServer, BoundServer};
pub use subscription::{ConnectionId, Subscriber, SubscriberRegistry};
