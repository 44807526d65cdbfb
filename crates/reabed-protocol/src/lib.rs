//! # reabed-protocol
//!
//! Message types and line codec for the two TCP protocols:
//! - Command port: `get_*` / `set_*` request/response exchanges
//! - Notification port: `subscribe_*` / `unsubscribe_*` control messages
//!   and `!Notify!` pushes

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
