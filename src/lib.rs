//! Central-role driver for a single BLE peripheral on top of a callback-based
//! native transport.
//!
//! The [`Transport`](api::transport::Transport) trait is the seam to the native
//! stack. [`Central`] owns the connection state machine, routes pushed events
//! to the live session and serializes attribute I/O so that only one request
//! is ever outstanding on the link.

pub mod api;
pub mod central;
pub mod config;
pub mod error;
pub mod logging;

pub use central::Central;
pub use config::Config;
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
