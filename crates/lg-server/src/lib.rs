//! Async driver for login gate sessions.
//!
//! Hosts many concurrent handshakes on a tokio runtime:
//! - [`SessionRegistry`] maps client endpoints to connections
//! - [`Connection`] serialises packets for one session and offloads login
//!   validation to the blocking pool
//! - [`ServerConfig`] reads policy from `LG_*` environment variables
//!
//! Framing, compression and the socket itself belong to the transport that
//! implements [`lg_core::traits::SessionTransport`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;

pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use registry::SessionRegistry;
