//! Server errors.

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Server errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Handshake error from core.
    #[error("Protocol error: {0}")]
    Protocol(#[from] lg_core::Error),

    /// Environment configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Session limit reached.
    #[error("Session limit of {0} reached")]
    SessionLimit(usize),

    /// A session for this endpoint already exists.
    #[error("Session already open for {0}")]
    DuplicateSession(SocketAddr),

    /// No session for this endpoint.
    #[error("No session for {0}")]
    UnknownSession(SocketAddr),

    /// Login validation task failed to run.
    #[error("Validation task failed: {0}")]
    Offload(String),
}
