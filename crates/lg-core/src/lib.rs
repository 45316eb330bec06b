//! Server-side login handshake for the login gate protocol.
//!
//! This crate turns an unauthenticated connection into a player session:
//! - Protocol version gating and network settings
//! - Identity chain validation against a trust anchor
//! - Client data (skin token) decoding
//! - Key agreement and packet cipher hand-off
//! - Exactly-once player creation
//!
//! No I/O happens here. Transports and gameplay plug in through
//! [`traits`]; `lg-server` drives many sessions on a tokio runtime.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod client_data;
pub mod config;
pub mod error;
pub mod guard;
pub mod handshake;
pub mod identity;
pub mod login;
pub mod mock;
pub mod packet;
pub mod session;
pub mod token;
pub mod traits;

pub use chain::{ChainValidator, TrustAnchor, TrustLevel, ValidatedChain};
pub use client_data::{AppearanceBlob, ClientData};
pub use config::{HandshakeConfig, LoginPolicy};
pub use error::{DisconnectReason, Error, Result};
pub use handshake::{Action, HandshakeState, LoginHandshake, PendingLogin, ValidatedLogin};
pub use identity::{IdentityClaims, PlayerIdentity};
pub use login::LoginRequest;
pub use packet::{ClientPacket, PlayStatus, ServerPacket};
pub use session::Session;
pub use traits::{MessageHandler, PlayerFactory, SessionTransport};
