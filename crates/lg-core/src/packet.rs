//! Decoded login-phase packets.
//!
//! The byte codec lives in the transport; the handshake only sees these
//! values. Everything that is not part of login arrives as
//! [`ClientPacket::Game`] and is opaque here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packets sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    /// First packet of a connection: asks for compression parameters.
    RequestNetworkSettings {
        /// Client network protocol version.
        protocol_version: u32,
    },
    /// Identity chain and client data.
    Login {
        /// Client network protocol version.
        protocol_version: u32,
        /// Binary login payload (see [`crate::login`]).
        payload: Vec<u8>,
    },
    /// Client acknowledgement of the server handshake. Empty body.
    ClientToServerHandshake,
    /// Any packet outside the login phase.
    Game(GamePacket),
}

impl ClientPacket {
    /// Whether the packet belongs to the login exchange.
    pub fn is_login_phase(&self) -> bool {
        !matches!(self, Self::Game(_))
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestNetworkSettings { .. } => "RequestNetworkSettings",
            Self::Login { .. } => "Login",
            Self::ClientToServerHandshake => "ClientToServerHandshake",
            Self::Game(_) => "Game",
        }
    }
}

/// Opaque gameplay packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePacket {
    /// Packet id.
    pub id: u32,
    /// Encoded body.
    pub body: Vec<u8>,
}

/// Packets sent by the server during login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    /// Compression parameters for the rest of the connection.
    NetworkSettings {
        /// Smallest packet size that is compressed.
        compression_threshold: u16,
        /// Compression algorithm.
        compression_algorithm: CompressionAlgorithm,
    },
    /// Signed token carrying the salt and the server ephemeral key.
    ServerToClientHandshake {
        /// Three-part signed token.
        token: String,
    },
    /// Login outcome.
    PlayStatus(PlayStatus),
}

/// Login outcome carried by a play status packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayStatus {
    /// Login accepted.
    LoginSuccess,
    /// Client is older than the server supports.
    FailedClient,
    /// Client is newer than the server supports.
    FailedServer,
}

/// Compression algorithm advertised in network settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Deflate.
    #[default]
    Flate,
    /// Snappy.
    Snappy,
    /// No compression.
    None,
}

impl CompressionAlgorithm {
    /// Wire identifier.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Flate => 0,
            Self::Snappy => 1,
            Self::None => 0xFFFF,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flate => "flate",
            Self::Snappy => "snappy",
            Self::None => "none",
        })
    }
}

impl std::str::FromStr for CompressionAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flate" | "zlib" | "deflate" => Ok(Self::Flate),
            "snappy" => Ok(Self::Snappy),
            "none" => Ok(Self::None),
            other => Err(format!("unknown compression algorithm: {}", other)),
        }
    }
}
