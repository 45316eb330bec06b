//! Error types for login handshake operations.

use std::fmt;
use thiserror::Error;

/// Result type alias for login handshake operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Handshake errors.
///
/// Every variant is terminal for the session that produced it. The text of
/// an error is for logs only; clients see [`DisconnectReason`].
#[derive(Debug, Error)]
pub enum Error {
    /// Login payload framing or chain JSON is malformed.
    #[error("Malformed login: {0}")]
    MalformedLogin(String),

    /// Token is not three base64url segments with JSON header and payload.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Chain does not reach the trust anchor or a signature check failed.
    #[error("Untrusted chain: {0}")]
    UntrustedChain(String),

    /// Chain verified but carries no identity payload.
    #[error("Chain carries no identity claims")]
    NoIdentityClaims,

    /// Client public key is not on the expected curve.
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// Client public key is malformed.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Protocol version outside the supported range.
    #[error("Protocol version {protocol} outside supported range {min}..={max}")]
    VersionMismatch {
        /// Version sent by the client.
        protocol: u32,
        /// Lowest supported version.
        min: u32,
        /// Highest supported version.
        max: u32,
    },

    /// Policy requires a platform account and the identity has none.
    #[error("Platform authentication required")]
    PlatformAuthRequired,

    /// Login-phase packet received in the wrong state.
    #[error("Unexpected packet: {0}")]
    UnexpectedPacket(String),

    /// Internal cryptographic failure.
    #[error("Crypto error: {0}")]
    Crypto(lg_crypto::Error),
}

impl Error {
    /// Client-visible reason for this error.
    pub fn disconnect_reason(&self) -> DisconnectReason {
        match self {
            Self::MalformedLogin(_) | Self::MalformedToken(_) => DisconnectReason::InvalidLogin,
            Self::UntrustedChain(_) | Self::NoIdentityClaims => DisconnectReason::InvalidIdentity,
            Self::UnsupportedCurve(_) | Self::InvalidPublicKey(_) => {
                DisconnectReason::EncryptionFailed
            }
            Self::VersionMismatch { .. } => DisconnectReason::VersionMismatch,
            Self::PlatformAuthRequired => DisconnectReason::PlatformAuthRequired,
            Self::UnexpectedPacket(_) => DisconnectReason::ProtocolViolation,
            Self::Crypto(_) => DisconnectReason::InternalError,
        }
    }
}

impl From<lg_crypto::Error> for Error {
    fn from(err: lg_crypto::Error) -> Self {
        match err {
            lg_crypto::Error::InvalidPublicKey(msg) => Self::InvalidPublicKey(msg),
            lg_crypto::Error::UnsupportedCurve(msg) => Self::UnsupportedCurve(msg),
            other => Self::Crypto(other),
        }
    }
}

/// Closed set of disconnect reasons shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// Protocol version not supported.
    VersionMismatch,
    /// Platform account required.
    PlatformAuthRequired,
    /// Login payload could not be read.
    InvalidLogin,
    /// Identity chain rejected.
    InvalidIdentity,
    /// Key agreement failed.
    EncryptionFailed,
    /// Packet out of sequence.
    ProtocolViolation,
    /// Server-side failure.
    InternalError,
}

impl DisconnectReason {
    /// Message sent with the disconnect.
    pub fn message(self) -> &'static str {
        match self {
            Self::VersionMismatch => "wrong version",
            Self::PlatformAuthRequired => "you must authenticate to Xbox Live to join this server",
            Self::InvalidLogin => "invalid login data",
            Self::InvalidIdentity => "invalid identity chain",
            Self::EncryptionFailed => "encryption negotiation failed",
            Self::ProtocolViolation => "unexpected packet during login",
            Self::InternalError => "internal server error",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
