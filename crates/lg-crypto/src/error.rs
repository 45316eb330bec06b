//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Public key could not be decoded or is not a valid curve point.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Public key is valid but belongs to a curve other than P-384.
    #[error("Unsupported curve: {0}")]
    UnsupportedCurve(String),

    /// Invalid private key.
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid key length.
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(String),

    /// Key encoding failed.
    #[error("Key encoding failed: {0}")]
    Encoding(String),

    /// Packet trailer did not match the decrypted contents.
    #[error("Packet checksum mismatch (counter {counter})")]
    ChecksumMismatch {
        /// Receive counter of the rejected packet.
        counter: u64,
    },

    /// Packet too short to carry a checksum trailer.
    #[error("Invalid input length: expected at least {expected}, got {actual}")]
    InvalidLength {
        /// Minimum length in bytes.
        expected: usize,
        /// Actual length received in bytes.
        actual: usize,
    },
}
