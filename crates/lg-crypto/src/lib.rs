//! Cryptographic primitives for the login gate handshake.
//!
//! This crate implements the cryptography the server needs to establish a
//! secure game session:
//! - Key agreement (ECDH over NIST P-384, ephemeral per session)
//! - Token signatures (ECDSA P-384 with SHA-384, "ES384")
//! - Session secret derivation (SHA-256 over salt and shared value)
//! - Packet cipher (AES-256 in counter mode, one instance per direction)
//!
//! All implementations follow the same rules:
//! - No unsafe code
//! - Secrets use Zeroizing wrappers
//! - No logging of key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agreement;
pub mod cipher;
pub mod error;
pub mod kdf;
pub mod kex;
pub mod keys;
pub mod sign;

pub use agreement::{negotiate, Negotiated};
pub use cipher::{CryptoContext, Decryptor, Encryptor};
pub use error::{Error, Result};
pub use kex::EcdhP384KeyPair;
