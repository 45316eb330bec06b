//! Key exchange implementations.
//!
//! Implements:
//! - ECDH-P384 (NIST SP 800-56A), the curve of the client identity keys

pub mod ecdh_p384;

pub use self::ecdh_p384::EcdhP384KeyPair;
