//! Session secret derivation.
//!
//! The session key is a single SHA-256 over the per-session salt (the
//! "secret prepend") followed by the raw ECDH shared value:
//!
//! ```text
//! secret = SHA-256(salt || shared_x)
//! ```
//!
//! `shared_x` is the big-endian, fixed-width x-coordinate returned by
//! [`crate::kex::EcdhP384KeyPair::exchange`].

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of the derived session secret (AES-256 key).
pub const SESSION_SECRET_LENGTH: usize = 32;

/// Derive the 32-byte session secret from salt and raw shared value.
///
/// # Example
/// ```
/// use lg_crypto::kdf::derive_session_secret;
///
/// let secret = derive_session_secret(&[0u8; 16], &[0x42u8; 48]);
/// assert_eq!(secret.len(), 32);
/// ```
pub fn derive_session_secret(salt: &[u8], shared_secret: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(shared_secret);

    // A digest of any other length is an internal fault, not a peer error:
    // copy_from_slice panics on mismatch.
    let mut secret = Zeroizing::new([0u8; SESSION_SECRET_LENGTH]);
    secret.copy_from_slice(&hasher.finalize());
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salt() -> Vec<u8> {
        (0u8..16).collect()
    }

    #[test]
    fn test_known_answer() {
        let secret = derive_session_secret(&salt(), &[0x42u8; 48]);
        assert_eq!(
            hex::encode(*secret),
            "0a94de43f838b55a6a3032e195b1b144ddf893d48d87c9bd11c08c6eef6481ca"
        );
    }

    #[test]
    fn test_salt_changes_secret() {
        let shared = [0x42u8; 48];
        let a = derive_session_secret(&salt(), &shared);
        let b = derive_session_secret(&[0xAA; 16], &shared);
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_salt_is_prepended() {
        // Order matters: swapping salt and shared value changes the output.
        let a = derive_session_secret(b"salt", b"shared");
        let b = derive_session_secret(b"shared", b"salt");
        assert_ne!(*a, *b);
    }
}
