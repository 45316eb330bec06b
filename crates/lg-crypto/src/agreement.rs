//! Per-session key agreement.
//!
//! Given the client's identity public key, the server:
//! 1. generates a fresh ephemeral P-384 keypair,
//! 2. generates a fresh random salt,
//! 3. computes the raw ECDH value with the client key,
//! 4. derives `secret = SHA-256(salt || raw)`.
//!
//! Nothing is reused across sessions. There is no retry: a failed
//! negotiation ends the session.

use crate::kdf::derive_session_secret;
use crate::kex::EcdhP384KeyPair;
use crate::keys;
use crate::{CryptoContext, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use p384::PublicKey;
use rand::RngCore;
use zeroize::Zeroizing;

/// Length of the per-session salt.
pub const SALT_LENGTH: usize = 16;

/// Outcome of a successful negotiation.
pub struct Negotiated {
    keypair: EcdhP384KeyPair,
    secret: Zeroizing<[u8; 32]>,
    salt: [u8; SALT_LENGTH],
}

impl Negotiated {
    /// Server ephemeral keypair (signs the handshake token).
    pub fn keypair(&self) -> &EcdhP384KeyPair {
        &self.keypair
    }

    /// Derived 32-byte session secret.
    pub fn secret(&self) -> &[u8; 32] {
        &self.secret
    }

    /// Salt sent to the client.
    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    /// Salt in the form carried by the handshake token payload.
    pub fn salt_base64(&self) -> String {
        STANDARD.encode(self.salt)
    }

    /// Build the per-direction cipher pair from the derived secret.
    pub fn crypto_context(&self) -> CryptoContext {
        CryptoContext::new(&self.secret)
    }
}

/// Negotiate a session secret with a client identity key (base64 DER).
///
/// # Errors
///
/// - `Error::InvalidPublicKey` if the client key is malformed
/// - `Error::UnsupportedCurve` if the client key is not on P-384
pub fn negotiate(client_public_key: &str) -> Result<Negotiated> {
    let client_key = keys::public_key_from_base64(client_public_key)?;
    let keypair = EcdhP384KeyPair::generate()?;

    let mut salt = [0u8; SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    Ok(negotiate_with(keypair, &client_key, salt))
}

/// Negotiate with caller-supplied ephemeral keypair and salt.
///
/// Deterministic for fixed inputs; used by fixtures and known-answer tests.
pub fn negotiate_with(
    keypair: EcdhP384KeyPair,
    client_key: &PublicKey,
    salt: [u8; SALT_LENGTH],
) -> Negotiated {
    let shared = keypair.exchange(client_key);
    let secret = derive_session_secret(&salt, &*shared);

    Negotiated {
        keypair,
        secret,
        salt,
    }
}

/// Client half: derive the same secret from the server's advertised key.
pub fn derive_peer_secret(
    own: &EcdhP384KeyPair,
    server_key: &PublicKey,
    salt: &[u8],
) -> Zeroizing<[u8; 32]> {
    let shared = own.exchange(server_key);
    derive_session_secret(salt, &*shared)
}
