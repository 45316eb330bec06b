//! ECDH-P384 key exchange.
//!
//! The server generates one ephemeral P-384 keypair per session. The same
//! keypair performs the Diffie-Hellman exchange with the client's identity
//! key and signs the handshake token whose `x5u` header advertises it.
//!
//! # Security
//!
//! - The secret key is zeroed on drop (`p384::SecretKey` implements
//!   `ZeroizeOnDrop`) and the raw shared value is wrapped in `Zeroizing<>`.
//! - Peer keys are `p384::PublicKey` values, which are validated curve points
//!   by construction; decoding from the wire happens in [`crate::keys`].
//!
//! # Example
//!
//! ```
//! use lg_crypto::kex::EcdhP384KeyPair;
//!
//! # fn example() -> Result<(), lg_crypto::Error> {
//! let server = EcdhP384KeyPair::generate()?;
//! let client = EcdhP384KeyPair::generate()?;
//!
//! let server_shared = server.exchange(client.public_key());
//! let client_shared = client.exchange(server.public_key());
//!
//! assert_eq!(*server_shared, *client_shared);
//! # Ok(())
//! # }
//! ```

use crate::keys;
use crate::{Error, Result};
use p384::ecdh::diffie_hellman;
use p384::ecdsa::SigningKey;
use p384::{PublicKey, SecretKey};
use zeroize::Zeroizing;

/// Size of a P-384 scalar and of the raw shared value (x-coordinate).
pub const P384_FIELD_SIZE: usize = 48;

/// ECDH-P384 key pair.
///
/// Holds the secret scalar and caches the DER encoding of the public key,
/// which is what goes into the `x5u` header of the server's token.
pub struct EcdhP384KeyPair {
    /// Secret key (48 bytes), zeroed on drop.
    secret_key: SecretKey,
    /// Public key.
    public_key: PublicKey,
    /// DER `SubjectPublicKeyInfo` of the public key, cached.
    public_key_der: Vec<u8>,
}

impl EcdhP384KeyPair {
    /// Generate a new random P-384 keypair using the OS RNG.
    ///
    /// # Errors
    ///
    /// Only fails if the public key cannot be DER-encoded, which does not
    /// happen for valid keys.
    pub fn generate() -> Result<Self> {
        let secret_key = SecretKey::random(&mut rand::rngs::OsRng);
        Self::from_secret(secret_key)
    }

    /// Create a keypair from an existing 48-byte big-endian private scalar.
    ///
    /// Used for fixtures with known test vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is wrong or the scalar is zero or not
    /// below the curve order.
    pub fn from_private(private_key: &[u8]) -> Result<Self> {
        if private_key.len() != P384_FIELD_SIZE {
            return Err(Error::InvalidKeyLength(format!(
                "P-384 private key must be {} bytes, got {}",
                P384_FIELD_SIZE,
                private_key.len()
            )));
        }

        let secret_key = SecretKey::from_slice(private_key)
            .map_err(|_| Error::InvalidPrivateKey("Invalid P-384 private key".into()))?;

        Self::from_secret(secret_key)
    }

    fn from_secret(secret_key: SecretKey) -> Result<Self> {
        let public_key = secret_key.public_key();
        let public_key_der = keys::encode_public_key(&public_key)?;

        Ok(Self {
            secret_key,
            public_key,
            public_key_der,
        })
    }

    /// Public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Public key as DER `SubjectPublicKeyInfo`.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// ECDSA signing key backed by the same secret scalar.
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret_key)
    }

    /// Perform P-384 ECDH with a peer's public key.
    ///
    /// Returns the raw shared value: the x-coordinate of the product point,
    /// big-endian and left-padded to 48 bytes.
    pub fn exchange(&self, peer_public: &PublicKey) -> Zeroizing<[u8; P384_FIELD_SIZE]> {
        let shared_secret =
            diffie_hellman(self.secret_key.to_nonzero_scalar(), peer_public.as_affine());

        let mut result = [0u8; P384_FIELD_SIZE];
        result.copy_from_slice(shared_secret.raw_secret_bytes().as_slice());

        Zeroizing::new(result)
    }
}
