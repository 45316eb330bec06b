//! Packet cipher: AES-256 in counter mode, one keystream per direction.
//!
//! Both directions are keyed with the 32-byte session secret and start from
//! the same 16-byte IV:
//!
//! ```text
//! iv = secret[0..12] || 00 00 00 02
//! ```
//!
//! The two keystreams are independent objects with their own counter state.
//! Each one must be applied to packets in strict order; skipping or
//! reordering a packet desynchronises that direction for the rest of the
//! session.
//!
//! On top of the raw transform, [`Encryptor::seal`] and [`Decryptor::open`]
//! add an 8-byte integrity trailer:
//!
//! ```text
//! checksum = SHA-256(counter_le64 || plaintext || secret)[0..8]
//! wire     = CTR(plaintext || checksum)
//! ```

use crate::{Error, Result};
use aes::Aes256;
use ctr::cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Fixed suffix appended to the first 12 secret bytes to form the IV.
pub const IV_SUFFIX: [u8; 4] = [0x00, 0x00, 0x00, 0x02];

/// Length of the integrity trailer added by `seal`.
pub const CHECKSUM_LENGTH: usize = 8;

/// Construct the counter-mode IV from the session secret.
///
/// # Example
/// ```
/// use lg_crypto::cipher::construct_iv;
///
/// let iv = construct_iv(&[0x11; 32]);
/// assert_eq!(&iv[0..12], &[0x11; 12]);
/// assert_eq!(&iv[12..16], &[0, 0, 0, 2]);
/// ```
pub fn construct_iv(secret: &[u8; 32]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..12].copy_from_slice(&secret[0..12]);
    iv[12..16].copy_from_slice(&IV_SUFFIX);
    iv
}

/// Compute the 8-byte packet trailer.
pub fn packet_checksum(counter: u64, plaintext: &[u8], secret: &[u8; 32]) -> [u8; CHECKSUM_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(counter.to_le_bytes());
    hasher.update(plaintext);
    hasher.update(secret);
    let digest = hasher.finalize();

    let mut checksum = [0u8; CHECKSUM_LENGTH];
    checksum.copy_from_slice(&digest[0..CHECKSUM_LENGTH]);
    checksum
}

/// One direction of the packet cipher.
struct Keystream {
    cipher: Aes256Ctr,
    secret: Zeroizing<[u8; 32]>,
    counter: u64,
}

impl Keystream {
    fn new(secret: &[u8; 32]) -> Self {
        let iv = construct_iv(secret);
        let cipher = Aes256Ctr::new(
            GenericArray::from_slice(secret),
            GenericArray::from_slice(&iv),
        );
        Self {
            cipher,
            secret: Zeroizing::new(*secret),
            counter: 0,
        }
    }

    fn apply(&mut self, data: &mut [u8]) {
        self.cipher.apply_keystream(data);
    }

    fn next_counter(&mut self) -> u64 {
        let counter = self.counter;
        self.counter = self.counter.wrapping_add(1);
        counter
    }
}

/// Outbound (server to client) transform.
pub struct Encryptor {
    stream: Keystream,
}

impl Encryptor {
    /// Encrypt a packet body in place.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.stream.apply(data);
    }

    /// Encrypt a packet body.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut out = plaintext.to_vec();
        self.stream.apply(&mut out);
        out
    }

    /// Append the integrity trailer and encrypt.
    pub fn seal(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let counter = self.stream.next_counter();
        let checksum = packet_checksum(counter, plaintext, &self.stream.secret);

        let mut out = Vec::with_capacity(plaintext.len() + CHECKSUM_LENGTH);
        out.extend_from_slice(plaintext);
        out.extend_from_slice(&checksum);
        self.stream.apply(&mut out);
        out
    }

    /// Number of packets sealed so far.
    pub fn packets_sealed(&self) -> u64 {
        self.stream.counter
    }
}

/// Inbound (client to server) transform.
pub struct Decryptor {
    stream: Keystream,
}

impl Decryptor {
    /// Decrypt a packet body in place.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.stream.apply(data);
    }

    /// Decrypt a packet body.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        let mut out = ciphertext.to_vec();
        self.stream.apply(&mut out);
        out
    }

    /// Decrypt and check the integrity trailer, returning the plaintext.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidLength` if the packet cannot hold a trailer
    /// - `Error::ChecksumMismatch` if the trailer does not match
    ///
    /// The keystream has advanced either way; a failed packet leaves the
    /// inbound direction unusable, so callers must end the session.
    pub fn open(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < CHECKSUM_LENGTH {
            return Err(Error::InvalidLength {
                expected: CHECKSUM_LENGTH,
                actual: ciphertext.len(),
            });
        }

        let mut plaintext = ciphertext.to_vec();
        self.stream.apply(&mut plaintext);
        let trailer = plaintext.split_off(plaintext.len() - CHECKSUM_LENGTH);

        let counter = self.stream.next_counter();
        let expected = packet_checksum(counter, &plaintext, &self.stream.secret);
        if trailer != expected {
            return Err(Error::ChecksumMismatch { counter });
        }

        Ok(plaintext)
    }

    /// Number of packets opened so far.
    pub fn packets_opened(&self) -> u64 {
        self.stream.counter
    }
}

/// Negotiated crypto context of one session.
///
/// Created once, right after key agreement. The transport takes the two
/// halves with [`CryptoContext::split`]; they are never cloned.
pub struct CryptoContext {
    encryptor: Encryptor,
    decryptor: Decryptor,
}

impl CryptoContext {
    /// Build both directions from the derived session secret.
    pub fn new(secret: &[u8; 32]) -> Self {
        Self {
            encryptor: Encryptor {
                stream: Keystream::new(secret),
            },
            decryptor: Decryptor {
                stream: Keystream::new(secret),
            },
        }
    }

    /// Outbound transform.
    pub fn encryptor(&mut self) -> &mut Encryptor {
        &mut self.encryptor
    }

    /// Inbound transform.
    pub fn decryptor(&mut self) -> &mut Decryptor {
        &mut self.decryptor
    }

    /// Hand both transforms over to the transport.
    pub fn split(self) -> (Encryptor, Decryptor) {
        (self.encryptor, self.decryptor)
    }
}

impl fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encryptor")
            .field("counter", &self.stream.counter)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decryptor")
            .field("counter", &self.stream.counter)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("encryptor", &self.encryptor)
            .field("decryptor", &self.decryptor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        key
    }

    #[test]
    fn test_construct_iv() {
        let iv = construct_iv(&test_key());
        assert_eq!(hex::encode(iv), "000102030405060708090a0b00000002");
    }

    #[test]
    fn test_known_answer() {
        let mut ctx = CryptoContext::new(&test_key());
        let ciphertext = ctx.encryptor().encrypt(b"login gate");
        assert_eq!(hex::encode(ciphertext), "2b6db172abc5a57af924");
    }

    #[test]
    fn test_checksum_known_answer() {
        assert_eq!(
            hex::encode(packet_checksum(0, b"login gate", &test_key())),
            "242c0e9dd3fd4cbd"
        );
    }

    /// Encrypting outbound must not advance the inbound keystream.
    #[test]
    fn test_directions_independent() {
        let key = test_key();
        let mut server = CryptoContext::new(&key);
        let mut client = CryptoContext::new(&key);

        // Server sends three packets, client sends one.
        let out: Vec<Vec<u8>> = (0u8..3)
            .map(|i| server.encryptor().encrypt(&[i; 20]))
            .collect();
        let inbound = client.encryptor().encrypt(b"client hello");

        assert_eq!(server.decryptor().decrypt(&inbound), b"client hello");
        for (i, packet) in out.iter().enumerate() {
            assert_eq!(client.decryptor().decrypt(packet), vec![i as u8; 20]);
        }
    }

    /// Keystream continues across packets rather than restarting per packet.
    #[test]
    fn test_stream_is_sequential() {
        let mut ctx = CryptoContext::new(&test_key());
        let first = ctx.encryptor().encrypt(&[0u8; 16]);
        let second = ctx.encryptor().encrypt(&[0u8; 16]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_out_of_order_corrupts() {
        let key = test_key();
        let mut sender = CryptoContext::new(&key);
        let mut receiver = CryptoContext::new(&key);

        let _first = sender.encryptor().encrypt(b"packet a");
        let second = sender.encryptor().encrypt(b"packet b");

        assert_ne!(receiver.decryptor().decrypt(&second), b"packet b");
    }

    #[test]
    fn test_seal_open() {
        let key = test_key();
        let (mut encryptor, _) = CryptoContext::new(&key).split();
        let (_, mut decryptor) = CryptoContext::new(&key).split();

        for payload in [&b"one"[..], &b""[..], &[0xAB; 300][..]] {
            let sealed = encryptor.seal(payload);
            assert_eq!(sealed.len(), payload.len() + CHECKSUM_LENGTH);
            assert_eq!(decryptor.open(&sealed).unwrap(), payload);
        }
        assert_eq!(encryptor.packets_sealed(), 3);
        assert_eq!(decryptor.packets_opened(), 3);
    }

    #[test]
    fn test_open_rejects_tampering() {
        let key = test_key();
        let (mut encryptor, _) = CryptoContext::new(&key).split();
        let (_, mut decryptor) = CryptoContext::new(&key).split();

        let mut sealed = encryptor.seal(b"payload");
        sealed[0] ^= 0x01;
        assert!(matches!(
            decryptor.open(&sealed),
            Err(Error::ChecksumMismatch { counter: 0 })
        ));
    }

    #[test]
    fn test_open_rejects_short_packet() {
        let (_, mut decryptor) = CryptoContext::new(&test_key()).split();
        assert!(matches!(
            decryptor.open(&[0u8; 4]),
            Err(Error::InvalidLength { .. })
        ));
    }
}
