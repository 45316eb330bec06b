//! ES384 signatures (ECDSA over P-384 with SHA-384).
//!
//! Signatures use the fixed-length `R || S` encoding (96 bytes), which is the
//! JWS form, not ASN.1 DER.

use p384::ecdsa::signature::{Signer, Verifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Length of a fixed-size ES384 signature (R || S).
pub const SIGNATURE_LENGTH: usize = 96;

/// Sign `message`, returning the 96-byte `R || S` signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
    let signature: Signature = key.sign(message);
    let mut out = [0u8; SIGNATURE_LENGTH];
    out.copy_from_slice(&signature.to_bytes());
    out
}

/// Verify an `R || S` signature over `message`.
///
/// Returns `false` for anything that is not a valid signature, including a
/// wrong length or out-of-range scalars. Never panics.
pub fn verify(key: &VerifyingKey, message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != SIGNATURE_LENGTH {
        return false;
    }
    let signature = match Signature::from_slice(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kex::EcdhP384KeyPair;

    #[test]
    fn test_sign_verify() {
        let keypair = EcdhP384KeyPair::generate().unwrap();
        let signing_key = keypair.signing_key();
        let message = b"header.payload";

        let signature = sign(&signing_key, message);
        assert!(verify(signing_key.verifying_key(), message, &signature));
    }

    #[test]
    fn test_wrong_key() {
        let signer = EcdhP384KeyPair::generate().unwrap().signing_key();
        let other = EcdhP384KeyPair::generate().unwrap().signing_key();
        let signature = sign(&signer, b"message");

        assert!(!verify(other.verifying_key(), b"message", &signature));
    }

    #[test]
    fn test_tampered_message() {
        let signer = EcdhP384KeyPair::generate().unwrap().signing_key();
        let signature = sign(&signer, b"message");

        assert!(!verify(signer.verifying_key(), b"messagf", &signature));
    }

    #[test]
    fn test_tampered_signature() {
        let signer = EcdhP384KeyPair::generate().unwrap().signing_key();
        let mut signature = sign(&signer, b"message");
        signature[10] ^= 0x80;

        assert!(!verify(signer.verifying_key(), b"message", &signature));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        let signer = EcdhP384KeyPair::generate().unwrap().signing_key();

        assert!(!verify(signer.verifying_key(), b"message", &[]));
        assert!(!verify(signer.verifying_key(), b"message", &[0u8; 95]));
        // Zero scalars are rejected without panicking.
        assert!(!verify(signer.verifying_key(), b"message", &[0u8; 96]));
        assert!(!verify(signer.verifying_key(), b"message", &[0xFF; 96]));
    }
}
