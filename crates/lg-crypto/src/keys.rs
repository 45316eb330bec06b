//! Public key encoding.
//!
//! Every public key on the wire is a DER `SubjectPublicKeyInfo`, base64
//! encoded with the standard alphabet (the `x5u` header field and the
//! `identityPublicKey` claim). Decoding distinguishes a key that is not
//! P-384 at all (`UnsupportedCurve`) from bytes that are not a valid key
//! (`InvalidPublicKey`).

use crate::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use p384::ecdsa::VerifyingKey;
use p384::pkcs8::{DecodePublicKey, EncodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};
use p384::PublicKey;

/// `id-ecPublicKey` (RFC 5480).
pub const ID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// `secp384r1` named curve (RFC 5480).
pub const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Standard alphabet, padding optional on decode.
const KEY_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a DER `SubjectPublicKeyInfo` into a P-384 public key.
///
/// # Errors
///
/// - `Error::InvalidPublicKey` if the bytes are not a well-formed key
/// - `Error::UnsupportedCurve` if the key is not an EC key on P-384
pub fn decode_public_key(der: &[u8]) -> Result<PublicKey> {
    let spki = SubjectPublicKeyInfoRef::try_from(der)
        .map_err(|e| Error::InvalidPublicKey(format!("Malformed SubjectPublicKeyInfo: {}", e)))?;

    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(Error::UnsupportedCurve(format!(
            "Key algorithm {} is not an elliptic curve key",
            spki.algorithm.oid
        )));
    }

    let curve = spki
        .algorithm
        .parameters_oid()
        .map_err(|_| Error::InvalidPublicKey("Missing named curve parameter".into()))?;
    if curve != SECP384R1 {
        return Err(Error::UnsupportedCurve(format!(
            "Named curve {} is not secp384r1",
            curve
        )));
    }

    PublicKey::from_public_key_der(der)
        .map_err(|_| Error::InvalidPublicKey("Point is not on the P-384 curve".into()))
}

/// Encode a P-384 public key as DER `SubjectPublicKeyInfo`.
pub fn encode_public_key(key: &PublicKey) -> Result<Vec<u8>> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| Error::Encoding(format!("SubjectPublicKeyInfo encoding failed: {}", e)))
}

/// Decode a base64 DER public key (the `x5u` / `identityPublicKey` form).
pub fn public_key_from_base64(encoded: &str) -> Result<PublicKey> {
    let der = decode_key_base64(encoded)?;
    decode_public_key(&der)
}

/// Decode a base64 DER public key into an ECDSA verifying key.
pub fn verifying_key_from_base64(encoded: &str) -> Result<VerifyingKey> {
    public_key_from_base64(encoded).map(VerifyingKey::from)
}

/// Encode a public key in the `x5u` form (base64 of DER, standard alphabet).
pub fn public_key_to_base64(key: &PublicKey) -> Result<String> {
    encode_public_key(key).map(|der| STANDARD.encode(der))
}

/// Decode the base64 text of a key reference into raw DER bytes.
///
/// Used to compare key references by content rather than by text, so two
/// encodings of the same key (with or without padding) match.
pub fn decode_key_base64(encoded: &str) -> Result<Vec<u8>> {
    KEY_BASE64
        .decode(encoded.trim())
        .map_err(|_| Error::InvalidPublicKey("Key reference is not valid base64".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kex::EcdhP384KeyPair;

    /// DER prefix of a P-256 SubjectPublicKeyInfo (id-ecPublicKey, prime256v1).
    const P256_SPKI_PREFIX: &str = "3059301306072a8648ce3d020106082a8648ce3d030107034200";

    #[test]
    fn test_base64_roundtrip() {
        let keypair = EcdhP384KeyPair::generate().unwrap();
        let encoded = public_key_to_base64(keypair.public_key()).unwrap();
        let decoded = public_key_from_base64(&encoded).unwrap();
        assert_eq!(&decoded, keypair.public_key());
    }

    #[test]
    fn test_unpadded_reference_accepted() {
        let keypair = EcdhP384KeyPair::generate().unwrap();
        let encoded = public_key_to_base64(keypair.public_key()).unwrap();
        let unpadded = encoded.trim_end_matches('=');
        assert!(public_key_from_base64(unpadded).is_ok());
    }

    #[test]
    fn test_reject_other_curve() {
        // Well-formed P-256 key: algorithm matches, curve does not.
        let mut der = hex::decode(P256_SPKI_PREFIX).unwrap();
        der.push(0x04);
        der.extend_from_slice(&[0x11; 64]);
        assert!(matches!(
            decode_public_key(&der),
            Err(Error::UnsupportedCurve(_))
        ));
    }

    #[test]
    fn test_reject_garbage() {
        assert!(matches!(
            decode_public_key(&[0x30, 0x03, 0x01, 0x02, 0x03]),
            Err(Error::InvalidPublicKey(_))
        ));
        assert!(matches!(
            public_key_from_base64("not base64!"),
            Err(Error::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_reject_point_off_curve() {
        let keypair = EcdhP384KeyPair::generate().unwrap();
        let mut der = encode_public_key(keypair.public_key()).unwrap();
        // Corrupt the y-coordinate; the SPKI structure stays valid.
        let last = der.len() - 1;
        der[last] ^= 0x01;
        assert!(matches!(
            decode_public_key(&der),
            Err(Error::InvalidPublicKey(_))
        ));
    }
}
