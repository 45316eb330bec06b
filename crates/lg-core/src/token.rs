//! Signed token codec.
//!
//! ```text
//! base64url(header_json) "." base64url(payload_json) "." base64url(signature)
//! ```
//!
//! Chain tokens and the server handshake token are signed with ES384 and
//! carry the signer's public key in the header's `x5u` field (base64 DER).
//! The skin token uses the same layout but its header is opaque.
//!
//! Parsing and verifying are separate steps: [`parse`] checks structure and
//! decodes the payload into a typed value, [`Token::verify`] checks the
//! signature and reports failure as `false`.

use crate::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use lg_crypto::sign as es384;
use p384::ecdsa::{SigningKey, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Signature algorithm written into every header this crate produces.
pub const ALGORITHM: &str = "ES384";

/// URL-safe alphabet, padding optional on decode.
const SEGMENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Token header.
///
/// Both named fields are optional so the opaque skin token header parses
/// too; chain validation enforces `x5u` itself. Any other field lands in
/// `extra` and is written back when signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Signer public key, base64 DER.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
    /// Remaining header fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A parsed, not yet verified, token.
#[derive(Debug, Clone)]
pub struct Token<P> {
    header: TokenHeader,
    payload: P,
    signing_input: String,
    signature: Vec<u8>,
}

impl<P> Token<P> {
    /// Header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Embedded public key reference, if any.
    pub fn key_ref(&self) -> Option<&str> {
        self.header.x5u.as_deref()
    }

    /// Decoded payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Take the decoded payload.
    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Raw signature bytes.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Verify the signature against `key`.
    ///
    /// Recomputes the signing input (`header "." payload` as sent) and
    /// checks the `R || S` signature. Never panics; any malformed signature
    /// yields `false`.
    pub fn verify(&self, key: &VerifyingKey) -> bool {
        es384::verify(key, self.signing_input.as_bytes(), &self.signature)
    }
}

/// Parse a token and decode its payload as `P`.
///
/// # Errors
///
/// Returns `Error::MalformedToken` if the token does not have exactly three
/// segments, a segment is not base64url, or the header or payload is not
/// JSON of the expected shape.
pub fn parse<P: DeserializeOwned>(token: &str) -> Result<Token<P>> {
    let mut segments = token.trim().split('.');
    let (header_b64, payload_b64, signature_b64) =
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => {
                return Err(Error::MalformedToken(
                    "expected three dot-separated segments".into(),
                ))
            }
        };

    let header_json = decode_segment(header_b64, "header")?;
    let payload_json = decode_segment(payload_b64, "payload")?;
    let signature = decode_segment(signature_b64, "signature")?;

    let header: TokenHeader = serde_json::from_slice(&header_json)
        .map_err(|e| Error::MalformedToken(format!("header is not valid JSON: {}", e)))?;
    let payload: P = serde_json::from_slice(&payload_json)
        .map_err(|e| Error::MalformedToken(format!("payload is not valid JSON: {}", e)))?;

    Ok(Token {
        header,
        payload,
        signing_input: format!("{}.{}", header_b64, payload_b64),
        signature,
    })
}

/// Sign `payload` with ES384, embedding `x5u` in the header.
///
/// # Errors
///
/// Returns `Error::MalformedToken` if the payload cannot be serialised.
pub fn sign<P: Serialize>(payload: &P, key: &SigningKey, x5u: &str) -> Result<String> {
    let header = TokenHeader {
        x5u: Some(x5u.to_string()),
        ..Default::default()
    };
    sign_with_header(payload, key, header)
}

/// Sign `payload` with ES384 under a caller-built header.
///
/// `alg` is always overwritten with [`ALGORITHM`]; every other field,
/// including `extra`, is written as given.
///
/// # Errors
///
/// Returns `Error::MalformedToken` if the header or payload cannot be
/// serialised.
pub fn sign_with_header<P: Serialize>(
    payload: &P,
    key: &SigningKey,
    mut header: TokenHeader,
) -> Result<String> {
    header.alg = Some(ALGORITHM.to_string());

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| Error::MalformedToken(format!("header serialisation failed: {}", e)))?;
    let payload_json = serde_json::to_vec(payload)
        .map_err(|e| Error::MalformedToken(format!("payload serialisation failed: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload_json)
    );
    let signature = es384::sign(key, signing_input.as_bytes());

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    SEGMENT_BASE64
        .decode(segment)
        .map_err(|_| Error::MalformedToken(format!("{} segment is not base64url", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lg_crypto::EcdhP384KeyPair;
    use serde_json::Value;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Claims {
        name: String,
        level: u32,
    }

    fn claims() -> Claims {
        Claims {
            name: "Steve".into(),
            level: 7,
        }
    }

    fn signer() -> (SigningKey, String) {
        let keypair = EcdhP384KeyPair::generate().unwrap();
        let x5u = lg_crypto::keys::public_key_to_base64(keypair.public_key()).unwrap();
        (keypair.signing_key(), x5u)
    }

    #[test]
    fn test_sign_parse_verify() {
        let (key, x5u) = signer();
        let token = sign(&claims(), &key, &x5u).unwrap();

        let parsed: Token<Claims> = parse(&token).unwrap();
        assert_eq!(parsed.payload(), &claims());
        assert_eq!(parsed.key_ref(), Some(x5u.as_str()));
        assert_eq!(parsed.header().alg.as_deref(), Some(ALGORITHM));
        assert_eq!(parsed.signature().len(), es384::SIGNATURE_LENGTH);
        assert!(parsed.verify(key.verifying_key()));
    }

    #[test]
    fn test_extra_header_fields_survive() {
        let (key, x5u) = signer();
        let mut header = TokenHeader {
            alg: Some("none".into()),
            x5u: Some(x5u.clone()),
            ..Default::default()
        };
        header.extra.insert("kid".into(), Value::from("session-1"));
        header.extra.insert("typ".into(), Value::from("JWT"));

        let token = sign_with_header(&claims(), &key, header).unwrap();
        let parsed: Token<Claims> = parse(&token).unwrap();

        assert_eq!(parsed.header().alg.as_deref(), Some(ALGORITHM));
        assert_eq!(parsed.key_ref(), Some(x5u.as_str()));
        assert_eq!(parsed.header().extra.get("kid"), Some(&Value::from("session-1")));
        assert_eq!(parsed.header().extra.get("typ"), Some(&Value::from("JWT")));
        assert!(parsed.verify(key.verifying_key()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let (key, x5u) = signer();
        let (other, _) = signer();
        let token = sign(&claims(), &key, &x5u).unwrap();

        let parsed: Token<Claims> = parse(&token).unwrap();
        assert!(!parsed.verify(other.verifying_key()));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let (key, x5u) = signer();
        let token = sign(&claims(), &key, &x5u).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(br#"{"name":"Alex","level":7}"#);
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        let parsed: Token<Claims> = parse(&tampered).unwrap();
        assert!(!parsed.verify(key.verifying_key()));
    }

    #[test]
    fn test_tampered_signature_fails() {
        let (key, x5u) = signer();
        let token = sign(&claims(), &key, &x5u).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut signature = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        signature[40] ^= 0x01;
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            parts[1],
            URL_SAFE_NO_PAD.encode(signature)
        );

        let parsed: Token<Claims> = parse(&tampered).unwrap();
        assert!(!parsed.verify(key.verifying_key()));
    }

    #[test]
    fn test_short_signature_is_false_not_error() {
        let (key, x5u) = signer();
        let token = sign(&claims(), &key, &x5u).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let truncated = format!("{}.{}.AAAA", parts[0], parts[1]);

        let parsed: Token<Claims> = parse(&truncated).unwrap();
        assert!(!parsed.verify(key.verifying_key()));
    }

    #[test]
    fn test_segment_count() {
        for bad in ["", "a", "a.b", "a.b.c.d", "..."] {
            assert!(
                matches!(parse::<Value>(bad), Err(Error::MalformedToken(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_non_json_segments() {
        let not_json = URL_SAFE_NO_PAD.encode(b"not json");
        let json = URL_SAFE_NO_PAD.encode(b"{}");

        let bad_header = format!("{}.{}.", not_json, json);
        assert!(matches!(
            parse::<Value>(&bad_header),
            Err(Error::MalformedToken(_))
        ));

        let bad_payload = format!("{}.{}.", json, not_json);
        assert!(matches!(
            parse::<Value>(&bad_payload),
            Err(Error::MalformedToken(_))
        ));

        let bad_base64 = format!("{}.{}.", json, "***");
        assert!(matches!(
            parse::<Value>(&bad_base64),
            Err(Error::MalformedToken(_))
        ));
    }

    #[test]
    fn test_padded_segments_accepted() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES384"}"#);
        // Padded encoding of a 14-byte payload.
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"level":1234}"#);
        let token = format!("{}.{}.", header, payload);

        let parsed: Token<Value> = parse(&token).unwrap();
        assert_eq!(parsed.payload()["level"], 1234);
        assert!(parsed.signature().is_empty());
    }

    #[test]
    fn test_opaque_header() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","kid":"x"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br#"{"name":"Steve","level":1}"#);
        let token = format!("{}.{}.", header, payload);

        let parsed: Token<Claims> = parse(&token).unwrap();
        assert_eq!(parsed.key_ref(), None);
        assert_eq!(parsed.payload().name, "Steve");
    }
}
