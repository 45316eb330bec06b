//! Login payload framing.
//!
//! ```text
//! certChainLength  u32 BE
//! certChainJson    {"chain": [token, token, ...]}
//! skinTokenLength  u32 BE
//! skinToken        three-part token
//! ```
//!
//! Both strings must be UTF-8. Trailing bytes after the skin token are
//! rejected.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Decoded login payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Identity chain tokens, in the order sent.
    pub chain: Vec<String>,
    /// Skin token (client data).
    pub client_data: String,
}

#[derive(Serialize, Deserialize)]
struct ChainEnvelope {
    chain: Vec<String>,
}

impl LoginRequest {
    /// Decode a login payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedLogin` on truncated or oversized length
    /// prefixes, non-UTF-8 strings, chain JSON without a `chain` array, or
    /// trailing bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (chain_json, rest) = read_field(data, "certificate chain")?;
        let (skin_token, rest) = read_field(rest, "skin token")?;
        if !rest.is_empty() {
            return Err(Error::MalformedLogin(format!(
                "{} trailing bytes after skin token",
                rest.len()
            )));
        }

        let envelope: ChainEnvelope = serde_json::from_slice(chain_json)
            .map_err(|e| Error::MalformedLogin(format!("certificate chain JSON: {}", e)))?;
        let client_data = std::str::from_utf8(skin_token)
            .map_err(|_| Error::MalformedLogin("skin token is not UTF-8".into()))?
            .to_string();

        Ok(Self {
            chain: envelope.chain,
            client_data,
        })
    }

    /// Encode a login payload.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedLogin` if a field exceeds `u32::MAX` bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let chain_json = serde_json::to_vec(&ChainEnvelope {
            chain: self.chain.clone(),
        })
        .map_err(|e| Error::MalformedLogin(format!("certificate chain JSON: {}", e)))?;

        let mut out = Vec::with_capacity(8 + chain_json.len() + self.client_data.len());
        write_field(&mut out, &chain_json)?;
        write_field(&mut out, self.client_data.as_bytes())?;
        Ok(out)
    }
}

fn read_field<'a>(data: &'a [u8], name: &str) -> Result<(&'a [u8], &'a [u8])> {
    check_len(data, 4, name)?;
    let length = read_u32_be(&data[0..4]) as usize;
    let body = &data[4..];
    check_len(body, length, name)?;
    Ok((&body[..length], &body[length..]))
}

fn write_field(out: &mut Vec<u8>, field: &[u8]) -> Result<()> {
    let length = u32::try_from(field.len())
        .map_err(|_| Error::MalformedLogin("field longer than u32::MAX".into()))?;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(field);
    Ok(())
}

#[inline]
fn check_len(data: &[u8], needed: usize, name: &str) -> Result<()> {
    if data.len() < needed {
        Err(Error::MalformedLogin(format!(
            "{} truncated: need {} bytes, have {}",
            name,
            needed,
            data.len()
        )))
    } else {
        Ok(())
    }
}

#[inline]
fn read_u32_be(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}
