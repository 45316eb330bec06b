//! Identity chain validation.
//!
//! A login carries an ordered list of signed tokens. Walking them in the
//! order sent:
//!
//! 1. Every token is parsed up front; one malformed token rejects the chain.
//! 2. Until trust is established, each token's `x5u` is compared with the
//!    trust anchor. A match makes the chain **rooted** and the token must
//!    verify against the anchor. Otherwise a single-token chain is
//!    **self-signed** and must verify against its own `x5u`. Otherwise the
//!    token is a client-supplied root: it must verify against its own
//!    `x5u`, then it is skipped.
//! 3. Once trusted, each later token must verify against the
//!    `identityPublicKey` of the previous verified token.
//! 4. The first verified token carrying `extraData` supplies the identity
//!    and ends the chain. Any token after it is rejected, since it could
//!    only be signed by the client's own identity key. A self-signed chain
//!    never keeps its XUID.
//!
//! The anchor is checked before the single-token fallback, so a one-token
//! chain signed by the anchor is rooted.

use crate::config::LoginPolicy;
use crate::identity::{IdentityClaims, IdentityData};
use crate::token::{self, Token};
use crate::{Error, Result};
use lg_crypto::keys;
use p384::ecdsa::VerifyingKey;
use serde::Deserialize;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Platform root public key (base64 DER, secp384r1).
pub const PLATFORM_ROOT_KEY: &str = "MHYwEAYHKoZIzj0CAQYFK4EEACIDYgAECRXueJeTDqNRRgJi/vlRufByu/2G0i2Ebt6YMar5QX/R0DIIyrJMcUpruK4QveTfJSTp3Shlq4Gk34cD/4GUWwkv0DVuzeuB+tXija7HBxii03NHDbPAD0AKnLr2wdAp";

/// The one key identity chains must lead back to.
///
/// Built once at startup and shared read-only; compared by decoded DER so
/// textual differences in the base64 (padding) do not matter.
#[derive(Clone)]
pub struct TrustAnchor {
    der: Vec<u8>,
    key: VerifyingKey,
}

impl TrustAnchor {
    /// Anchor from a base64 DER public key.
    ///
    /// # Errors
    ///
    /// `Error::InvalidPublicKey` or `Error::UnsupportedCurve` if the key does
    /// not decode to a P-384 key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let der = keys::decode_key_base64(encoded)?;
        Self::from_der(&der)
    }

    /// Anchor from a DER public key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let public_key = keys::decode_public_key(der)?;
        Ok(Self {
            der: der.to_vec(),
            key: VerifyingKey::from(public_key),
        })
    }

    /// The platform root key.
    pub fn platform_root() -> Result<Self> {
        Self::from_base64(PLATFORM_ROOT_KEY)
    }

    /// Whether a token's key reference names this anchor.
    pub fn matches(&self, key_ref: &str) -> bool {
        keys::decode_key_base64(key_ref)
            .map(|der| der == self.der)
            .unwrap_or(false)
    }

    /// Verifying key.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("der_len", &self.der.len())
            .finish()
    }
}

/// How a chain earned trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    /// Leads back to the trust anchor.
    Rooted,
    /// Single token signed by its own key. No platform account.
    SelfSigned,
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rooted => "rooted",
            Self::SelfSigned => "self-signed",
        })
    }
}

/// Chain token payload as sent.
#[derive(Debug, Clone, Deserialize)]
struct ChainPayload {
    #[serde(rename = "identityPublicKey", default)]
    identity_public_key: Option<String>,
    #[serde(rename = "extraData", default)]
    extra_data: Option<IdentityData>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
}

/// One link of the chain, after its signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEntry {
    /// Delegates to the next signer only.
    Authority {
        /// Key that signs the next hop.
        identity_public_key: Option<String>,
    },
    /// Terminal hop carrying identity claims.
    Identity {
        /// Key that signs the next hop, and the client's identity key.
        identity_public_key: Option<String>,
        /// Claims.
        claims: IdentityData,
    },
}

impl ChainEntry {
    /// Key that signs the next hop.
    pub fn identity_public_key(&self) -> Option<&str> {
        match self {
            Self::Authority {
                identity_public_key,
            }
            | Self::Identity {
                identity_public_key,
                ..
            } => identity_public_key.as_deref(),
        }
    }
}

impl ChainEntry {
    fn from_payload(payload: ChainPayload) -> Self {
        match payload.extra_data {
            Some(claims) => Self::Identity {
                identity_public_key: payload.identity_public_key,
                claims,
            },
            None => Self::Authority {
                identity_public_key: payload.identity_public_key,
            },
        }
    }
}

/// Result of a successful chain walk.
#[derive(Debug, Clone)]
pub struct ValidatedChain {
    /// Identity claims; XUID already stripped for self-signed chains.
    pub claims: IdentityClaims,
    /// How the chain was trusted.
    pub trust: TrustLevel,
    /// Client identity key (base64 DER), used for key agreement.
    pub identity_public_key: String,
}

/// Walks identity chains against one trust anchor.
pub struct ChainValidator<'a> {
    anchor: &'a TrustAnchor,
    max_length: usize,
    clock_skew: i64,
    now: i64,
}

impl<'a> ChainValidator<'a> {
    /// Validator using the policy's chain bound and clock skew, at the
    /// current time.
    pub fn new(anchor: &'a TrustAnchor, policy: &LoginPolicy) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            anchor,
            max_length: policy.max_chain_length,
            clock_skew: i64::try_from(policy.clock_skew_secs).unwrap_or(i64::MAX),
            now,
        }
    }

    /// Evaluate token validity windows at `now` (unix seconds).
    pub fn at(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Validate a chain.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedToken` if any token fails to parse or a token used
    ///   for trust carries no `x5u`
    /// - `Error::UntrustedChain` if the chain is empty or too long, a
    ///   signature fails, a token is outside its validity window, a token
    ///   follows the identity token, or the chain never becomes trusted
    /// - `Error::NoIdentityClaims` if no verified token carries identity data
    /// - `Error::InvalidPublicKey` if the identity token names no client key
    pub fn validate(&self, chain: &[String]) -> Result<ValidatedChain> {
        if chain.is_empty() {
            return Err(Error::UntrustedChain("chain is empty".into()));
        }
        if chain.len() > self.max_length {
            return Err(Error::UntrustedChain(format!(
                "chain has {} tokens, limit is {}",
                chain.len(),
                self.max_length
            )));
        }

        let tokens = chain
            .iter()
            .map(|raw| token::parse::<ChainPayload>(raw))
            .collect::<Result<Vec<_>>>()?;

        let mut trust: Option<TrustLevel> = None;
        let mut next_signer: Option<String> = None;
        let mut identity: Option<(IdentityData, Option<String>)> = None;

        for (hop, token) in tokens.into_iter().enumerate() {
            if identity.is_some() {
                tracing::warn!(hop, "token follows the identity token");
                return Err(Error::UntrustedChain(format!(
                    "hop {} follows the identity token",
                    hop
                )));
            }

            match trust {
                None => {
                    let key_ref = token.key_ref().ok_or_else(|| {
                        Error::MalformedToken(format!("hop {} has no x5u header", hop))
                    })?;

                    if self.anchor.matches(key_ref) {
                        self.check_signature(hop, &token, self.anchor.verifying_key())?;
                        trust = Some(TrustLevel::Rooted);
                        tracing::debug!(
                            hop,
                            trust = %TrustLevel::Rooted,
                            "chain reached trust anchor"
                        );
                    } else if chain.len() == 1 {
                        let key = hop_key(hop, key_ref)?;
                        self.check_signature(hop, &token, &key)?;
                        trust = Some(TrustLevel::SelfSigned);
                        tracing::debug!(hop, trust = %TrustLevel::SelfSigned, "single-token chain");
                    } else {
                        let key = hop_key(hop, key_ref)?;
                        self.check_signature(hop, &token, &key)?;
                        tracing::debug!(hop, "skipping client-supplied root");
                        continue;
                    }
                }
                Some(_) => {
                    let signer = next_signer.take().ok_or_else(|| {
                        Error::UntrustedChain(format!("hop {} has no designated signer", hop))
                    })?;
                    let key = hop_key(hop, &signer)?;
                    self.check_signature(hop, &token, &key)?;
                    tracing::debug!(hop, "hop verified by previous identity key");
                }
            }

            self.check_window(hop, token.payload())?;

            let entry = ChainEntry::from_payload(token.into_payload());
            next_signer = entry.identity_public_key().map(str::to_string);
            if let ChainEntry::Identity {
                identity_public_key,
                claims,
            } = entry
            {
                identity = Some((claims, identity_public_key));
            }
        }

        let trust = trust.ok_or_else(|| {
            Error::UntrustedChain("chain never reaches the trust anchor".into())
        })?;
        let (data, identity_public_key) = identity.ok_or(Error::NoIdentityClaims)?;
        let identity_public_key = identity_public_key.ok_or_else(|| {
            Error::InvalidPublicKey("identity token carries no identityPublicKey".into())
        })?;

        let mut claims = IdentityClaims::from_chain(data);
        if trust == TrustLevel::SelfSigned {
            if let Some(xuid) = claims.xuid.take() {
                tracing::warn!(
                    display_name = %claims.display_name,
                    xuid = %xuid,
                    "self-signed chain claims a platform account id; discarding"
                );
            }
        }

        Ok(ValidatedChain {
            claims,
            trust,
            identity_public_key,
        })
    }

    fn check_signature(
        &self,
        hop: usize,
        token: &Token<ChainPayload>,
        key: &VerifyingKey,
    ) -> Result<()> {
        if token.verify(key) {
            Ok(())
        } else {
            tracing::debug!(hop, "chain signature check failed");
            Err(Error::UntrustedChain(format!(
                "signature of hop {} does not verify",
                hop
            )))
        }
    }

    fn check_window(&self, hop: usize, payload: &ChainPayload) -> Result<()> {
        if let Some(exp) = payload.exp {
            if self.now > exp.saturating_add(self.clock_skew) {
                return Err(Error::UntrustedChain(format!("hop {} has expired", hop)));
            }
        }
        if let Some(nbf) = payload.nbf {
            if self.now < nbf.saturating_sub(self.clock_skew) {
                return Err(Error::UntrustedChain(format!(
                    "hop {} is not valid yet",
                    hop
                )));
            }
        }
        Ok(())
    }
}

fn hop_key(hop: usize, key_ref: &str) -> Result<VerifyingKey> {
    keys::verifying_key_from_base64(key_ref).map_err(|e| {
        Error::UntrustedChain(format!("hop {} names an unusable key: {}", hop, e))
    })
}
