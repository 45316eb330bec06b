//! Login policy and handshake configuration.
//!
//! Configuration is built once per process and shared read-only between
//! sessions through an `Arc<HandshakeConfig>`.

use crate::chain::TrustAnchor;
use crate::packet::{CompressionAlgorithm, PlayStatus};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lowest protocol version accepted by default.
pub const DEFAULT_MIN_PROTOCOL: u32 = 712;

/// Highest protocol version accepted by default.
pub const DEFAULT_MAX_PROTOCOL: u32 = 766;

/// Default bound on the number of tokens in an identity chain.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 3;

/// Default leeway applied to token `exp`/`nbf` claims.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;

/// Login policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPolicy {
    /// Reject identities without a platform account id.
    pub require_platform_auth: bool,
    /// Encrypt every session.
    pub encrypt_all: bool,
    /// Encrypt sessions whose identity carries a platform account id.
    pub encrypt_by_default: bool,
    /// Lowest supported protocol version.
    pub min_protocol_version: u32,
    /// Highest supported protocol version.
    pub max_protocol_version: u32,
    /// Longest accepted identity chain.
    pub max_chain_length: usize,
    /// Leeway for token validity windows, in seconds.
    pub clock_skew_secs: u64,
    /// Compression parameters sent in network settings.
    pub compression: CompressionSettings,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            require_platform_auth: true,
            encrypt_all: false,
            encrypt_by_default: true,
            min_protocol_version: DEFAULT_MIN_PROTOCOL,
            max_protocol_version: DEFAULT_MAX_PROTOCOL,
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            compression: CompressionSettings::default(),
        }
    }
}

impl LoginPolicy {
    /// Check a client protocol version against the supported range.
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionMismatch` outside `min..=max`.
    pub fn check_protocol(&self, protocol: u32) -> Result<()> {
        if protocol < self.min_protocol_version || protocol > self.max_protocol_version {
            return Err(Error::VersionMismatch {
                protocol,
                min: self.min_protocol_version,
                max: self.max_protocol_version,
            });
        }
        Ok(())
    }

    /// Play status telling the client which side is out of date.
    ///
    /// Only meaningful for a version that failed [`Self::check_protocol`].
    pub fn version_status(&self, protocol: u32) -> PlayStatus {
        if protocol < self.min_protocol_version {
            PlayStatus::FailedClient
        } else {
            PlayStatus::FailedServer
        }
    }

    /// Whether a session must be encrypted.
    pub fn requires_encryption(&self, has_platform_account: bool) -> bool {
        self.encrypt_all || (self.encrypt_by_default && has_platform_account)
    }
}

/// Compression parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Smallest packet size that is compressed.
    pub threshold: u16,
    /// Algorithm.
    pub algorithm: CompressionAlgorithm,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold: 512,
            algorithm: CompressionAlgorithm::Flate,
        }
    }
}

/// Everything a handshake needs from the process: policy and trust anchor.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Login policy.
    pub policy: LoginPolicy,
    /// Root key for identity chains.
    pub anchor: TrustAnchor,
}

impl HandshakeConfig {
    /// Create a configuration.
    pub fn new(policy: LoginPolicy, anchor: TrustAnchor) -> Self {
        Self { policy, anchor }
    }

    /// Configuration with default policy and the platform root anchor.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in root key does not decode.
    pub fn platform_default() -> Result<Self> {
        Ok(Self::new(LoginPolicy::default(), TrustAnchor::platform_root()?))
    }

    /// Wrap for sharing between sessions.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
