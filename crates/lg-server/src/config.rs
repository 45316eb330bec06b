//! Process configuration from `LG_*` environment variables.
//!
//! | Variable                    | Default                |
//! |-----------------------------|------------------------|
//! | `LG_REQUIRE_PLATFORM_AUTH`  | `true`                 |
//! | `LG_ENCRYPT_ALL`            | `false`                |
//! | `LG_ENCRYPT_BY_DEFAULT`     | `true`                 |
//! | `LG_MIN_PROTOCOL`           | 712                    |
//! | `LG_MAX_PROTOCOL`           | 766                    |
//! | `LG_MAX_CHAIN_LENGTH`       | 3                      |
//! | `LG_CLOCK_SKEW_SECS`        | 60                     |
//! | `LG_COMPRESSION_THRESHOLD`  | 512                    |
//! | `LG_COMPRESSION`            | `flate`                |
//! | `LG_TRUST_ANCHOR`           | platform root key      |
//! | `LG_MAX_SESSIONS`           | 1024                   |

use crate::{Error, Result};
use lg_core::chain::TrustAnchor;
use lg_core::config::{HandshakeConfig, LoginPolicy};
use std::str::FromStr;
use std::sync::Arc;

/// Default cap on concurrent sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Policy and trust anchor shared by every session.
    pub handshake: Arc<HandshakeConfig>,
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
}

impl ServerConfig {
    /// Configuration with default policy, the platform root, and the
    /// default session cap.
    ///
    /// # Errors
    ///
    /// Fails only if the built-in root key does not decode.
    pub fn new() -> Result<Self> {
        Ok(Self {
            handshake: HandshakeConfig::platform_default()?.shared(),
            max_sessions: DEFAULT_MAX_SESSIONS,
        })
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a variable is set but does not parse, or
    /// the protocol range is empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`; unset variables keep defaults.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = LoginPolicy::default();
        let mut policy = LoginPolicy {
            require_platform_auth: read_bool(
                &lookup,
                "LG_REQUIRE_PLATFORM_AUTH",
                defaults.require_platform_auth,
            )?,
            encrypt_all: read_bool(&lookup, "LG_ENCRYPT_ALL", defaults.encrypt_all)?,
            encrypt_by_default: read_bool(
                &lookup,
                "LG_ENCRYPT_BY_DEFAULT",
                defaults.encrypt_by_default,
            )?,
            min_protocol_version: read(&lookup, "LG_MIN_PROTOCOL", defaults.min_protocol_version)?,
            max_protocol_version: read(&lookup, "LG_MAX_PROTOCOL", defaults.max_protocol_version)?,
            max_chain_length: read(&lookup, "LG_MAX_CHAIN_LENGTH", defaults.max_chain_length)?,
            clock_skew_secs: read(&lookup, "LG_CLOCK_SKEW_SECS", defaults.clock_skew_secs)?,
            compression: defaults.compression,
        };
        policy.compression.threshold =
            read(&lookup, "LG_COMPRESSION_THRESHOLD", policy.compression.threshold)?;
        policy.compression.algorithm =
            read(&lookup, "LG_COMPRESSION", policy.compression.algorithm)?;

        if policy.min_protocol_version > policy.max_protocol_version {
            return Err(Error::Config(format!(
                "LG_MIN_PROTOCOL {} is above LG_MAX_PROTOCOL {}",
                policy.min_protocol_version, policy.max_protocol_version
            )));
        }

        let anchor = match lookup("LG_TRUST_ANCHOR") {
            Some(encoded) => TrustAnchor::from_base64(encoded.trim())
                .map_err(|e| Error::Config(format!("LG_TRUST_ANCHOR: {}", e)))?,
            None => TrustAnchor::platform_root()?,
        };

        let max_sessions = read(&lookup, "LG_MAX_SESSIONS", DEFAULT_MAX_SESSIONS)?;
        if max_sessions == 0 {
            return Err(Error::Config("LG_MAX_SESSIONS must be positive".into()));
        }

        tracing::debug!(
            require_platform_auth = policy.require_platform_auth,
            encrypt_all = policy.encrypt_all,
            encrypt_by_default = policy.encrypt_by_default,
            min_protocol = policy.min_protocol_version,
            max_protocol = policy.max_protocol_version,
            max_sessions,
            "server configuration loaded"
        );

        Ok(Self {
            handshake: HandshakeConfig::new(policy, anchor).shared(),
            max_sessions,
        })
    }
}

fn read<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}={:?}: {}", name, value, e))),
        None => Ok(default),
    }
}

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> Result<bool> {
    match lookup(name) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(Error::Config(format!("{}={:?} is not a boolean", name, other))),
        },
        None => Ok(default),
    }
}
