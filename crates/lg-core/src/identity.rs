//! Identity records produced by a successful login.

use crate::chain::TrustLevel;
use crate::client_data::AppearanceBlob;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity claims carried in the `extraData` object of a chain token.
///
/// Field names follow the wire format; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityData {
    /// Player name.
    #[serde(rename = "displayName")]
    pub display_name: String,
    /// Stable identity id.
    pub identity: Uuid,
    /// Platform account id; empty when the identity is offline.
    #[serde(rename = "XUID", default)]
    pub xuid: String,
    /// Title the client authenticated through.
    #[serde(rename = "titleId", default, skip_serializing_if = "Option::is_none")]
    pub title_id: Option<String>,
}

/// Validated identity of a connecting client.
///
/// Built once per session at the end of chain validation, then completed
/// with device data from the skin token. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Player name.
    pub display_name: String,
    /// Stable identity id.
    pub identity: Uuid,
    /// Platform account id. `None` for self-signed identities, whatever the
    /// chain claimed.
    pub xuid: Option<String>,
    /// Title the client authenticated through.
    pub title_id: Option<String>,
    /// Tenant id (education builds).
    pub tenant_id: Option<String>,
    /// Device metadata.
    pub device: DeviceInfo,
    /// Protocol version from the login packet.
    pub protocol_version: u32,
}

impl IdentityClaims {
    /// Claims from a verified chain payload. Device data is filled in later.
    pub(crate) fn from_chain(data: IdentityData) -> Self {
        Self {
            display_name: data.display_name,
            identity: data.identity,
            xuid: Some(data.xuid).filter(|x| !x.is_empty()),
            title_id: data.title_id,
            tenant_id: None,
            device: DeviceInfo::default(),
            protocol_version: 0,
        }
    }

    /// Whether a platform account backs this identity.
    pub fn has_platform_account(&self) -> bool {
        self.xuid.is_some()
    }

    /// Attach device data and the login protocol version.
    pub fn with_client(
        mut self,
        device: DeviceInfo,
        tenant_id: Option<String>,
        protocol_version: u32,
    ) -> Self {
        self.device = device;
        self.tenant_id = tenant_id;
        self.protocol_version = protocol_version;
        self
    }
}

/// Device metadata reported by the client. Not trust-bearing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device id.
    pub device_id: String,
    /// Device model.
    pub device_model: String,
    /// Operating system id.
    pub device_os: i32,
    /// Input mode in use.
    pub current_input_mode: i32,
    /// Input mode at startup.
    pub default_input_mode: i32,
    /// UI profile.
    pub ui_profile: i32,
    /// Language code, e.g. `en_US`.
    pub language_code: String,
    /// Client game version string.
    pub game_version: String,
    /// Address the client dialled.
    pub server_address: String,
    /// Third-party account name.
    pub third_party_name: String,
    /// Platform online id.
    pub platform_online_id: String,
}

/// Everything handed to player creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerIdentity {
    /// Validated claims.
    pub claims: IdentityClaims,
    /// Appearance data, for rendering only.
    pub appearance: AppearanceBlob,
    /// How the chain was trusted.
    pub trust: TrustLevel,
    /// Client identity public key (base64 DER).
    pub client_public_key: String,
}

impl PlayerIdentity {
    /// Player name.
    pub fn display_name(&self) -> &str {
        &self.claims.display_name
    }

    /// Stable identity id.
    pub fn identity(&self) -> Uuid {
        self.claims.identity
    }

    /// Platform account id, if verified.
    pub fn xuid(&self) -> Option<&str> {
        self.claims.xuid.as_deref()
    }
}
