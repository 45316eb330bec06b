//! Client data carried by the skin token.
//!
//! The skin token's payload describes appearance and device. It is parsed
//! without any signature check and must never feed a trust decision.

use crate::identity::DeviceInfo;
use crate::token;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

/// Raw client data payload. Field names follow the wire format.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClientData {
    /// Device id.
    pub device_id: String,
    /// Device model.
    pub device_model: String,
    /// Operating system id.
    #[serde(rename = "DeviceOS")]
    pub device_os: i32,
    /// Input mode in use.
    pub current_input_mode: i32,
    /// Input mode at startup.
    pub default_input_mode: i32,
    /// UI profile.
    #[serde(rename = "UIProfile")]
    pub ui_profile: i32,
    /// Language code.
    pub language_code: String,
    /// Client game version.
    pub game_version: String,
    /// Address the client dialled.
    pub server_address: String,
    /// Third-party account name.
    pub third_party_name: String,
    /// Platform online id.
    pub platform_online_id: String,
    /// Tenant id (education builds).
    pub tenant_id: String,
    /// Skin id.
    pub skin_id: String,
    /// RGBA skin image, base64.
    pub skin_data: String,
    /// Skin image width in pixels.
    pub skin_image_width: u32,
    /// Skin image height in pixels.
    pub skin_image_height: u32,
    /// Geometry JSON, base64.
    pub skin_geometry_data: String,
    /// Resource patch JSON, base64.
    pub skin_resource_patch: String,
    /// Animated overlays.
    pub animated_image_data: Vec<AnimationData>,
    /// Cape id.
    pub cape_id: String,
    /// RGBA cape image, base64.
    pub cape_data: String,
    /// Cape image width in pixels.
    pub cape_image_width: u32,
    /// Cape image height in pixels.
    pub cape_image_height: u32,
    /// Persona skin flag.
    pub persona_skin: bool,
    /// Premium skin flag.
    pub premium_skin: bool,
}

/// One animated overlay as sent on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AnimationData {
    /// RGBA frames, base64.
    pub image: String,
    /// Frame width in pixels.
    pub image_width: u32,
    /// Total height in pixels.
    pub image_height: u32,
    /// Animation kind.
    #[serde(rename = "Type")]
    pub animation_type: u32,
    /// Frame count.
    pub frames: f32,
    /// Expression kind.
    pub animation_expression: u32,
}

/// RGBA image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkinImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data, four bytes per pixel.
    pub pixels: Vec<u8>,
}

/// Animated overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinAnimation {
    /// Frames.
    pub image: SkinImage,
    /// Animation kind.
    pub animation_type: u32,
    /// Frame count.
    pub frames: f32,
    /// Expression kind.
    pub expression: u32,
}

/// Appearance data attached to the player identity for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppearanceBlob {
    /// Skin id.
    pub skin_id: String,
    /// Skin image.
    pub skin: SkinImage,
    /// Geometry description (JSON bytes).
    pub geometry: Vec<u8>,
    /// Resource patch (JSON bytes).
    pub resource_patch: Vec<u8>,
    /// Animated overlays.
    pub animations: Vec<SkinAnimation>,
    /// Cape, if any.
    pub cape: Option<SkinImage>,
    /// Persona skin flag.
    pub persona: bool,
    /// Premium skin flag.
    pub premium: bool,
}

/// Client data split into its parts.
#[derive(Debug, Clone)]
pub struct DecodedClientData {
    /// Appearance.
    pub appearance: AppearanceBlob,
    /// Device metadata.
    pub device: DeviceInfo,
    /// Tenant id, if sent.
    pub tenant_id: Option<String>,
}

impl ClientData {
    /// Parse the skin token. The signature is not checked.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedToken` if the token is not a three-part token with
    ///   a JSON payload
    /// - `Error::MalformedLogin` if an image field is not base64 or its size
    ///   does not match the stated dimensions
    pub fn decode(skin_token: &str) -> Result<DecodedClientData> {
        let data = token::parse::<ClientData>(skin_token)?.into_payload();
        data.into_parts()
    }

    fn into_parts(self) -> Result<DecodedClientData> {
        let skin = decode_image(
            "skin",
            &self.skin_data,
            self.skin_image_width,
            self.skin_image_height,
        )?;

        let cape = if self.cape_data.is_empty() {
            None
        } else {
            Some(decode_image(
                "cape",
                &self.cape_data,
                self.cape_image_width,
                self.cape_image_height,
            )?)
        };

        let animations = self
            .animated_image_data
            .iter()
            .map(|anim| {
                Ok(SkinAnimation {
                    image: decode_image(
                        "animation",
                        &anim.image,
                        anim.image_width,
                        anim.image_height,
                    )?,
                    animation_type: anim.animation_type,
                    frames: anim.frames,
                    expression: anim.animation_expression,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let appearance = AppearanceBlob {
            skin_id: self.skin_id,
            skin,
            geometry: decode_blob("geometry", &self.skin_geometry_data)?,
            resource_patch: decode_blob("resource patch", &self.skin_resource_patch)?,
            animations,
            cape,
            persona: self.persona_skin,
            premium: self.premium_skin,
        };

        let device = DeviceInfo {
            device_id: self.device_id,
            device_model: self.device_model,
            device_os: self.device_os,
            current_input_mode: self.current_input_mode,
            default_input_mode: self.default_input_mode,
            ui_profile: self.ui_profile,
            language_code: self.language_code,
            game_version: self.game_version,
            server_address: self.server_address,
            third_party_name: self.third_party_name,
            platform_online_id: self.platform_online_id,
        };

        Ok(DecodedClientData {
            appearance,
            device,
            tenant_id: Some(self.tenant_id).filter(|t| !t.is_empty()),
        })
    }
}

fn decode_blob(field: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|_| Error::MalformedLogin(format!("{} is not valid base64", field)))
}

fn decode_image(field: &str, encoded: &str, width: u32, height: u32) -> Result<SkinImage> {
    let pixels = decode_blob(field, encoded)?;
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4));
    if expected != Some(pixels.len()) {
        return Err(Error::MalformedLogin(format!(
            "{} is {} bytes, expected {}x{} RGBA",
            field,
            pixels.len(),
            width,
            height
        )));
    }
    Ok(SkinImage {
        width,
        height,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn unsigned_token(payload: serde_json::Value) -> String {
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"ES384"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    fn sample() -> serde_json::Value {
        json!({
            "DeviceId": "device-1",
            "DeviceModel": "Test Phone",
            "DeviceOS": 7,
            "CurrentInputMode": 2,
            "DefaultInputMode": 2,
            "UIProfile": 1,
            "LanguageCode": "en_GB",
            "GameVersion": "1.21.50",
            "ServerAddress": "play.example.net:19132",
            "ThirdPartyName": "Steve",
            "SkinId": "custom",
            "SkinData": STANDARD.encode([0xFFu8; 2 * 2 * 4]),
            "SkinImageWidth": 2,
            "SkinImageHeight": 2,
            "SkinGeometryData": STANDARD.encode(br#"{"geometry":{"default":"geometry.humanoid"}}"#),
            "AnimatedImageData": [{
                "Image": STANDARD.encode([0u8; 4 * 8]),
                "ImageWidth": 4,
                "ImageHeight": 2,
                "Type": 1,
                "Frames": 2.0,
                "AnimationExpression": 0
            }],
            "PersonaSkin": true,
            "UnknownField": "ignored"
        })
    }

    #[test]
    fn test_decode_appearance_and_device() {
        let decoded = ClientData::decode(&unsigned_token(sample())).unwrap();

        assert_eq!(decoded.appearance.skin.width, 2);
        assert_eq!(decoded.appearance.skin.pixels.len(), 16);
        assert_eq!(decoded.appearance.animations.len(), 1);
        assert_eq!(decoded.appearance.animations[0].frames, 2.0);
        assert!(decoded.appearance.persona);
        assert!(decoded.appearance.cape.is_none());
        assert!(decoded.appearance.resource_patch.is_empty());
        assert!(String::from_utf8_lossy(&decoded.appearance.geometry).contains("humanoid"));

        assert_eq!(decoded.device.device_os, 7);
        assert_eq!(decoded.device.ui_profile, 1);
        assert_eq!(decoded.device.language_code, "en_GB");
        assert_eq!(decoded.tenant_id, None);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let mut payload = sample();
        payload["SkinImageWidth"] = json!(64);
        assert!(matches!(
            ClientData::decode(&unsigned_token(payload)),
            Err(Error::MalformedLogin(_))
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let mut payload = sample();
        payload["SkinGeometryData"] = json!("%%%");
        assert!(matches!(
            ClientData::decode(&unsigned_token(payload)),
            Err(Error::MalformedLogin(_))
        ));
    }

    #[test]
    fn test_not_a_token() {
        assert!(matches!(
            ClientData::decode("skin"),
            Err(Error::MalformedToken(_))
        ));
    }
}
