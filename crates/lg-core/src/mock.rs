//! Test doubles for the session collaborators, plus a fixture that plays
//! the client and platform side of a login.
//!
//! Everything here is deterministic apart from key generation.

use crate::chain::TrustAnchor;
use crate::config::{HandshakeConfig, LoginPolicy, DEFAULT_MAX_PROTOCOL};
use crate::handshake::SaltClaims;
use crate::identity::PlayerIdentity;
use crate::login::LoginRequest;
use crate::packet::{ClientPacket, ServerPacket};
use crate::token;
use crate::traits::{MessageHandler, PlayerFactory, SessionTransport};
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lg_crypto::agreement::derive_peer_secret;
use lg_crypto::{keys, CryptoContext, Decryptor, EcdhP384KeyPair, Encryptor};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

const RESOURCE_PATCH: &[u8] = br#"{"geometry":{"default":"geometry.humanoid.custom"}}"#;

#[derive(Default)]
struct TransportState {
    sent: Vec<ServerPacket>,
    disconnect_reason: Option<String>,
    cipher: Option<(Encryptor, Decryptor)>,
    ciphers_installed: usize,
    closed: bool,
}

/// Transport that records everything the session asks of it.
///
/// Clones share state, so a test can keep one handle while the session owns
/// another.
///
/// # Example
///
/// ```
/// use lg_core::mock::MockTransport;
/// use lg_core::traits::SessionTransport;
///
/// let transport = MockTransport::new("127.0.0.1:19132".parse().unwrap());
/// let observer = transport.clone();
/// transport.disconnect("bye");
/// assert_eq!(observer.disconnect_reason().as_deref(), Some("bye"));
/// assert!(!observer.is_connected());
/// ```
#[derive(Clone)]
pub struct MockTransport {
    endpoint: SocketAddr,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Connected transport for `endpoint`.
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    /// Packets sent so far, in order.
    pub fn sent(&self) -> Vec<ServerPacket> {
        self.state.lock().sent.clone()
    }

    /// Reason given to `disconnect`, if it was called.
    pub fn disconnect_reason(&self) -> Option<String> {
        self.state.lock().disconnect_reason.clone()
    }

    /// Number of times a cipher was installed.
    pub fn ciphers_installed(&self) -> usize {
        self.state.lock().ciphers_installed
    }

    /// Whether a cipher is installed.
    pub fn cipher_installed(&self) -> bool {
        self.state.lock().cipher.is_some()
    }

    /// Take the installed cipher pair.
    pub fn take_cipher(&self) -> Option<(Encryptor, Decryptor)> {
        self.state.lock().cipher.take()
    }

    /// Simulate the peer going away without a disconnect call.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }
}

impl SessionTransport for MockTransport {
    fn send(&self, packet: ServerPacket) {
        let mut state = self.state.lock();
        if !state.closed {
            state.sent.push(packet);
        }
    }

    fn disconnect(&self, reason: &str) {
        let mut state = self.state.lock();
        if !state.closed {
            state.disconnect_reason = Some(reason.to_string());
            state.closed = true;
        }
    }

    fn install_cipher(&self, encryptor: Encryptor, decryptor: Decryptor) {
        let mut state = self.state.lock();
        state.cipher = Some((encryptor, decryptor));
        state.ciphers_installed += 1;
    }

    fn client_endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    fn is_connected(&self) -> bool {
        !self.state.lock().closed
    }
}

#[derive(Default)]
struct FactoryState {
    created: Vec<(SocketAddr, PlayerIdentity)>,
    handled: Vec<ClientPacket>,
}

/// Player factory that records creations and the packets each player sees.
#[derive(Clone, Default)]
pub struct RecordingPlayerFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl RecordingPlayerFactory {
    /// Empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of players created.
    pub fn creations(&self) -> usize {
        self.state.lock().created.len()
    }

    /// Identities of created players, in creation order.
    pub fn created(&self) -> Vec<PlayerIdentity> {
        self.state
            .lock()
            .created
            .iter()
            .map(|(_, identity)| identity.clone())
            .collect()
    }

    /// Endpoints players were created for.
    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.state.lock().created.iter().map(|(ep, _)| *ep).collect()
    }

    /// Packets delivered to any created player.
    pub fn handled(&self) -> Vec<ClientPacket> {
        self.state.lock().handled.clone()
    }
}

impl PlayerFactory for RecordingPlayerFactory {
    fn create_player(
        &self,
        endpoint: SocketAddr,
        identity: PlayerIdentity,
    ) -> Box<dyn MessageHandler> {
        self.state.lock().created.push((endpoint, identity));
        Box::new(RecordingHandler {
            state: Arc::clone(&self.state),
        })
    }
}

struct RecordingHandler {
    state: Arc<Mutex<FactoryState>>,
}

impl MessageHandler for RecordingHandler {
    fn handle(&mut self, packet: ClientPacket) {
        self.state.lock().handled.push(packet);
    }
}

struct FixtureKey {
    pair: EcdhP384KeyPair,
    b64: String,
}

impl FixtureKey {
    fn generate() -> Result<Self> {
        let pair = EcdhP384KeyPair::generate()?;
        let b64 = STANDARD.encode(pair.public_key_der());
        Ok(Self { pair, b64 })
    }

    fn sign(&self, payload: &Value) -> Result<String> {
        token::sign(payload, &self.pair.signing_key(), &self.b64)
    }
}

/// Plays the platform and the client in a login.
///
/// Holds a private trust anchor, an intermediate authority, and the client
/// identity key. Chains built here validate against [`LoginFixture::anchor`].
pub struct LoginFixture {
    trust_anchor: TrustAnchor,
    anchor: FixtureKey,
    intermediate: FixtureKey,
    client: FixtureKey,
}

impl LoginFixture {
    /// Player name used in every identity token.
    pub const DISPLAY_NAME: &'static str = "Steve";
    /// Identity id used in every identity token.
    pub const IDENTITY: &'static str = "1c4e1f4a-5e5a-3c3a-9c1b-2d6c0e6f7a11";
    /// Platform account id claimed by every identity token.
    pub const XUID: &'static str = "2535412345678901";
    /// Skin dimensions in the client data token.
    pub const SKIN_SIZE: u32 = 32;

    /// Fresh keys.
    ///
    /// # Errors
    ///
    /// Fails only if key generation fails.
    pub fn new() -> Result<Self> {
        let anchor = FixtureKey::generate()?;
        Ok(Self {
            trust_anchor: TrustAnchor::from_der(anchor.pair.public_key_der())?,
            anchor,
            intermediate: FixtureKey::generate()?,
            client: FixtureKey::generate()?,
        })
    }

    /// Trust anchor matching the fixture's root key.
    pub fn anchor(&self) -> &TrustAnchor {
        &self.trust_anchor
    }

    /// Shared handshake configuration trusting the fixture's root.
    pub fn config(&self, policy: LoginPolicy) -> Arc<HandshakeConfig> {
        HandshakeConfig::new(policy, self.trust_anchor.clone()).shared()
    }

    /// Supported protocol version.
    pub fn protocol_version(&self) -> u32 {
        DEFAULT_MAX_PROTOCOL
    }

    /// Player name in the identity token.
    pub fn display_name(&self) -> &'static str {
        Self::DISPLAY_NAME
    }

    /// Client identity key, base64 DER.
    pub fn client_public_key(&self) -> &str {
        &self.client.b64
    }

    fn identity_payload(&self) -> Value {
        json!({
            "identityPublicKey": self.client.b64,
            "extraData": {
                "displayName": Self::DISPLAY_NAME,
                "identity": Self::IDENTITY,
                "XUID": Self::XUID,
                "titleId": "896928775",
            }
        })
    }

    /// Anchor signs the intermediate; the intermediate signs the identity.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn rooted_chain(&self) -> Result<Vec<String>> {
        Ok(vec![
            self.anchor.sign(&json!({
                "identityPublicKey": self.intermediate.b64,
                "certificateAuthority": true,
            }))?,
            self.intermediate.sign(&self.identity_payload())?,
        ])
    }

    /// One identity token signed directly by the anchor.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn single_hop_rooted_chain(&self) -> Result<Vec<String>> {
        Ok(vec![self.anchor.sign(&self.identity_payload())?])
    }

    /// [`Self::rooted_chain`] preceded by the client's own root token, as
    /// real clients send it.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn rooted_chain_with_client_root(&self) -> Result<Vec<String>> {
        let mut chain = vec![self.client.sign(&json!({
            "identityPublicKey": self.anchor.b64,
            "certificateAuthority": true,
        }))?];
        chain.extend(self.rooted_chain()?);
        Ok(chain)
    }

    /// Single token signed by the client's own key.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn self_signed_chain(&self) -> Result<Vec<String>> {
        Ok(vec![self.client.sign(&self.identity_payload())?])
    }

    /// Rooted chain whose first token claims the anchor's key but is signed
    /// by another key.
    ///
    /// # Errors
    ///
    /// Fails only if key generation or token signing fails.
    pub fn forged_chain(&self) -> Result<Vec<String>> {
        let rogue = EcdhP384KeyPair::generate()?;
        let forged = token::sign(
            &json!({ "identityPublicKey": self.intermediate.b64 }),
            &rogue.signing_key(),
            &self.anchor.b64,
        )?;
        Ok(vec![forged, self.intermediate.sign(&self.identity_payload())?])
    }

    /// [`Self::rooted_chain`] whose identity token names `identity_public_key`
    /// instead of the fixture's client key.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn rooted_chain_naming_key(&self, identity_public_key: &str) -> Result<Vec<String>> {
        let mut identity = self.identity_payload();
        identity["identityPublicKey"] = Value::from(identity_public_key);
        Ok(vec![
            self.anchor.sign(&json!({
                "identityPublicKey": self.intermediate.b64,
                "certificateAuthority": true,
            }))?,
            self.intermediate.sign(&identity)?,
        ])
    }

    /// Client data token with a plain 32x32 skin.
    ///
    /// # Errors
    ///
    /// Fails only if token signing fails.
    pub fn client_data_token(&self) -> Result<String> {
        let pixels = vec![0x7Fu8; (Self::SKIN_SIZE * Self::SKIN_SIZE * 4) as usize];
        self.client.sign(&json!({
            "SkinId": "Standard_Custom",
            "SkinData": STANDARD.encode(&pixels),
            "SkinImageWidth": Self::SKIN_SIZE,
            "SkinImageHeight": Self::SKIN_SIZE,
            "SkinGeometryData": STANDARD.encode(b"{}"),
            "SkinResourcePatch": STANDARD.encode(RESOURCE_PATCH),
            "DeviceId": "d0e1f2a3-b4c5-4d6e-8f90-a1b2c3d4e5f6",
            "DeviceModel": "fixture",
            "DeviceOS": 7,
            "LanguageCode": "en_US",
            "GameVersion": "1.21.50",
            "ServerAddress": "127.0.0.1:19132",
            "ThirdPartyName": Self::DISPLAY_NAME,
        }))
    }

    /// Login payload carrying `chain` and the fixture's client data.
    ///
    /// # Errors
    ///
    /// Fails only if signing or encoding fails.
    pub fn login_payload(&self, chain: &[String]) -> Result<Vec<u8>> {
        LoginRequest {
            chain: chain.to_vec(),
            client_data: self.client_data_token()?,
        }
        .encode()
    }

    /// Login packet at the fixture's protocol version.
    ///
    /// # Errors
    ///
    /// Fails only if signing or encoding fails.
    pub fn login_packet(&self, chain: &[String]) -> Result<ClientPacket> {
        self.login_packet_at(self.protocol_version(), chain)
    }

    /// Login packet at `protocol_version`.
    ///
    /// # Errors
    ///
    /// Fails only if signing or encoding fails.
    pub fn login_packet_at(&self, protocol_version: u32, chain: &[String]) -> Result<ClientPacket> {
        Ok(ClientPacket::Login {
            protocol_version,
            payload: self.login_payload(chain)?,
        })
    }

    /// Client side of key agreement: check the server handshake token and
    /// derive the session cipher from it.
    ///
    /// The returned context's encryptor matches the server's decryptor and
    /// vice versa.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedToken` if the token does not parse or has no `x5u`
    /// - `Error::UntrustedChain` if its signature does not verify
    /// - `Error::InvalidPublicKey` or `Error::UnsupportedCurve` for a bad
    ///   server key
    pub fn complete_handshake(&self, handshake_token: &str) -> Result<CryptoContext> {
        let parsed = token::parse::<SaltClaims>(handshake_token)?;
        let x5u = parsed
            .key_ref()
            .ok_or_else(|| Error::MalformedToken("handshake token has no x5u".into()))?;

        let server_key = keys::public_key_from_base64(x5u)?;
        let verifying_key = keys::verifying_key_from_base64(x5u)?;
        if !parsed.verify(&verifying_key) {
            return Err(Error::UntrustedChain(
                "handshake token signature does not verify".into(),
            ));
        }

        let salt = STANDARD
            .decode(&parsed.payload().salt)
            .map_err(|_| Error::MalformedToken("salt is not base64".into()))?;
        let secret = derive_peer_secret(&self.client.pair, &server_key, &salt);
        Ok(CryptoContext::new(&secret))
    }
}
