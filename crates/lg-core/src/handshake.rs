//! Login handshake state machine.
//!
//! ```text
//! AwaitingNetworkSettings -> AwaitingLogin -> ValidatingIdentity
//!     -> NegotiatingEncryption -> AwaitingClientAck -> Established
//!     -> PlainHandshake -----------------------------> Established
//! any non-terminal state -> Rejected
//! ```
//!
//! The machine performs no I/O. Each input yields [`Action`]s for the
//! session driver to apply in order. Login validation is split out as a
//! [`PendingLogin`] so a driver can run the CPU-bound part (chain
//! signatures, ECDH, SHA-256) on a worker and feed the result back through
//! [`LoginHandshake::finish_login`].

use crate::chain::ChainValidator;
use crate::client_data::ClientData;
use crate::config::HandshakeConfig;
use crate::error::DisconnectReason;
use crate::guard::LoginGuard;
use crate::identity::PlayerIdentity;
use crate::login::LoginRequest;
use crate::packet::{ClientPacket, PlayStatus, ServerPacket};
use crate::token;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lg_crypto::agreement::{self, Negotiated};
use lg_crypto::CryptoContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Handshake state.
///
/// [`LoginHandshake::state`] reports the states a caller can observe
/// between packets. `NegotiatingEncryption` and `PlainHandshake` happen
/// inside [`PendingLogin::validate`], while the handshake as a whole reads
/// `ValidatingIdentity`; they only appear in transition logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the network settings request.
    AwaitingNetworkSettings,
    /// Waiting for the login packet.
    AwaitingLogin,
    /// Login received; chain and policy checks in progress.
    ValidatingIdentity,
    /// Key agreement in progress. Log only.
    NegotiatingEncryption,
    /// Unencrypted session; acknowledgement synthesised. Log only.
    PlainHandshake,
    /// Handshake token sent; waiting for the client's acknowledgement.
    AwaitingClientAck,
    /// Player handed to gameplay. Terminal.
    Established,
    /// Session disconnected. Terminal.
    Rejected,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Side effect requested by the state machine.
#[derive(Debug)]
pub enum Action {
    /// Send a packet.
    Send(ServerPacket),
    /// Hand the cipher pair to the transport.
    InstallCipher(CryptoContext),
    /// Close the session.
    Disconnect(DisconnectReason),
    /// Create the player. Emitted once, on establishment.
    CreatePlayer(PlayerIdentity),
}

/// Result of feeding one packet to the handshake.
#[derive(Debug)]
pub enum Progress {
    /// Packet had no effect.
    Ignored,
    /// Apply these actions.
    Actions(Vec<Action>),
    /// A login needs validating before the machine can advance.
    Validate(PendingLogin),
}

/// Payload of the server handshake token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltClaims {
    /// Base64 salt.
    pub salt: String,
}

/// Login accepted by the machine and awaiting validation.
///
/// Owns everything validation needs, so it can be sent to another thread.
#[derive(Debug)]
pub struct PendingLogin {
    config: Arc<HandshakeConfig>,
    endpoint: SocketAddr,
    protocol_version: u32,
    payload: Vec<u8>,
    now: Option<i64>,
}

impl PendingLogin {
    /// Evaluate token validity windows at a fixed unix time.
    pub fn at(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }

    /// Decode the payload, walk the chain, apply policy, and negotiate
    /// encryption when required.
    ///
    /// # Errors
    ///
    /// Any [`Error`]; all of them reject the session.
    pub fn validate(self) -> Result<ValidatedLogin> {
        let request = LoginRequest::decode(&self.payload)?;
        let policy = &self.config.policy;

        let mut validator = ChainValidator::new(&self.config.anchor, policy);
        if let Some(now) = self.now {
            validator = validator.at(now);
        }
        let chain = validator.validate(&request.chain)?;
        let client = ClientData::decode(&request.client_data)?;

        let claims = chain
            .claims
            .with_client(client.device, client.tenant_id, self.protocol_version);
        tracing::debug!(
            endpoint = %self.endpoint,
            display_name = %claims.display_name,
            identity = %claims.identity,
            trust = %chain.trust,
            platform_account = claims.has_platform_account(),
            "identity validated"
        );

        if policy.require_platform_auth && !claims.has_platform_account() {
            return Err(Error::PlatformAuthRequired);
        }

        let encrypt = policy.requires_encryption(claims.has_platform_account());
        let identity = PlayerIdentity {
            claims,
            appearance: client.appearance,
            trust: chain.trust,
            client_public_key: chain.identity_public_key,
        };

        if !encrypt {
            log_transition(
                self.endpoint,
                HandshakeState::ValidatingIdentity,
                HandshakeState::PlainHandshake,
            );
            return Ok(ValidatedLogin {
                identity,
                encryption: None,
            });
        }

        log_transition(
            self.endpoint,
            HandshakeState::ValidatingIdentity,
            HandshakeState::NegotiatingEncryption,
        );
        let negotiated = agreement::negotiate(&identity.client_public_key)?;
        let encryption = EncryptionSetup::from_negotiated(&negotiated)?;

        Ok(ValidatedLogin {
            identity,
            encryption: Some(encryption),
        })
    }
}

/// Outcome of a successful validation.
#[derive(Debug)]
pub struct ValidatedLogin {
    identity: PlayerIdentity,
    encryption: Option<EncryptionSetup>,
}

impl ValidatedLogin {
    /// Identity that will be handed to player creation.
    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Whether the session will be encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }
}

#[derive(Debug)]
struct EncryptionSetup {
    token: String,
    context: CryptoContext,
}

impl EncryptionSetup {
    fn from_negotiated(negotiated: &Negotiated) -> Result<Self> {
        let keypair = negotiated.keypair();
        let token = token::sign(
            &SaltClaims {
                salt: negotiated.salt_base64(),
            },
            &keypair.signing_key(),
            &STANDARD.encode(keypair.public_key_der()),
        )?;

        Ok(Self {
            token,
            context: negotiated.crypto_context(),
        })
    }
}

enum Stage {
    AwaitingNetworkSettings,
    AwaitingLogin,
    Validating,
    AwaitingClientAck(Box<PlayerIdentity>),
    Established,
    Rejected,
}

/// Server side of the login handshake for one session.
pub struct LoginHandshake {
    config: Arc<HandshakeConfig>,
    endpoint: SocketAddr,
    stage: Stage,
    guard: LoginGuard,
}

impl LoginHandshake {
    /// New handshake awaiting the network settings request.
    pub fn new(config: Arc<HandshakeConfig>, endpoint: SocketAddr) -> Self {
        Self {
            config,
            endpoint,
            stage: Stage::AwaitingNetworkSettings,
            guard: LoginGuard::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        match self.stage {
            Stage::AwaitingNetworkSettings => HandshakeState::AwaitingNetworkSettings,
            Stage::AwaitingLogin => HandshakeState::AwaitingLogin,
            Stage::Validating => HandshakeState::ValidatingIdentity,
            Stage::AwaitingClientAck(_) => HandshakeState::AwaitingClientAck,
            Stage::Established => HandshakeState::Established,
            Stage::Rejected => HandshakeState::Rejected,
        }
    }

    /// Whether the session reached `Established`.
    pub fn is_established(&self) -> bool {
        matches!(self.stage, Stage::Established)
    }

    /// Whether the session was rejected or abandoned.
    pub fn is_rejected(&self) -> bool {
        matches!(self.stage, Stage::Rejected)
    }

    /// Client endpoint.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Feed a packet and run any login validation inline.
    pub fn handle(&mut self, packet: ClientPacket) -> Vec<Action> {
        match self.begin(packet) {
            Progress::Ignored => Vec::new(),
            Progress::Actions(actions) => actions,
            Progress::Validate(pending) => {
                let result = pending.validate();
                self.finish_login(result)
            }
        }
    }

    /// Feed a packet without running validation.
    pub fn begin(&mut self, packet: ClientPacket) -> Progress {
        let state = self.state();
        match (state, packet) {
            (HandshakeState::Established | HandshakeState::Rejected, packet) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    packet = packet.name(),
                    %state,
                    "handshake finished; packet ignored"
                );
                Progress::Ignored
            }
            (_, ClientPacket::Game(game)) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    id = game.id,
                    %state,
                    "game packet before establishment ignored"
                );
                Progress::Ignored
            }
            (
                _,
                ClientPacket::Login {
                    protocol_version,
                    payload,
                },
            ) => self.on_login(protocol_version, payload),
            (
                HandshakeState::AwaitingNetworkSettings,
                ClientPacket::RequestNetworkSettings { protocol_version },
            ) => Progress::Actions(self.on_network_settings(protocol_version)),
            (HandshakeState::AwaitingClientAck, ClientPacket::ClientToServerHandshake) => {
                match std::mem::replace(&mut self.stage, Stage::Rejected) {
                    Stage::AwaitingClientAck(identity) => {
                        Progress::Actions(self.establish(*identity))
                    }
                    other => {
                        self.stage = other;
                        Progress::Ignored
                    }
                }
            }
            (state, packet) => Progress::Actions(self.reject(Error::UnexpectedPacket(format!(
                "{} in state {}",
                packet.name(),
                state
            )))),
        }
    }

    /// Apply the outcome of [`PendingLogin::validate`].
    ///
    /// Returns no actions if the session left `ValidatingIdentity` while
    /// validation ran.
    pub fn finish_login(&mut self, result: Result<ValidatedLogin>) -> Vec<Action> {
        if !matches!(self.stage, Stage::Validating) {
            tracing::debug!(
                endpoint = %self.endpoint,
                state = %self.state(),
                "login validation finished after session moved on; result dropped"
            );
            return Vec::new();
        }

        match result {
            Err(err) => self.reject(err),
            Ok(ValidatedLogin {
                identity,
                encryption: Some(setup),
            }) => {
                self.transition(Stage::AwaitingClientAck(Box::new(identity)));
                vec![
                    Action::Send(ServerPacket::ServerToClientHandshake { token: setup.token }),
                    Action::InstallCipher(setup.context),
                ]
            }
            Ok(ValidatedLogin {
                identity,
                encryption: None,
            }) => self.establish(identity),
        }
    }

    /// Mark the session dead without emitting anything.
    pub fn abandon(&mut self) {
        if !matches!(self.stage, Stage::Established | Stage::Rejected) {
            tracing::debug!(
                endpoint = %self.endpoint,
                state = %self.state(),
                "handshake abandoned"
            );
            self.stage = Stage::Rejected;
        }
    }

    fn on_network_settings(&mut self, protocol_version: u32) -> Vec<Action> {
        if let Err(err) = self.config.policy.check_protocol(protocol_version) {
            return self.reject_version(protocol_version, err);
        }

        let compression = self.config.policy.compression;
        self.transition(Stage::AwaitingLogin);
        vec![Action::Send(ServerPacket::NetworkSettings {
            compression_threshold: compression.threshold,
            compression_algorithm: compression.algorithm,
        })]
    }

    fn on_login(&mut self, protocol_version: u32, payload: Vec<u8>) -> Progress {
        if !self.guard.try_acquire() {
            tracing::debug!(
                endpoint = %self.endpoint,
                state = %self.state(),
                "duplicate login ignored"
            );
            return Progress::Ignored;
        }

        if !matches!(self.stage, Stage::AwaitingLogin) {
            let err = Error::UnexpectedPacket(format!("Login in state {}", self.state()));
            return Progress::Actions(self.reject(err));
        }

        if let Err(err) = self.config.policy.check_protocol(protocol_version) {
            return Progress::Actions(self.reject_version(protocol_version, err));
        }

        self.transition(Stage::Validating);
        Progress::Validate(PendingLogin {
            config: Arc::clone(&self.config),
            endpoint: self.endpoint,
            protocol_version,
            payload,
            now: None,
        })
    }

    fn establish(&mut self, identity: PlayerIdentity) -> Vec<Action> {
        self.transition(Stage::Established);
        tracing::debug!(
            endpoint = %self.endpoint,
            display_name = %identity.display_name(),
            trust = %identity.trust,
            "session established"
        );
        vec![
            Action::Send(ServerPacket::PlayStatus(PlayStatus::LoginSuccess)),
            Action::CreatePlayer(identity),
        ]
    }

    fn reject_version(&mut self, protocol_version: u32, err: Error) -> Vec<Action> {
        let status = self.config.policy.version_status(protocol_version);
        let mut actions = vec![Action::Send(ServerPacket::PlayStatus(status))];
        actions.extend(self.reject(err));
        actions
    }

    fn reject(&mut self, err: Error) -> Vec<Action> {
        let reason = err.disconnect_reason();
        tracing::debug!(
            endpoint = %self.endpoint,
            state = %self.state(),
            error = %err,
            reason = %reason,
            "handshake rejected"
        );
        self.stage = Stage::Rejected;
        vec![Action::Disconnect(reason)]
    }

    fn transition(&mut self, to: Stage) {
        let from = self.state();
        self.stage = to;
        log_transition(self.endpoint, from, self.state());
    }
}

impl fmt::Debug for LoginHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginHandshake")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn log_transition(endpoint: SocketAddr, from: HandshakeState, to: HandshakeState) {
    tracing::debug!(%endpoint, %from, %to, "handshake transition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TrustLevel;
    use crate::config::LoginPolicy;
    use crate::mock::LoginFixture;
    use crate::packet::GamePacket;

    fn endpoint() -> SocketAddr {
        "127.0.0.1:19132".parse().unwrap()
    }

    fn handshake(fixture: &LoginFixture, policy: LoginPolicy) -> LoginHandshake {
        LoginHandshake::new(fixture.config(policy), endpoint())
    }

    fn settings(fixture: &LoginFixture) -> ClientPacket {
        ClientPacket::RequestNetworkSettings {
            protocol_version: fixture.protocol_version(),
        }
    }

    #[test]
    fn test_network_settings_reply() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());

        let actions = hs.handle(settings(&fixture));
        assert!(matches!(
            actions.as_slice(),
            [Action::Send(ServerPacket::NetworkSettings {
                compression_threshold: 512,
                ..
            })]
        ));
        assert_eq!(hs.state(), HandshakeState::AwaitingLogin);
    }

    #[test]
    fn test_old_client_rejected_before_login() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy::default();
        let too_old = policy.min_protocol_version - 1;
        let mut hs = handshake(&fixture, policy);

        let actions = hs.handle(ClientPacket::RequestNetworkSettings {
            protocol_version: too_old,
        });
        assert!(matches!(
            actions.as_slice(),
            [
                Action::Send(ServerPacket::PlayStatus(PlayStatus::FailedClient)),
                Action::Disconnect(DisconnectReason::VersionMismatch)
            ]
        ));
        assert_eq!(hs.state(), HandshakeState::Rejected);
    }

    #[test]
    fn test_new_client_gets_failed_server() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy::default();
        let too_new = policy.max_protocol_version + 1;
        let mut hs = handshake(&fixture, policy);

        let actions = hs.handle(ClientPacket::RequestNetworkSettings {
            protocol_version: too_new,
        });
        assert!(matches!(
            actions.first(),
            Some(Action::Send(ServerPacket::PlayStatus(PlayStatus::FailedServer)))
        ));
    }

    #[test]
    fn test_plain_login_establishes_immediately() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy {
            encrypt_by_default: false,
            ..Default::default()
        };
        let mut hs = handshake(&fixture, policy);
        hs.handle(settings(&fixture));

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let actions = hs.handle(login);
        match actions.as_slice() {
            [
                Action::Send(ServerPacket::PlayStatus(PlayStatus::LoginSuccess)),
                Action::CreatePlayer(identity),
            ] => {
                assert_eq!(identity.display_name(), fixture.display_name());
                assert_eq!(identity.trust, TrustLevel::Rooted);
            }
            other => panic!("unexpected actions: {:?}", other),
        }
        assert!(hs.is_established());
    }

    #[test]
    fn test_encrypted_login_sends_token_then_cipher() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let actions = hs.handle(login);
        let token = match actions.as_slice() {
            [
                Action::Send(ServerPacket::ServerToClientHandshake { token }),
                Action::InstallCipher(_),
            ] => token.clone(),
            other => panic!("unexpected actions: {:?}", other),
        };
        assert_eq!(hs.state(), HandshakeState::AwaitingClientAck);

        // The client can derive the same keys from the token.
        assert!(fixture.complete_handshake(&token).is_ok());

        let actions = hs.handle(ClientPacket::ClientToServerHandshake);
        assert!(matches!(actions.as_slice(), [Action::Send(_), Action::CreatePlayer(_)]));
        assert!(hs.is_established());
    }

    #[test]
    fn test_duplicate_login_ignored() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let pending = match hs.begin(login.clone()) {
            Progress::Validate(pending) => pending,
            other => panic!("expected validation, got {:?}", other),
        };
        assert_eq!(hs.state(), HandshakeState::ValidatingIdentity);

        // Redelivered while validation is in flight.
        assert!(matches!(hs.begin(login.clone()), Progress::Ignored));

        hs.finish_login(pending.validate());
        hs.handle(ClientPacket::ClientToServerHandshake);
        assert!(hs.is_established());

        // And after establishment.
        assert!(matches!(hs.begin(login), Progress::Ignored));
    }

    #[test]
    fn test_self_signed_needs_platform_auth_off() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let login = fixture
            .login_packet(&fixture.self_signed_chain().unwrap())
            .unwrap();
        let actions = hs.handle(login);
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect(DisconnectReason::PlatformAuthRequired)]
        ));
        assert!(hs.is_rejected());
    }

    #[test]
    fn test_self_signed_plain_when_encrypt_by_default() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy {
            require_platform_auth: false,
            ..Default::default()
        };
        let mut hs = handshake(&fixture, policy);
        hs.handle(settings(&fixture));

        let login = fixture
            .login_packet(&fixture.self_signed_chain().unwrap())
            .unwrap();
        let actions = hs.handle(login);
        match actions.as_slice() {
            [Action::Send(_), Action::CreatePlayer(identity)] => {
                assert_eq!(identity.xuid(), None);
                assert_eq!(identity.trust, TrustLevel::SelfSigned);
            }
            other => panic!("unexpected actions: {:?}", other),
        }
    }

    #[test]
    fn test_encrypt_all_covers_self_signed() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy {
            require_platform_auth: false,
            encrypt_all: true,
            ..Default::default()
        };
        let mut hs = handshake(&fixture, policy);
        hs.handle(settings(&fixture));

        let login = fixture
            .login_packet(&fixture.self_signed_chain().unwrap())
            .unwrap();
        let actions = hs.handle(login);
        assert!(matches!(actions.last(), Some(Action::InstallCipher(_))));
    }

    #[test]
    fn test_forged_chain_rejected() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let actions = hs.handle(fixture.login_packet(&fixture.forged_chain().unwrap()).unwrap());
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect(DisconnectReason::InvalidIdentity)]
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let actions = hs.handle(ClientPacket::Login {
            protocol_version: fixture.protocol_version(),
            payload: vec![0, 0, 0, 9, b'{'],
        });
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect(DisconnectReason::InvalidLogin)]
        ));
    }

    #[test]
    fn test_login_protocol_rechecked() {
        let fixture = LoginFixture::new().unwrap();
        let policy = LoginPolicy::default();
        let too_new = policy.max_protocol_version + 1;
        let mut hs = handshake(&fixture, policy);
        hs.handle(settings(&fixture));

        let payload = fixture.login_payload(&fixture.rooted_chain().unwrap()).unwrap();
        let actions = hs.handle(ClientPacket::Login {
            protocol_version: too_new,
            payload,
        });
        assert!(matches!(
            actions.last(),
            Some(Action::Disconnect(DisconnectReason::VersionMismatch))
        ));
    }

    #[test]
    fn test_login_before_settings_rejected() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let actions = hs.handle(login);
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect(DisconnectReason::ProtocolViolation)]
        ));
    }

    #[test]
    fn test_unexpected_ack_rejected() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let actions = hs.handle(ClientPacket::ClientToServerHandshake);
        assert!(matches!(
            actions.as_slice(),
            [Action::Disconnect(DisconnectReason::ProtocolViolation)]
        ));
    }

    #[test]
    fn test_game_packet_before_establishment_ignored() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());

        let progress = hs.begin(ClientPacket::Game(GamePacket {
            id: 0x01,
            body: vec![1, 2, 3],
        }));
        assert!(matches!(progress, Progress::Ignored));
        assert_eq!(hs.state(), HandshakeState::AwaitingNetworkSettings);
    }

    #[test]
    fn test_result_dropped_after_abandon() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let pending = match hs.begin(login) {
            Progress::Validate(pending) => pending,
            other => panic!("expected validation, got {:?}", other),
        };
        hs.abandon();

        assert!(hs.finish_login(pending.validate()).is_empty());
        assert!(hs.is_rejected());
    }

    #[test]
    fn test_state_never_reports_log_only_states() {
        for policy in [
            LoginPolicy::default(),
            LoginPolicy {
                encrypt_by_default: false,
                ..Default::default()
            },
        ] {
            let fixture = LoginFixture::new().unwrap();
            let mut hs = handshake(&fixture, policy);
            let mut seen = vec![hs.state()];
            hs.handle(settings(&fixture));
            seen.push(hs.state());

            let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
            let pending = match hs.begin(login) {
                Progress::Validate(pending) => pending,
                other => panic!("expected validation, got {:?}", other),
            };
            seen.push(hs.state());
            hs.finish_login(pending.validate());
            seen.push(hs.state());
            hs.handle(ClientPacket::ClientToServerHandshake);
            seen.push(hs.state());

            assert!(hs.is_established(), "states: {:?}", seen);
            assert!(!seen.contains(&HandshakeState::NegotiatingEncryption));
            assert!(!seen.contains(&HandshakeState::PlainHandshake));
        }
    }

    #[test]
    fn test_handshake_token_shape() {
        let fixture = LoginFixture::new().unwrap();
        let mut hs = handshake(&fixture, LoginPolicy::default());
        hs.handle(settings(&fixture));

        let login = fixture.login_packet(&fixture.rooted_chain().unwrap()).unwrap();
        let actions = hs.handle(login);
        let token = match actions.first() {
            Some(Action::Send(ServerPacket::ServerToClientHandshake { token })) => token.clone(),
            other => panic!("unexpected action: {:?}", other),
        };

        let parsed = token::parse::<SaltClaims>(&token).unwrap();
        let x5u = parsed.key_ref().unwrap();
        let key = lg_crypto::keys::verifying_key_from_base64(x5u).unwrap();
        assert!(parsed.verify(&key));
        assert_eq!(parsed.header().alg.as_deref(), Some(token::ALGORITHM));
        assert_eq!(STANDARD.decode(&parsed.payload().salt).unwrap().len(), 16);
    }
}
