//! Session driver: connects a [`LoginHandshake`] to its transport and to
//! the player factory.
//!
//! Drivers that want validation off the calling thread use
//! [`Session::begin`] and [`Session::complete`]; [`Session::deliver`] runs
//! everything inline.

use crate::config::HandshakeConfig;
use crate::handshake::{
    Action, HandshakeState, LoginHandshake, PendingLogin, Progress, ValidatedLogin,
};
use crate::packet::ClientPacket;
use crate::traits::{MessageHandler, PlayerFactory, SessionTransport};
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;

/// Result of applying a batch of handshake actions.
pub enum Outcome {
    /// Handshake continues.
    Continue,
    /// Player created; subsequent packets go to this handler.
    Established(Box<dyn MessageHandler>),
    /// Session disconnected, or the transport went away mid-batch.
    Closed,
}

/// Apply actions in order.
///
/// `InstallCipher` and `CreatePlayer` are skipped, and the batch stops, if
/// the transport is no longer connected.
pub fn apply_actions<T: SessionTransport + ?Sized>(
    transport: &T,
    factory: &dyn PlayerFactory,
    actions: Vec<Action>,
) -> Outcome {
    let mut outcome = Outcome::Continue;

    for action in actions {
        match action {
            Action::Send(packet) => transport.send(packet),
            Action::InstallCipher(context) => {
                if !transport.is_connected() {
                    tracing::debug!(
                        endpoint = %transport.client_endpoint(),
                        "transport closed; cipher not installed"
                    );
                    return Outcome::Closed;
                }
                let (encryptor, decryptor) = context.split();
                transport.install_cipher(encryptor, decryptor);
            }
            Action::Disconnect(reason) => {
                transport.disconnect(reason.message());
                return Outcome::Closed;
            }
            Action::CreatePlayer(identity) => {
                if !transport.is_connected() {
                    tracing::debug!(
                        endpoint = %transport.client_endpoint(),
                        "transport closed; player not created"
                    );
                    return Outcome::Closed;
                }
                let handler = factory.create_player(transport.client_endpoint(), identity);
                outcome = Outcome::Established(handler);
            }
        }
    }

    outcome
}

enum Phase {
    Handshaking(LoginHandshake),
    Playing(Box<dyn MessageHandler>),
    Closed,
}

/// One client session from first packet to disconnect.
pub struct Session<T: SessionTransport> {
    transport: T,
    factory: Arc<dyn PlayerFactory>,
    phase: Phase,
}

impl<T: SessionTransport> Session<T> {
    /// New session awaiting the network settings request.
    pub fn new(
        config: Arc<HandshakeConfig>,
        transport: T,
        factory: Arc<dyn PlayerFactory>,
    ) -> Self {
        let endpoint = transport.client_endpoint();
        Self {
            transport,
            factory,
            phase: Phase::Handshaking(LoginHandshake::new(config, endpoint)),
        }
    }

    /// The session's transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Client endpoint.
    pub fn endpoint(&self) -> SocketAddr {
        self.transport.client_endpoint()
    }

    /// Handshake state, or `None` once the session is playing or closed.
    pub fn handshake_state(&self) -> Option<HandshakeState> {
        match &self.phase {
            Phase::Handshaking(handshake) => Some(handshake.state()),
            Phase::Playing(_) | Phase::Closed => None,
        }
    }

    /// Whether a player was created.
    pub fn is_established(&self) -> bool {
        matches!(self.phase, Phase::Playing(_))
    }

    /// Whether the session ended.
    pub fn is_closed(&self) -> bool {
        matches!(self.phase, Phase::Closed)
    }

    /// Handle a packet, validating any login inline.
    pub fn deliver(&mut self, packet: ClientPacket) {
        if let Some(pending) = self.begin(packet) {
            let result = pending.validate();
            self.complete(result);
        }
    }

    /// Handle a packet; returns the login to validate, if one was accepted.
    pub fn begin(&mut self, packet: ClientPacket) -> Option<PendingLogin> {
        let progress = match &mut self.phase {
            Phase::Handshaking(handshake) => handshake.begin(packet),
            Phase::Playing(handler) => {
                if packet.is_login_phase() {
                    tracing::debug!(
                        endpoint = %self.transport.client_endpoint(),
                        packet = packet.name(),
                        "login packet after establishment dropped"
                    );
                } else {
                    handler.handle(packet);
                }
                return None;
            }
            Phase::Closed => {
                tracing::debug!(
                    endpoint = %self.transport.client_endpoint(),
                    packet = packet.name(),
                    "session closed; packet dropped"
                );
                return None;
            }
        };

        match progress {
            Progress::Ignored => None,
            Progress::Actions(actions) => {
                self.apply(actions);
                None
            }
            Progress::Validate(pending) => Some(pending),
        }
    }

    /// Feed back the result of validating a login from [`Session::begin`].
    ///
    /// Nothing is applied if the transport closed in the meantime.
    pub fn complete(&mut self, result: Result<ValidatedLogin>) {
        if !self.transport.is_connected() {
            tracing::debug!(
                endpoint = %self.transport.client_endpoint(),
                "transport closed during login validation"
            );
            self.close();
            return;
        }

        let actions = match &mut self.phase {
            Phase::Handshaking(handshake) => handshake.finish_login(result),
            Phase::Playing(_) | Phase::Closed => return,
        };
        self.apply(actions);
    }

    /// Transport closed. Drops the handshake or the player handler.
    pub fn close(&mut self) {
        if let Phase::Handshaking(handshake) = &mut self.phase {
            handshake.abandon();
        }
        self.phase = Phase::Closed;
    }

    fn apply(&mut self, actions: Vec<Action>) {
        match apply_actions(&self.transport, self.factory.as_ref(), actions) {
            Outcome::Continue => {}
            Outcome::Established(handler) => self.phase = Phase::Playing(handler),
            Outcome::Closed => self.close(),
        }
    }
}
