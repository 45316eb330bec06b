//! Collaborator traits at the edges of the handshake.
//!
//! The handshake owns no I/O. A transport implements [`SessionTransport`],
//! gameplay code implements [`PlayerFactory`] and [`MessageHandler`], and
//! [`crate::session::Session`] wires them to the state machine.
//!
//! Test doubles live in [`crate::mock`].

use crate::identity::PlayerIdentity;
use crate::packet::{ClientPacket, ServerPacket};
use lg_crypto::{Decryptor, Encryptor};
use std::net::SocketAddr;

/// One client connection as seen by the handshake.
///
/// Implementations own framing, compression, ordering and retransmission;
/// every method is non-blocking from the handshake's point of view.
pub trait SessionTransport: Send + Sync {
    /// Queue a packet for the client.
    ///
    /// Once a cipher is installed, the transport encrypts every packet
    /// queued after the call to [`SessionTransport::install_cipher`].
    fn send(&self, packet: ServerPacket);

    /// Close the connection with a client-visible reason.
    fn disconnect(&self, reason: &str);

    /// Install the per-direction packet transforms.
    ///
    /// Called at most once per session. The transport takes exclusive
    /// ownership of both halves and must apply each in strict packet order.
    fn install_cipher(&self, encryptor: Encryptor, decryptor: Decryptor);

    /// Remote address of the client.
    fn client_endpoint(&self) -> SocketAddr;

    /// Whether the connection is still open.
    fn is_connected(&self) -> bool;
}

/// Creates the gameplay side of a session once login completes.
pub trait PlayerFactory: Send + Sync {
    /// Build the handler for an established session.
    ///
    /// Called exactly once per session, and only for live connections.
    fn create_player(&self, endpoint: SocketAddr, identity: PlayerIdentity)
        -> Box<dyn MessageHandler>;
}

/// Receives every non-login packet after establishment.
pub trait MessageHandler: Send {
    /// Handle one packet.
    fn handle(&mut self, packet: ClientPacket);
}
