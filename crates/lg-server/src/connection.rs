//! One session driven from async code.

use crate::{Error, Result};
use lg_core::config::HandshakeConfig;
use lg_core::handshake::HandshakeState;
use lg_core::packet::ClientPacket;
use lg_core::session::Session;
use lg_core::traits::{PlayerFactory, SessionTransport};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

/// Async wrapper around a [`Session`].
///
/// The session lock is never held across an await. Login validation runs
/// on the blocking pool, so other sessions keep making progress while one
/// verifies its chain and derives keys.
pub struct Connection<T: SessionTransport> {
    endpoint: SocketAddr,
    session: Mutex<Session<T>>,
}

impl<T: SessionTransport + 'static> Connection<T> {
    /// New connection awaiting the network settings request.
    pub fn new(
        config: Arc<HandshakeConfig>,
        transport: T,
        factory: Arc<dyn PlayerFactory>,
    ) -> Self {
        let endpoint = transport.client_endpoint();
        Self {
            endpoint,
            session: Mutex::new(Session::new(config, transport, factory)),
        }
    }

    /// Client endpoint.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Deliver one packet.
    ///
    /// A login is validated on the blocking pool and its result applied
    /// afterwards. Redelivered or concurrent logins are ignored by the
    /// session's login guard.
    ///
    /// # Errors
    ///
    /// Returns `Error::Offload` if the validation task panicked or was
    /// cancelled. Handshake failures are not errors here; they disconnect
    /// the session.
    pub async fn deliver(&self, packet: ClientPacket) -> Result<()> {
        let pending = self.session.lock().begin(packet);
        let Some(pending) = pending else {
            return Ok(());
        };

        tracing::debug!(endpoint = %self.endpoint, "validating login off the session task");
        let result = match tokio::task::spawn_blocking(move || pending.validate()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    "login validation task failed"
                );
                self.session.lock().close();
                return Err(Error::Offload(e.to_string()));
            }
        };

        self.session.lock().complete(result);
        Ok(())
    }

    /// The transport closed.
    pub fn on_transport_closed(&self) {
        tracing::debug!(endpoint = %self.endpoint, "transport closed");
        self.session.lock().close();
    }

    /// Handshake state, or `None` once playing or closed.
    pub fn handshake_state(&self) -> Option<HandshakeState> {
        self.session.lock().handshake_state()
    }

    /// Whether a player was created.
    pub fn is_established(&self) -> bool {
        self.session.lock().is_established()
    }

    /// Whether the session ended.
    pub fn is_closed(&self) -> bool {
        self.session.lock().is_closed()
    }
}
