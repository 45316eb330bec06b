//! Endpoint-keyed table of live connections.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::{Error, Result};
use lg_core::packet::ClientPacket;
use lg_core::traits::{PlayerFactory, SessionTransport};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Live connections, one per client endpoint.
///
/// Sessions share nothing mutable beyond this table and the read-only
/// handshake configuration.
pub struct SessionRegistry<T: SessionTransport> {
    config: ServerConfig,
    factory: Arc<dyn PlayerFactory>,
    connections: RwLock<HashMap<SocketAddr, Arc<Connection<T>>>>,
}

impl<T: SessionTransport + 'static> SessionRegistry<T> {
    /// Empty registry.
    pub fn new(config: ServerConfig, factory: Arc<dyn PlayerFactory>) -> Self {
        Self {
            config,
            factory,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new transport.
    ///
    /// # Errors
    ///
    /// - `Error::DuplicateSession` if the endpoint already has a session
    /// - `Error::SessionLimit` if the registry is full
    pub async fn open(&self, transport: T) -> Result<Arc<Connection<T>>> {
        let endpoint = transport.client_endpoint();
        let mut connections = self.connections.write().await;

        if connections.contains_key(&endpoint) {
            return Err(Error::DuplicateSession(endpoint));
        }
        if connections.len() >= self.config.max_sessions {
            tracing::warn!(%endpoint, limit = self.config.max_sessions, "session limit reached");
            return Err(Error::SessionLimit(self.config.max_sessions));
        }

        let connection = Arc::new(Connection::new(
            Arc::clone(&self.config.handshake),
            transport,
            Arc::clone(&self.factory),
        ));
        connections.insert(endpoint, Arc::clone(&connection));
        tracing::debug!(%endpoint, sessions = connections.len(), "session opened");
        Ok(connection)
    }

    /// Look up a connection.
    pub async fn get(&self, endpoint: SocketAddr) -> Option<Arc<Connection<T>>> {
        self.connections.read().await.get(&endpoint).cloned()
    }

    /// Deliver a packet to the endpoint's session.
    ///
    /// # Errors
    ///
    /// - `Error::UnknownSession` if the endpoint has no session
    /// - anything [`Connection::deliver`] returns
    pub async fn deliver(&self, endpoint: SocketAddr, packet: ClientPacket) -> Result<()> {
        let connection = self
            .get(endpoint)
            .await
            .ok_or(Error::UnknownSession(endpoint))?;
        connection.deliver(packet).await
    }

    /// Close and forget the endpoint's session. Returns whether one existed.
    pub async fn close(&self, endpoint: SocketAddr) -> bool {
        let removed = self.connections.write().await.remove(&endpoint);
        match removed {
            Some(connection) => {
                connection.on_transport_closed();
                true
            }
            None => false,
        }
    }

    /// Forget sessions that ended. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|_, connection| !connection.is_closed());
        let removed = before - connections.len();
        if removed > 0 {
            tracing::debug!(removed, sessions = connections.len(), "pruned closed sessions");
        }
        removed
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
