//! Feed connection manager: one live feed connection per subscriber context.

use std::sync::Arc;

use notifykit_shared::Identity;
use tokio::sync::watch;

use super::connection::{
    ConnectionId, ConnectionPhase, FeedConnector, FeedEvent, FeedEventKind, FeedHandler,
    FeedSocket, SocketParams,
};
use crate::stores::{ConnectionState, FeedStateReader, FeedStore};

/// The socket currently owned by the manager
struct LiveConnection<S> {
    id: ConnectionId,
    identity: Identity,
    socket: S,
}

/// Owns at most one wired feed connection and the state it feeds.
///
/// Replacing a connection always detaches every handler from the old socket
/// and closes it before the new socket is created. Handlers are additionally
/// tagged with their [`ConnectionId`], so an event already in flight on a
/// superseded socket still cannot touch the current state.
///
/// Dropping the manager tears the connection down.
pub struct FeedConnectionManager<C: FeedConnector> {
    connector: C,
    store: Arc<FeedStore>,
    current: Option<LiveConnection<C::Socket>>,
    next_id: u64,
}

impl<C: FeedConnector> FeedConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            store: Arc::new(FeedStore::new()),
            current: None,
            next_id: 1,
        }
    }

    /// Replace the feed connection for `identity`.
    ///
    /// An identity without a subscriber leaves everything untouched,
    /// including an existing connection. Reconfiguring with the identity the
    /// current connection was built from is a no-op.
    pub fn configure(&mut self, identity: Identity) {
        let Some(params) = SocketParams::for_identity(&identity) else {
            crate::log_debug!("Identity has no subscriber, keeping current feed state");
            return;
        };

        if self
            .current
            .as_ref()
            .is_some_and(|live| live.identity == identity)
        {
            crate::log_debug!("Feed identity unchanged, keeping connection");
            return;
        }

        // The old socket must be unwired and closed before its replacement exists
        if let Some(old) = self.current.take() {
            self.retire(old);
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        crate::log_info!(
            "Creating feed connection {} for '{}' on {}",
            id,
            params.subscriber,
            params.environment
        );
        let socket = self.connector.create(params);
        self.store.install(id, identity.clone());

        for kind in FeedEventKind::ALL {
            socket.on(kind, self.handler(id));
        }

        // Set before open so a fast Connect is not overwritten
        self.store.set_phase(id, ConnectionPhase::Connecting);
        if let Err(e) = socket.open() {
            crate::log_error!("Failed to open feed connection {}: {}", id, e);
            self.store.set_phase(id, ConnectionPhase::Disconnected);
        }

        self.current = Some(LiveConnection {
            id,
            identity,
            socket,
        });
    }

    /// Detach handlers from and close the current connection. Idempotent.
    ///
    /// The state keeps the connection info with phase `Closed` and reads as
    /// disconnected with no messages and no connect time.
    pub fn teardown(&mut self) {
        if let Some(live) = self.current.take() {
            self.retire(live);
        }
    }

    /// Snapshot of the observable state
    pub fn state(&self) -> ConnectionState {
        self.store.snapshot()
    }

    /// Stream of state snapshots, updated on every change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.store.subscribe()
    }

    /// Cloneable read-only handle for consumers of the feed
    pub fn reader(&self) -> FeedStateReader {
        FeedStateReader::new(self.store.clone())
    }

    /// Whether the current socket reports an open link
    pub fn is_open(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|live| live.socket.is_open())
    }

    /// Identity of the current connection, if any
    pub fn identity(&self) -> Option<&Identity> {
        self.current.as_ref().map(|live| &live.identity)
    }

    fn handler(&self, id: ConnectionId) -> FeedHandler {
        let store = self.store.clone();
        Arc::new(move |event: FeedEvent| {
            store.apply(id, event);
        })
    }

    fn retire(&self, live: LiveConnection<C::Socket>) {
        for kind in FeedEventKind::ALL {
            live.socket.off(kind);
        }
        if live.socket.has_handlers() {
            crate::log_error!("Feed connection {} still has handlers after detach", live.id);
        }

        if let Err(e) = live.socket.close() {
            crate::log_warn!("Ignoring close failure on feed connection {}: {}", live.id, e);
        }
        self.store.set_phase(live.id, ConnectionPhase::Closed);
        crate::log_info!("Closed feed connection {}", live.id);
    }
}

impl<C: FeedConnector> Drop for FeedConnectionManager<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}
