//! Feed store: the observable state of one subscriber's feed connection.
//!
//! The store is owned by a single [`FeedConnectionManager`] and shared with
//! the handlers it attaches. Every mutation names the connection it comes
//! from; mutations from any connection other than the current one are
//! discarded.
//!
//! [`FeedConnectionManager`]: crate::ws::FeedConnectionManager

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use notifykit_shared::{FeedMessage, Identity};
use tokio::sync::watch;

use crate::ws::{lock, ConnectionId, ConnectionPhase, FeedEvent};

/// Read-only view of the connection the state belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub identity: Identity,
    pub phase: ConnectionPhase,
}

/// Snapshot of a subscriber's feed connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    /// `None` until a complete identity has been configured
    pub connection: Option<ConnectionInfo>,
    pub is_connected: bool,
    /// Messages received since the last connect, in arrival order
    pub messages: Vec<FeedMessage>,
    /// When the current link came up, e.g. `Tue, 17 Oct 2026 10:00:00 GMT`
    pub last_connected_at: Option<String>,
}

impl ConnectionState {
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.as_ref().map(|c| c.id)
    }

    pub fn phase(&self) -> Option<ConnectionPhase> {
        self.connection.as_ref().map(|c| c.phase)
    }

    fn reset_link(&mut self) {
        self.is_connected = false;
        self.messages.clear();
        self.last_connected_at = None;
    }
}

/// Format a timestamp the way HTTP dates are written (RFC 1123, always GMT).
pub fn format_utc(ts: DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Owner of a [`ConnectionState`] and its change stream.
///
/// Mutations happen under `state`. The watch channel is only touched after
/// that lock is released, so a consumer holding a `watch::Ref` can still call
/// into the store. Snapshots carry a revision and older ones are never
/// published over newer ones.
pub struct FeedStore {
    state: Mutex<Revisioned>,
    changes: watch::Sender<ConnectionState>,
    /// Revision of the snapshot in `changes`, only touched under its lock
    published: AtomicU64,
}

#[derive(Default)]
struct Revisioned {
    state: ConnectionState,
    revision: u64,
}

impl Default for FeedStore {
    fn default() -> Self {
        let (changes, _) = watch::channel(ConnectionState::default());
        Self {
            state: Mutex::new(Revisioned::default()),
            changes,
            published: AtomicU64::new(0),
        }
    }
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConnectionState {
        lock(&self.state).state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.changes.subscribe()
    }

    /// Run `mutate` under the state lock and publish the result if it
    /// returned `true`.
    fn update(&self, mutate: impl FnOnce(&mut ConnectionState) -> bool) -> bool {
        let (snapshot, revision) = {
            let mut guard = lock(&self.state);
            if !mutate(&mut guard.state) {
                return false;
            }
            guard.revision += 1;
            (guard.state.clone(), guard.revision)
        };

        self.changes.send_if_modified(|current| {
            if revision <= self.published.load(Ordering::SeqCst) {
                return false;
            }
            self.published.store(revision, Ordering::SeqCst);
            *current = snapshot;
            true
        });
        true
    }

    /// Make `id` the current connection with fresh state
    pub fn install(&self, id: ConnectionId, identity: Identity) {
        self.update(|state| {
            *state = ConnectionState {
                connection: Some(ConnectionInfo {
                    id,
                    identity,
                    phase: ConnectionPhase::Created,
                }),
                ..Default::default()
            };
            true
        });
    }

    /// Move the current connection to `phase`. Ignored for stale ids.
    ///
    /// Closing resets the connection flag, the buffer and the timestamp.
    pub fn set_phase(&self, id: ConnectionId, phase: ConnectionPhase) -> bool {
        self.update(|state| {
            let Some(info) = state.connection.as_mut().filter(|c| c.id == id) else {
                return false;
            };
            info.phase = phase;
            if phase.is_closed() {
                state.reset_link();
            }
            true
        })
    }

    /// Apply an event emitted by connection `id`.
    ///
    /// Returns `false` when the event was discarded: it came from a
    /// superseded or closed connection, or it carried messages while
    /// disconnected.
    pub fn apply(&self, id: ConnectionId, event: FeedEvent) -> bool {
        self.update(|state| {
            let Some(info) = state.connection.as_mut().filter(|c| c.id == id) else {
                crate::log_debug!(
                    "Discarding '{}' from stale connection {}",
                    event.kind().as_str(),
                    id
                );
                return false;
            };
            if info.phase.is_closed() {
                crate::log_debug!(
                    "Discarding '{}' from closed connection {}",
                    event.kind().as_str(),
                    id
                );
                return false;
            }

            match event {
                FeedEvent::Connect => {
                    info.phase = ConnectionPhase::Connected;
                    state.is_connected = true;
                    state.last_connected_at = Some(format_utc(Utc::now()));
                }
                FeedEvent::Disconnect => {
                    info.phase = ConnectionPhase::Disconnected;
                    state.reset_link();
                }
                FeedEvent::Message(items) => {
                    if !state.is_connected {
                        crate::log_warn!(
                            "Dropping {} feed item(s) received while disconnected on {}",
                            items.len(),
                            id
                        );
                        return false;
                    }
                    state.messages.extend(items);
                }
            }
            true
        })
    }
}

/// Cloneable read-only handle to a [`FeedStore`].
#[derive(Clone)]
pub struct FeedStateReader {
    store: Arc<FeedStore>,
}

impl FeedStateReader {
    pub(crate) fn new(store: Arc<FeedStore>) -> Self {
        Self { store }
    }

    pub fn state(&self) -> ConnectionState {
        self.store.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.store.state).state.is_connected
    }

    pub fn messages(&self) -> Vec<FeedMessage> {
        lock(&self.store.state).state.messages.clone()
    }

    pub fn last_connected_at(&self) -> Option<String> {
        lock(&self.store.state).state.last_connected_at.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use notifykit_shared::Environment;
    use serde_json::json;

    fn identity(subscriber: &str) -> Identity {
        Identity::new(Some(subscriber), Environment::Prod, Some(1), false)
    }

    fn msg(id: u64) -> FeedMessage {
        FeedMessage(json!({ "id": id }))
    }

    #[test]
    fn utc_timestamp_is_human_readable() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 17, 9, 5, 3).unwrap();
        assert_eq!(format_utc(ts), "Sat, 17 Oct 2026 09:05:03 GMT");
    }

    #[test]
    fn install_resets_previous_state() {
        let store = FeedStore::new();
        store.install(ConnectionId(1), identity("0xA"));
        store.apply(ConnectionId(1), FeedEvent::Connect);
        store.apply(ConnectionId(1), FeedEvent::Message(vec![msg(1)]));

        store.install(ConnectionId(2), identity("0xB"));
        let state = store.snapshot();
        assert_eq!(state.connection_id(), Some(ConnectionId(2)));
        assert_eq!(state.phase(), Some(ConnectionPhase::Created));
        assert!(!state.is_connected);
        assert!(state.messages.is_empty());
        assert!(state.last_connected_at.is_none());
    }

    #[test]
    fn stale_and_closed_events_are_discarded() {
        let store = FeedStore::new();
        store.install(ConnectionId(1), identity("0xA"));
        store.install(ConnectionId(2), identity("0xB"));

        assert!(!store.apply(ConnectionId(1), FeedEvent::Connect));
        assert!(!store.snapshot().is_connected);

        assert!(store.set_phase(ConnectionId(2), ConnectionPhase::Closed));
        assert_eq!(store.snapshot().phase(), Some(ConnectionPhase::Closed));
        assert!(!store.apply(ConnectionId(2), FeedEvent::Connect));
        assert!(!store.set_phase(ConnectionId(1), ConnectionPhase::Connecting));
    }

    #[test]
    fn messages_require_a_live_connection() {
        let store = FeedStore::new();
        store.install(ConnectionId(1), identity("0xA"));
        assert!(!store.apply(ConnectionId(1), FeedEvent::Message(vec![msg(1)])));

        store.apply(ConnectionId(1), FeedEvent::Connect);
        assert!(store.apply(ConnectionId(1), FeedEvent::Message(vec![msg(1)])));
        assert_eq!(store.snapshot().messages, vec![msg(1)]);
    }

    #[test]
    fn closing_resets_the_link_fields() {
        let store = FeedStore::new();
        store.install(ConnectionId(1), identity("0xA"));
        store.apply(ConnectionId(1), FeedEvent::Connect);
        store.apply(ConnectionId(1), FeedEvent::Message(vec![msg(1)]));

        store.set_phase(ConnectionId(1), ConnectionPhase::Closed);

        let state = store.snapshot();
        assert_eq!(state.connection_id(), Some(ConnectionId(1)));
        assert!(!state.is_connected);
        assert!(state.messages.is_empty());
        assert!(state.last_connected_at.is_none());
    }

    #[test]
    fn reader_works_while_a_watch_borrow_is_held() {
        let store = Arc::new(FeedStore::new());
        let reader = FeedStateReader::new(store.clone());
        let rx = reader.subscribe();
        store.install(ConnectionId(1), identity("0xA"));

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let (borrowed_tx, borrowed_rx) = std::sync::mpsc::channel();
        let consumer = std::thread::spawn(move || {
            let held = rx.borrow();
            borrowed_tx.send(()).expect("signal borrow");
            std::thread::sleep(std::time::Duration::from_millis(100));
            // Must not wait on a writer blocked behind `held`
            let _ = reader.is_connected();
            let _ = reader.state();
            drop(held);
            done_tx.send(()).expect("report");
        });

        borrowed_rx.recv().expect("consumer borrowed");
        let writer_store = store.clone();
        let writer = std::thread::spawn(move || {
            writer_store.apply(ConnectionId(1), FeedEvent::Connect)
        });

        done_rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("consumer finished without blocking");
        assert!(writer.join().expect("writer thread"));
        consumer.join().expect("consumer thread");
        assert!(store.subscribe().borrow().is_connected);
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let store = Arc::new(FeedStore::new());
        let reader = FeedStateReader::new(store.clone());
        let mut rx = reader.subscribe();

        store.install(ConnectionId(1), identity("0xA"));
        store.apply(ConnectionId(1), FeedEvent::Connect);

        let state = rx
            .wait_for(|s| s.is_connected)
            .await
            .expect("store alive")
            .clone();
        assert!(state.last_connected_at.is_some());
        assert_eq!(reader.last_connected_at(), state.last_connected_at);
    }
}
