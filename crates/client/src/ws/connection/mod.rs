//! Feed connection types shared by every transport.
//!
//! A transport socket owns a [`HandlerTable`] with exactly one slot per
//! [`FeedEventKind`]. Handlers are attached and detached by kind, and the
//! table can report whether any handler is still wired.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use notifykit_shared::{
    Environment, FeedError, FeedMessage, Identity, EVENT_CONNECT, EVENT_DISCONNECT,
    EVENT_USER_FEEDS,
};

/// Lifecycle phase of a single feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Handlers attached, `open()` not yet issued
    Created,
    Connecting,
    Connected,
    /// The transport dropped the link; it may come back on its own
    Disconnected,
    /// Closed by the manager. Terminal.
    Closed,
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionPhase::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionPhase::Connecting)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionPhase::Closed)
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }

    /// Whether `attempt` failed attempts exhaust the budget
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Identifies one connection instance for the lifetime of a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of events a feed socket emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedEventKind {
    Connect,
    Disconnect,
    Message,
}

impl FeedEventKind {
    pub const ALL: [FeedEventKind; 3] = [
        FeedEventKind::Connect,
        FeedEventKind::Disconnect,
        FeedEventKind::Message,
    ];

    /// Event name used by the feed service
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedEventKind::Connect => EVENT_CONNECT,
            FeedEventKind::Disconnect => EVENT_DISCONNECT,
            FeedEventKind::Message => EVENT_USER_FEEDS,
        }
    }
}

/// An event emitted by a feed socket
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connect,
    Disconnect,
    /// Never empty; usually holds exactly one item
    Message(Vec<FeedMessage>),
}

impl FeedEvent {
    pub fn kind(&self) -> FeedEventKind {
        match self {
            FeedEvent::Connect => FeedEventKind::Connect,
            FeedEvent::Disconnect => FeedEventKind::Disconnect,
            FeedEvent::Message(_) => FeedEventKind::Message,
        }
    }
}

/// Callback invoked for one kind of feed event.
pub type FeedHandler = Arc<dyn Fn(FeedEvent) + Send + Sync>;

/// Per-connection handler table, one slot per event kind.
#[derive(Clone, Default)]
pub struct HandlerTable {
    connect: Option<FeedHandler>,
    disconnect: Option<FeedHandler>,
    message: Option<FeedHandler>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("connect", &self.connect.is_some())
            .field("disconnect", &self.disconnect.is_some())
            .field("message", &self.message.is_some())
            .finish()
    }
}

impl HandlerTable {
    fn slot(&mut self, kind: FeedEventKind) -> &mut Option<FeedHandler> {
        match kind {
            FeedEventKind::Connect => &mut self.connect,
            FeedEventKind::Disconnect => &mut self.disconnect,
            FeedEventKind::Message => &mut self.message,
        }
    }

    /// Install `handler` for `kind`, replacing any previous one.
    pub fn set(&mut self, kind: FeedEventKind, handler: FeedHandler) {
        *self.slot(kind) = Some(handler);
    }

    /// Remove the handler for `kind`. Returns whether one was installed.
    pub fn remove(&mut self, kind: FeedEventKind) -> bool {
        self.slot(kind).take().is_some()
    }

    pub fn get(&self, kind: FeedEventKind) -> Option<FeedHandler> {
        match kind {
            FeedEventKind::Connect => self.connect.clone(),
            FeedEventKind::Disconnect => self.disconnect.clone(),
            FeedEventKind::Message => self.message.clone(),
        }
    }

    pub fn is_attached(&self, kind: FeedEventKind) -> bool {
        self.get(kind).is_some()
    }

    /// True once every slot has been cleared
    pub fn is_empty(&self) -> bool {
        FeedEventKind::ALL.iter().all(|kind| !self.is_attached(*kind))
    }
}

/// Deliver `event` through a shared table.
///
/// The handler is cloned out under the lock and invoked after it is released,
/// so a handler may itself touch the table. Returns whether a handler ran.
pub fn dispatch(handlers: &Mutex<HandlerTable>, event: FeedEvent) -> bool {
    let handler = lock(handlers).get(event.kind());
    match handler {
        Some(handler) => {
            handler(event);
            true
        }
        None => false,
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parameters a transport needs to build one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketParams {
    /// Subscriber address, already formatted per the identity's flag
    pub subscriber: String,
    pub environment: Environment,
    /// Whether the socket connects on construction. The manager always
    /// passes `false` and opens explicitly after wiring handlers.
    pub auto_connect: bool,
}

impl SocketParams {
    /// Build manual-open parameters, or `None` for an incomplete identity.
    pub fn for_identity(identity: &Identity) -> Option<Self> {
        Some(Self {
            subscriber: identity.formatted_subscriber()?,
            environment: identity.environment,
            auto_connect: false,
        })
    }
}

/// One connection to the feed service.
///
/// Sockets use interior mutability like an event emitter: all methods take
/// `&self` and are non-blocking. `open` and `close` only schedule work on the
/// transport.
pub trait FeedSocket: Send + Sync {
    /// Whether the underlying link is currently open
    fn is_open(&self) -> bool;

    fn open(&self) -> Result<(), FeedError>;

    fn close(&self) -> Result<(), FeedError>;

    /// Attach `handler` for `kind`, replacing any previous one
    fn on(&self, kind: FeedEventKind, handler: FeedHandler);

    /// Detach the handler for `kind`
    fn off(&self, kind: FeedEventKind);

    /// Whether any handler is still attached
    fn has_handlers(&self) -> bool;
}

/// Factory for feed sockets. Construction never connects.
pub trait FeedConnector {
    type Socket: FeedSocket;

    fn create(&self, params: SocketParams) -> Self::Socket;
}

mod connection_native;
pub use connection_native::{feed_socket_url, TungsteniteConnector, TungsteniteSocket};

#[cfg(test)]
pub(crate) mod connection_mock;
