//! In-memory feed transport for tests.
//!
//! Every socket created by a [`MockConnector`] stays reachable from the test,
//! which can fire events on it at any time, including after it was closed.
//! All socket operations are appended to a journal shared by the connector so
//! tests can assert on cross-socket ordering.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use notifykit_shared::FeedError;

use super::{
    dispatch, lock, FeedConnector, FeedEvent, FeedEventKind, FeedHandler, FeedSocket,
    HandlerTable, SocketParams,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct MockSocketInner {
    index: usize,
    params: SocketParams,
    open: AtomicBool,
    closed: AtomicBool,
    fail_close: bool,
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
    handlers: Mutex<HandlerTable>,
    journal: Journal,
}

#[derive(Clone)]
pub(crate) struct MockSocket(Arc<MockSocketInner>);

impl MockSocket {
    fn record(&self, op: &str) {
        lock(&self.0.journal).push(format!("{}:{}", self.0.index, op));
    }

    pub fn params(&self) -> &SocketParams {
        &self.0.params
    }

    pub fn open_calls(&self) -> usize {
        self.0.open_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.0.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self, kind: FeedEventKind) -> bool {
        lock(&self.0.handlers).is_attached(kind)
    }

    /// Emit `event` as the transport would. Returns whether a handler ran.
    pub fn fire(&self, event: FeedEvent) -> bool {
        match event {
            FeedEvent::Connect => self.0.open.store(true, Ordering::SeqCst),
            FeedEvent::Disconnect => self.0.open.store(false, Ordering::SeqCst),
            FeedEvent::Message(_) => {}
        }
        dispatch(&self.0.handlers, event)
    }

    pub fn handler(&self, kind: FeedEventKind) -> Option<FeedHandler> {
        lock(&self.0.handlers).get(kind)
    }
}

impl FeedSocket for MockSocket {
    fn is_open(&self) -> bool {
        self.0.open.load(Ordering::SeqCst)
    }

    fn open(&self) -> Result<(), FeedError> {
        self.0.open_calls.fetch_add(1, Ordering::SeqCst);
        self.record("open");
        Ok(())
    }

    fn close(&self) -> Result<(), FeedError> {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
        self.record("close");
        self.0.open.store(false, Ordering::SeqCst);
        if self.0.fail_close {
            return Err(FeedError::Teardown("mock close failure".to_string()));
        }
        if self.0.closed.swap(true, Ordering::SeqCst) {
            return Err(FeedError::Teardown("already closed".to_string()));
        }
        Ok(())
    }

    fn on(&self, kind: FeedEventKind, handler: FeedHandler) {
        self.record(&format!("on:{}", kind.as_str()));
        lock(&self.0.handlers).set(kind, handler);
    }

    fn off(&self, kind: FeedEventKind) {
        self.record(&format!("off:{}", kind.as_str()));
        lock(&self.0.handlers).remove(kind);
    }

    fn has_handlers(&self) -> bool {
        !lock(&self.0.handlers).is_empty()
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    sockets: Arc<Mutex<Vec<MockSocket>>>,
    journal: Journal,
    fail_close: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every socket created from now on fail its `close()`
    pub fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        lock(&self.sockets).len()
    }

    pub fn socket(&self, index: usize) -> MockSocket {
        lock(&self.sockets)[index].clone()
    }

    pub fn open_sockets(&self) -> usize {
        lock(&self.sockets).iter().filter(|s| s.is_open()).count()
    }

    pub fn journal(&self) -> Vec<String> {
        lock(&self.journal).clone()
    }
}

impl FeedConnector for MockConnector {
    type Socket = MockSocket;

    fn create(&self, params: SocketParams) -> MockSocket {
        let mut sockets = lock(&self.sockets);
        let socket = MockSocket(Arc::new(MockSocketInner {
            index: sockets.len(),
            params,
            open: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_close: self.fail_close.load(Ordering::SeqCst),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            handlers: Mutex::new(HandlerTable::default()),
            journal: self.journal.clone(),
        }));
        lock(&self.journal).push(format!("{}:create", socket.0.index));
        sockets.push(socket.clone());
        socket
    }
}
