//! Native feed transport using tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use notifykit_shared::{FeedError, FeedFrame, SUBSCRIBER_QUERY_PARAM};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::{
    dispatch, lock, FeedConnector, FeedEvent, FeedEventKind, FeedHandler, FeedSocket,
    HandlerTable, ReconnectConfig, SocketParams,
};

/// Build the feed URL for one subscriber
pub fn feed_socket_url(base: &str, subscriber: &str) -> Result<Url, FeedError> {
    let mut url = Url::parse(base)
        .map_err(|e| FeedError::Transport(format!("invalid feed url '{}': {}", base, e)))?;
    url.query_pairs_mut()
        .append_pair(SUBSCRIBER_QUERY_PARAM, subscriber);
    Ok(url)
}

/// Creates [`TungsteniteSocket`]s for an environment's feed service
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector {
    /// Overrides the environment's feed URL when set
    feed_url: Option<String>,
    reconnect_config: ReconnectConfig,
}

impl TungsteniteConnector {
    pub fn new(reconnect_config: ReconnectConfig) -> Self {
        Self {
            feed_url: None,
            reconnect_config,
        }
    }

    pub fn with_feed_url(mut self, feed_url: Option<String>) -> Self {
        self.feed_url = feed_url;
        self
    }
}

impl FeedConnector for TungsteniteConnector {
    type Socket = TungsteniteSocket;

    fn create(&self, params: SocketParams) -> TungsteniteSocket {
        let base = self
            .feed_url
            .as_deref()
            .unwrap_or_else(|| params.environment.feed_url());
        let socket = TungsteniteSocket {
            url: feed_socket_url(base, &params.subscriber),
            shared: Arc::new(Shared::default()),
            shutdown: Mutex::new(None),
            reconnect_config: self.reconnect_config.clone(),
        };
        if params.auto_connect {
            if let Err(e) = socket.open() {
                crate::log_error!("Feed socket auto-connect failed: {}", e);
            }
        }
        socket
    }
}

/// State shared between a socket and its connection task
#[derive(Default)]
struct Shared {
    handlers: Mutex<HandlerTable>,
    open: AtomicBool,
    closed: AtomicBool,
}

impl Shared {
    fn emit(&self, event: FeedEvent) {
        let kind = event.kind();
        if !dispatch(&self.handlers, event) {
            crate::log_debug!("No handler attached for '{}'", kind.as_str());
        }
    }

    /// Mark the link up and announce it. Returns `false`, leaving the socket
    /// closed, when `close()` won the race with the handshake.
    fn mark_connected(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.open.store(true, Ordering::SeqCst);
        // close() may have run between the check and the store
        if self.closed.load(Ordering::SeqCst) {
            self.open.store(false, Ordering::SeqCst);
            return false;
        }
        self.emit(FeedEvent::Connect);
        true
    }

    fn handle_text(&self, text: &str) {
        match serde_json::from_str::<FeedFrame>(text) {
            Ok(frame) => {
                let event = frame.event.clone();
                match frame.into_feed_messages() {
                    Some(items) => self.emit(FeedEvent::Message(items)),
                    None => crate::log_debug!("Ignoring feed frame '{}'", event),
                }
            }
            Err(e) => crate::log_error!("Failed to parse feed frame: {}", e),
        }
    }
}

/// A managed WebSocket connection to the feed service (native implementation).
///
/// Construction never connects. `open()` spawns the connection loop on the
/// current tokio runtime; the loop reconnects with backoff after a drop until
/// `close()` is called or the socket is dropped.
pub struct TungsteniteSocket {
    url: Result<Url, FeedError>,
    shared: Arc<Shared>,
    /// Signals the connection loop to stop. Dropping it stops the loop too.
    shutdown: Mutex<Option<UnboundedSender<()>>>,
    reconnect_config: ReconnectConfig,
}

impl TungsteniteSocket {
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref().ok()
    }
}

impl FeedSocket for TungsteniteSocket {
    fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    fn open(&self) -> Result<(), FeedError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(FeedError::Transport("socket is closed".to_string()));
        }
        let url = self.url.clone()?;

        let mut shutdown = lock(&self.shutdown);
        if shutdown.is_some() {
            // Already running
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| FeedError::NoRuntime)?;

        let (tx, rx) = unbounded();
        *shutdown = Some(tx);
        runtime.spawn(run_connection_loop(
            url,
            self.shared.clone(),
            self.reconnect_config.clone(),
            rx,
        ));
        Ok(())
    }

    fn close(&self) -> Result<(), FeedError> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Err(FeedError::Teardown("socket already closed".to_string()));
        }
        self.shared.open.store(false, Ordering::SeqCst);
        match lock(&self.shutdown).take() {
            Some(tx) => tx
                .unbounded_send(())
                .map_err(|e| FeedError::Teardown(format!("connection loop gone: {}", e))),
            None => Ok(()),
        }
    }

    fn on(&self, kind: FeedEventKind, handler: FeedHandler) {
        lock(&self.shared.handlers).set(kind, handler);
    }

    fn off(&self, kind: FeedEventKind) {
        lock(&self.shared.handlers).remove(kind);
    }

    fn has_handlers(&self) -> bool {
        !lock(&self.shared.handlers).is_empty()
    }
}

/// Connection management loop, one per opened socket
async fn run_connection_loop(
    url: Url,
    shared: Arc<Shared>,
    reconnect_config: ReconnectConfig,
    mut shutdown: UnboundedReceiver<()>,
) {
    let host = url.host_str().unwrap_or("feed").to_string();
    let mut attempt = 0u32;

    loop {
        let connected = tokio::select! {
            _ = shutdown.next() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((mut ws_stream, _response)) => {
                attempt = 0;
                if !shared.mark_connected() {
                    let _ = ws_stream.close(None).await;
                    break;
                }
                crate::log_info!("Feed socket connected to {}", host);

                let (mut write, mut read) = ws_stream.split();

                let closed_locally = loop {
                    tokio::select! {
                        _ = shutdown.next() => {
                            let _ = write.send(Message::Close(None)).await;
                            break true;
                        }
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => shared.handle_text(text.as_str()),
                            Some(Ok(Message::Close(_))) => {
                                crate::log_info!("Feed socket to {} received close frame", host);
                                break false;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                // Pong is handled automatically by tungstenite
                                crate::log_debug!("Received ping: {:?}", data);
                            }
                            Some(Ok(_)) => {
                                // Ignore binary, pong, etc.
                            }
                            Some(Err(e)) => {
                                crate::log_error!("Feed socket read error: {}", e);
                                break false;
                            }
                            None => break false,
                        }
                    }
                };

                shared.open.store(false, Ordering::SeqCst);
                if closed_locally {
                    break;
                }
                crate::log_info!("Feed socket to {} closed", host);
                shared.emit(FeedEvent::Disconnect);
            }
            Err(e) => {
                crate::log_error!("Feed socket error for {}: {}", host, e);
                // Connection errors surface as a disconnect, once per failure streak
                if attempt == 0 {
                    shared.emit(FeedEvent::Disconnect);
                }
            }
        }

        if reconnect_config.is_exhausted(attempt) {
            crate::log_warn!(
                "Giving up on {} after {} reconnect attempts",
                host,
                reconnect_config.max_attempts
            );
            break;
        }

        // Wait before reconnecting
        let delay = reconnect_config.delay_for_attempt(attempt);
        crate::log_info!(
            "Reconnecting to {} in {}ms (attempt {})",
            host,
            delay,
            attempt + 1
        );
        tokio::select! {
            _ = shutdown.next() => break,
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(delay as u64)) => {}
        }
        attempt += 1;
    }

    shared.open.store(false, Ordering::SeqCst);
    crate::log_debug!("Feed connection loop for {} stopped", host);
}
