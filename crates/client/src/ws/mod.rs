//! Real-time notification feed.
//!
//! This module provides:
//! - A transport abstraction with a closed event set and per-socket handler tables
//! - A native tokio-tungstenite transport with auto-reconnect
//! - The connection manager that keeps exactly one socket wired per subscriber
//! - An identity watcher that decides when the socket must be replaced
//!
//! # Architecture
//!
//! ```text
//!   host tick ──► IdentityWatcher ──(changed)──► FeedConnectionManager
//!                                                  │  1. off(*) + close() old socket
//!                                                  │  2. create new socket (no auto-connect)
//!                                                  │  3. on(*) tagged with ConnectionId
//!                                                  │  4. open()
//!                                                  ▼
//!                                           ┌─────────────┐
//!                                           │ FeedSocket  │  Connect / Disconnect / Message
//!                                           └─────────────┘
//!                                                  │
//!                                                  ▼
//!                                           ┌─────────────┐
//!                                           │  FeedStore  │ ──► FeedStateReader / watch
//!                                           └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use notifykit_client::ws::{FeedConnectionManager, IdentityWatcher, ReconnectConfig, TungsteniteConnector};
//! use notifykit_shared::{Environment, Identity};
//!
//! # async fn run() {
//! let mut manager = FeedConnectionManager::new(TungsteniteConnector::new(ReconnectConfig::default()));
//! let mut watcher = IdentityWatcher::new();
//!
//! let identity = Identity::new(Some("0xA"), Environment::Staging, Some(5), false);
//! watcher.observe(identity, &mut manager);
//!
//! let mut changes = manager.subscribe();
//! while changes.changed().await.is_ok() {
//!     let state = changes.borrow_and_update().clone();
//!     println!("connected={} messages={}", state.is_connected, state.messages.len());
//! }
//! # }
//! ```

mod connection;
mod manager;
mod watcher;

pub use connection::{
    dispatch, feed_socket_url, ConnectionId, ConnectionPhase, FeedConnector, FeedEvent,
    FeedEventKind, FeedHandler, FeedSocket, HandlerTable, ReconnectConfig, SocketParams,
    TungsteniteConnector, TungsteniteSocket,
};
pub(crate) use connection::lock;

pub use manager::FeedConnectionManager;
pub use watcher::IdentityWatcher;
