//! Notifykit Client - notification feed connection management
//!
//! This crate keeps exactly one live feed connection per subscriber
//! identity, exposes its state to the host, and wraps the notification
//! REST API.

pub mod logging;

pub mod api_client;
pub mod config;
pub mod stores;
pub mod ws;

pub use api_client::{NotificationApi, OptAction, Signer};
pub use config::{FeedConfig, IdentityConfig};
pub use stores::{ConnectionInfo, ConnectionState, FeedStateReader};
pub use ws::{FeedConnectionManager, IdentityWatcher, TungsteniteConnector};
