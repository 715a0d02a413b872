//! Observable client state.

pub mod feed;

pub use feed::{format_utc, ConnectionInfo, ConnectionState, FeedStateReader, FeedStore};
