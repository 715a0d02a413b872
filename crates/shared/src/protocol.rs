//! Feed transport protocol definitions.

use serde::{Deserialize, Serialize};

use crate::models::FeedMessage;

/// Feed event names as sent by the feed service
pub const EVENT_CONNECT: &str = "connect";
pub const EVENT_DISCONNECT: &str = "disconnect";
pub const EVENT_USER_FEEDS: &str = "userFeeds";
pub const EVENT_USER_SPAM_FEEDS: &str = "userSpamFeeds";

/// Query parameter carrying the subscriber address on the feed URL
pub const SUBSCRIBER_QUERY_PARAM: &str = "address";

/// A single text frame received from the feed service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedFrame {
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl FeedFrame {
    pub fn user_feeds(items: Vec<serde_json::Value>) -> Self {
        Self {
            event: EVENT_USER_FEEDS.to_string(),
            payload: serde_json::Value::Array(items),
        }
    }

    /// Extract the feed items carried by a `userFeeds` frame.
    ///
    /// The service normally sends a one-element list, but any length is
    /// accepted and a bare object counts as a list of one. Returns `None` for
    /// other events and for frames without items.
    pub fn into_feed_messages(self) -> Option<Vec<FeedMessage>> {
        if self.event != EVENT_USER_FEEDS {
            return None;
        }
        let items: Vec<FeedMessage> = match self.payload {
            serde_json::Value::Array(items) => items.into_iter().map(FeedMessage).collect(),
            serde_json::Value::Null => Vec::new(),
            single => vec![FeedMessage(single)],
        };
        (!items.is_empty()).then_some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_feeds_frame_keeps_item_order() {
        let frame: FeedFrame =
            serde_json::from_str(r#"{"event":"userFeeds","payload":[{"id":1},{"id":2}]}"#)
                .expect("frame");
        let items = frame.into_feed_messages().expect("items");
        assert_eq!(
            items,
            vec![FeedMessage(json!({"id": 1})), FeedMessage(json!({"id": 2}))]
        );
    }

    #[test]
    fn single_object_payload_is_a_list_of_one() {
        let frame = FeedFrame {
            event: EVENT_USER_FEEDS.to_string(),
            payload: json!({"id": 7}),
        };
        assert_eq!(frame.into_feed_messages(), Some(vec![FeedMessage(json!({"id": 7}))]));
    }

    #[test]
    fn other_events_and_empty_lists_carry_nothing() {
        let spam = FeedFrame {
            event: EVENT_USER_SPAM_FEEDS.to_string(),
            payload: json!([{"id": 1}]),
        };
        assert_eq!(spam.into_feed_messages(), None);
        assert_eq!(FeedFrame::user_feeds(Vec::new()).into_feed_messages(), None);

        let bare: FeedFrame = serde_json::from_str(r#"{"event":"userFeeds"}"#).expect("frame");
        assert_eq!(bare.into_feed_messages(), None);
    }
}
