//! HTTP client for the notification REST API.
//!
//! Failures come back as [`ApiError`] for the caller to log or display. This
//! client never touches feed connection state.

use notifykit_shared::{
    caip_account, format_address, parse_inbox, ApiError, ChannelRecord, Environment, InboxPage,
    NotificationPayload, ParsedNotification, SendResponse, SubscriberList, SubscriptionList,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::config::FeedConfig;

/// Signing capability of a connected wallet account.
pub trait Signer: Send + Sync {
    fn address(&self) -> String;

    fn chain_id(&self) -> u64;

    /// Sign EIP-712 typed data, returning the hex signature
    fn sign_typed_data(&self, typed_data: &serde_json::Value) -> Result<String, ApiError>;
}

/// Subscription action carried by an opt-in/opt-out request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptAction {
    Subscribe,
    Unsubscribe,
}

impl OptAction {
    fn as_str(&self) -> &'static str {
        match self {
            OptAction::Subscribe => "Subscribe",
            OptAction::Unsubscribe => "Unsubscribe",
        }
    }

    fn path_segment(&self) -> &'static str {
        match self {
            OptAction::Subscribe => "subscribe",
            OptAction::Unsubscribe => "unsubscribe",
        }
    }
}

/// Build the EIP-712 typed data a wallet signs to opt in or out of a channel.
pub fn opt_typed_data(
    action: OptAction,
    channel: &str,
    subscriber: &str,
    chain_id: u64,
) -> serde_json::Value {
    json!({
        "types": {
            action.as_str(): [
                { "name": "channel", "type": "address" },
                { "name": "subscriber", "type": "address" },
                { "name": "action", "type": "string" }
            ]
        },
        "primaryType": action.as_str(),
        "domain": { "name": "EPNS COMM V1", "chainId": chain_id },
        "message": {
            "channel": channel,
            "subscriber": subscriber,
            "action": action.as_str()
        }
    })
}

/// Inbox page size used by the fetch helpers
pub const INBOX_PAGE_LIMIT: u32 = 10;

/// HTTP client for the notification API of one environment.
#[derive(Debug, Clone)]
pub struct NotificationApi {
    client: Client,
    base_url: String,
    environment: Environment,
    caip: bool,
}

impl NotificationApi {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>, environment: Environment) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            environment,
            caip: false,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.api_base_url(), config.environment)
    }

    /// Format addresses as CAIP-10 in every request
    pub fn with_caip(mut self, caip: bool) -> Self {
        self.caip = caip;
        self
    }

    fn address(&self, address: &str) -> String {
        format_address(self.environment, address, self.caip)
    }

    fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    async fn read_response(resp: reqwest::Response) -> Result<(u16, String), ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        Ok((status, text))
    }

    fn decode<TRes: DeserializeOwned>(text: &str) -> Result<TRes, ApiError> {
        let text = if text.is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Make a GET request
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let (_, text) = Self::read_response(resp).await?;
        Self::decode(&text)
    }

    /// Make a POST request with JSON body
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let (_, text) = self.post_raw(path, body).await?;
        Self::decode(&text)
    }

    async fn post_raw<TReq: Serialize>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<(u16, String), ApiError> {
        let body_bytes =
            serde_json::to_vec(body).map_err(|e| ApiError::Deserialize(e.to_string()))?;
        let resp = self
            .client
            .post(self.url(path))
            .body(body_bytes)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_response(resp).await
    }

    // --- Channel API methods ---

    /// Look up a channel by address
    pub async fn get_channel(&self, channel: &str) -> Result<ChannelRecord, ApiError> {
        self.get_json(&format!("/v1/channels/{}", self.address(channel)))
            .await
    }

    /// List a channel's subscribers on `network_id`
    pub async fn get_subscribers(
        &self,
        channel: &ChannelRecord,
        network_id: u64,
    ) -> Result<SubscriberList, ApiError> {
        let body = json!({
            "channel": self.address(channel.address_on(network_id)),
            "blockchain": network_id,
            "op": "read",
        });
        self.post_json("/v1/channels/_get_subscribers", &body).await
    }

    /// Whether `subscriber` is opted in to `channel`
    pub async fn is_subscribed(
        &self,
        channel: &ChannelRecord,
        subscriber: &str,
        network_id: u64,
    ) -> Result<bool, ApiError> {
        let list: SubscriptionList = self
            .get_json(&format!("/v1/users/{}/subscriptions", self.address(subscriber)))
            .await?;
        let target = channel.address_on(network_id);
        Ok(list
            .subscriptions
            .iter()
            .any(|s| s.channel.eq_ignore_ascii_case(target)))
    }

    pub async fn opt_in(
        &self,
        signer: &dyn Signer,
        channel: &ChannelRecord,
        network_id: u64,
    ) -> Result<(), ApiError> {
        self.opt(OptAction::Subscribe, signer, channel, network_id)
            .await
    }

    pub async fn opt_out(
        &self,
        signer: &dyn Signer,
        channel: &ChannelRecord,
        network_id: u64,
    ) -> Result<(), ApiError> {
        self.opt(OptAction::Unsubscribe, signer, channel, network_id)
            .await
    }

    async fn opt(
        &self,
        action: OptAction,
        signer: &dyn Signer,
        channel: &ChannelRecord,
        network_id: u64,
    ) -> Result<(), ApiError> {
        let channel_address = channel.address_on(network_id);
        let subscriber = signer.address();
        let typed_data = opt_typed_data(action, channel_address, &subscriber, signer.chain_id());
        let signature = signer.sign_typed_data(&typed_data)?;

        let body = json!({
            "signature": signature,
            "message": typed_data["message"],
            "op": "write",
            "chainId": network_id,
        });
        let path = format!(
            "/v1/channels/{}/{}",
            self.address(channel_address),
            action.path_segment()
        );
        self.post_raw(&path, &body).await?;
        crate::log_info!(
            "{} {} for {}",
            action.as_str(),
            channel_address,
            subscriber
        );
        Ok(())
    }

    // --- Inbox API methods ---

    /// Fetch the first page of `user`'s inbox on `chain_id`
    pub async fn fetch_notifications(
        &self,
        user: &str,
        chain_id: u64,
    ) -> Result<Vec<ParsedNotification>, ApiError> {
        self.fetch_inbox(user, chain_id, false).await
    }

    /// Fetch the first page of `user`'s spam box on `chain_id`
    pub async fn fetch_spam_notifications(
        &self,
        user: &str,
        chain_id: u64,
    ) -> Result<Vec<ParsedNotification>, ApiError> {
        self.fetch_inbox(user, chain_id, true).await
    }

    async fn fetch_inbox(
        &self,
        user: &str,
        chain_id: u64,
        spam: bool,
    ) -> Result<Vec<ParsedNotification>, ApiError> {
        let user = if self.caip {
            caip_account(chain_id, user)
        } else {
            user.to_string()
        };
        let page: InboxPage = self
            .get_json(&format!(
                "/v1/users/{}/feeds?page=1&limit={}&spam={}",
                user, INBOX_PAGE_LIMIT, spam
            ))
            .await?;
        Ok(parse_inbox(page.feeds))
    }

    // --- Payload API methods ---

    /// Send a notification
    pub async fn send_notification(
        &self,
        payload: &NotificationPayload,
    ) -> Result<SendResponse, ApiError> {
        let (status, text) = self.post_raw("/v1/payloads/", payload).await?;
        Ok(SendResponse {
            status,
            body: Self::decode(&text)?,
        })
    }
}
