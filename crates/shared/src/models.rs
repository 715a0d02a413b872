//! Shared data models for the notification feed and the notification API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Environment ---

/// Deployment environment of the notification backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Prod,
    Staging,
    Dev,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Staging => "staging",
            Environment::Dev => "dev",
        }
    }

    /// Base URL of the real-time feed service.
    pub fn feed_url(&self) -> &'static str {
        match self {
            Environment::Prod => "wss://backend.epns.io",
            Environment::Staging => "wss://backend-staging.epns.io",
            Environment::Dev => "wss://backend-dev.epns.io",
        }
    }

    /// Base URL of the REST API.
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Prod => "https://backend.epns.io/apis",
            Environment::Staging => "https://backend-staging.epns.io/apis",
            Environment::Dev => "https://backend-dev.epns.io/apis",
        }
    }

    /// Chain used when formatting CAIP-10 addresses for this environment.
    pub fn caip_chain_id(&self) -> u64 {
        match self {
            Environment::Prod => 1,
            Environment::Staging | Environment::Dev => 5,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "staging" => Ok(Environment::Staging),
            "dev" | "development" => Ok(Environment::Dev),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Format an address for the given environment.
///
/// With `caip` set the address becomes a CAIP-10 account id
/// (`eip155:{chain}:{address}`), otherwise it is returned unchanged.
/// Addresses that are already CAIP-10 are never prefixed twice.
pub fn format_address(env: Environment, address: &str, caip: bool) -> String {
    if !caip {
        return address.to_string();
    }
    caip_account(env.caip_chain_id(), address)
}

/// CAIP-10 account id of `address` on `chain_id`. Already prefixed
/// addresses are returned unchanged.
pub fn caip_account(chain_id: u64, address: &str) -> String {
    if address.starts_with("eip155:") {
        return address.to_string();
    }
    format!("eip155:{}:{}", chain_id, address)
}

// --- Identity ---

/// The tuple that parameterizes one feed connection.
///
/// Two identities are the same connection target exactly when all four
/// fields compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subscriber_id: Option<String>,
    pub environment: Environment,
    pub network_id: Option<u64>,
    pub address_format_flag: bool,
}

impl Identity {
    pub fn new(
        subscriber_id: Option<&str>,
        environment: Environment,
        network_id: Option<u64>,
        address_format_flag: bool,
    ) -> Self {
        Self {
            subscriber_id: subscriber_id.map(str::to_string),
            environment,
            network_id,
            address_format_flag,
        }
    }

    /// The subscriber, if present and non-empty.
    pub fn subscriber(&self) -> Option<&str> {
        self.subscriber_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether a feed connection can be built from this identity.
    pub fn is_complete(&self) -> bool {
        self.subscriber().is_some()
    }

    /// Subscriber address in the format selected by `address_format_flag`.
    pub fn formatted_subscriber(&self) -> Option<String> {
        self.subscriber()
            .map(|s| format_address(self.environment, s, self.address_format_flag))
    }
}

// --- Feed ---

/// One notification item delivered over the feed. The payload is opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FeedMessage(pub serde_json::Value);

impl FeedMessage {
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for FeedMessage {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

// --- Channels ---

/// Channel record as returned by the channel lookup endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub alias_address: Option<String>,
    #[serde(default)]
    pub subscriber_count: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChannelRecord {
    /// Address to use for subscriber queries on `network_id`.
    ///
    /// Sidechain networks address a channel through its alias.
    pub fn address_on(&self, network_id: u64) -> &str {
        match (&self.alias_address, is_alias_network(network_id)) {
            (Some(alias), true) if !alias.is_empty() => alias,
            _ => &self.channel,
        }
    }
}

/// Networks on which channels are addressed by their alias.
pub fn is_alias_network(network_id: u64) -> bool {
    matches!(network_id, 37 | 80001)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriberList {
    #[serde(default)]
    pub subscribers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub channel: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionList {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum NotificationType {
    Broadcast,
    Targeted,
    Subset,
}

impl From<NotificationType> for u8 {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Broadcast => 1,
            NotificationType::Targeted => 3,
            NotificationType::Subset => 4,
        }
    }
}

impl TryFrom<u8> for NotificationType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NotificationType::Broadcast),
            3 => Ok(NotificationType::Targeted),
            4 => Ok(NotificationType::Subset),
            other => Err(format!("unknown notification type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "u8", try_from = "u8")]
pub enum IdentityType {
    Minimal,
    Ipfs,
    DirectPayload,
    Subgraph,
}

impl From<IdentityType> for u8 {
    fn from(value: IdentityType) -> Self {
        match value {
            IdentityType::Minimal => 0,
            IdentityType::Ipfs => 1,
            IdentityType::DirectPayload => 2,
            IdentityType::Subgraph => 3,
        }
    }
}

impl TryFrom<u8> for IdentityType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IdentityType::Minimal),
            1 => Ok(IdentityType::Ipfs),
            2 => Ok(IdentityType::DirectPayload),
            3 => Ok(IdentityType::Subgraph),
            other => Err(format!("unknown identity type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationBody {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadBody {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub cta: String,
    #[serde(default)]
    pub img: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubgraphRef {
    pub id: String,
    pub counter: u32,
}

/// Recipients are a single address for targeted sends and a list for subsets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

/// Descriptor for a notification send request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub identity_type: IdentityType,
    pub notification: NotificationBody,
    pub payload: PayloadBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Recipients>,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipfs_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<SubgraphRef>,
    pub env: Environment,
}

/// IPFS hash used by the sample IPFS payloads.
pub const SAMPLE_IPFS_HASH: &str = "bafkreicuttr5gpbyzyn6cyapxctlr7dk2g6fnydqxy6lps424mcjcn73we";

/// Subgraph used by the sample subgraph payloads.
pub const SAMPLE_SUBGRAPH_ID: &str = "aiswaryawalter/graph-poc-sample";

impl NotificationPayload {
    /// Build one of the sample test payloads.
    ///
    /// `channel` and `recipients` are formatted per `caip`. Broadcast sends
    /// carry no recipients, targeted sends use the first recipient only.
    pub fn test_payload(
        env: Environment,
        caip: bool,
        kind: NotificationType,
        identity_type: IdentityType,
        channel: &str,
        recipients: &[&str],
        timestamp: &str,
    ) -> Self {
        let formatted: Vec<String> = recipients
            .iter()
            .map(|r| format_address(env, r, caip))
            .collect();
        let recipients = match kind {
            NotificationType::Broadcast => None,
            NotificationType::Targeted => formatted.into_iter().next().map(Recipients::One),
            NotificationType::Subset => Some(Recipients::Many(formatted)),
        };

        Self {
            kind,
            identity_type,
            notification: NotificationBody {
                title: format!("[SDK-TEST] notification TITLE: {}", timestamp),
                body: format!("[sdk-test] notification BODY {}", timestamp),
            },
            payload: PayloadBody {
                title: format!("[sdk-test] payload title {}", timestamp),
                body: format!(
                    "type:{} identity:{}",
                    u8::from(kind),
                    u8::from(identity_type)
                ),
                cta: String::new(),
                img: String::new(),
            },
            recipients,
            channel: format_address(env, channel, caip),
            ipfs_hash: (identity_type == IdentityType::Ipfs).then(|| SAMPLE_IPFS_HASH.to_string()),
            graph: (identity_type == IdentityType::Subgraph).then(|| SubgraphRef {
                id: SAMPLE_SUBGRAPH_ID.to_string(),
                counter: 3,
            }),
            env,
        }
    }
}

// --- Inbox ---

/// Notification content as stored by the inbox endpoints.
///
/// Field names are the service's abbreviations (`asub` = subject,
/// `amsg` = message, `acta` = call to action, `aimg` = image).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboxData {
    #[serde(default)]
    pub app: String,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub asub: String,
    #[serde(default)]
    pub amsg: String,
    #[serde(default)]
    pub acta: String,
    #[serde(default)]
    pub aimg: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboxPayload {
    #[serde(default)]
    pub data: InboxData,
    #[serde(default)]
    pub notification: Option<NotificationBody>,
}

/// One raw inbox entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboxItem {
    #[serde(default)]
    pub payload_id: Option<u64>,
    #[serde(default)]
    pub payload: InboxPayload,
    /// Chain name the notification was sent on, e.g. `ETH_TEST_GOERLI`
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub epoch: Option<String>,
}

/// A page of inbox entries. Older deployments call the list `results`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InboxPage {
    #[serde(default, alias = "results")]
    pub feeds: Vec<InboxItem>,
    #[serde(default)]
    pub itemcount: Option<u64>,
}

/// Inbox entry flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNotification {
    pub sid: Option<String>,
    pub app: String,
    pub icon: String,
    pub url: String,
    pub title: String,
    pub message: String,
    pub cta: String,
    pub image: String,
    pub blockchain: String,
    /// Secret notifications carry their readable text in `notification`
    pub secret: bool,
    pub notification: Option<NotificationBody>,
}

impl ParsedNotification {
    /// Title to show: the notification title for secret entries.
    pub fn display_title(&self) -> &str {
        match (&self.notification, self.secret) {
            (Some(n), true) => &n.title,
            _ => &self.title,
        }
    }

    /// Body to show: the notification body for secret entries.
    pub fn display_body(&self) -> &str {
        match (&self.notification, self.secret) {
            (Some(n), true) => &n.body,
            _ => &self.message,
        }
    }
}

impl From<InboxItem> for ParsedNotification {
    fn from(item: InboxItem) -> Self {
        let InboxPayload { data, notification } = item.payload;
        Self {
            sid: data.sid,
            app: data.app,
            icon: data.icon,
            url: data.url,
            title: data.asub,
            message: data.amsg,
            cta: data.acta,
            image: data.aimg,
            blockchain: item.source,
            secret: !data.secret.is_empty(),
            notification,
        }
    }
}

/// Flatten raw inbox entries, keeping their order.
pub fn parse_inbox(items: Vec<InboxItem>) -> Vec<ParsedNotification> {
    items.into_iter().map(ParsedNotification::from).collect()
}

/// Raw outcome of a send request.
#[derive(Debug, Clone, PartialEq)]
pub struct SendResponse {
    pub status: u16,
    pub body: serde_json::Value,
}
