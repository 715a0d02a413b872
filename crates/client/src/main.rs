//! Notifykit - follow one subscriber's notification feed from the terminal.
//!
//! Reads its configuration from `NOTIFYKIT_*` environment variables, keeps
//! the feed connection for `NOTIFYKIT_ACCOUNT` alive and logs every state
//! change until Ctrl-C.

use notifykit_client::logging::init_tracing;
use notifykit_client::{
    ConnectionState, FeedConfig, FeedConnectionManager, IdentityConfig, IdentityWatcher,
    NotificationApi, TungsteniteConnector,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = FeedConfig::from_env();
    let identity_config = IdentityConfig::from_env();
    let identity = identity_config.identity(config.environment);

    if !identity.is_complete() {
        warn!("NOTIFYKIT_ACCOUNT is not set, no feed connection will be opened");
    }

    let api = NotificationApi::from_config(&config).with_caip(identity_config.caip);
    if let Some(account) = &identity_config.account {
        let chain_id = identity_config
            .chain_id
            .unwrap_or(config.environment.caip_chain_id());
        show_inbox(&api, account, chain_id).await;
    }
    if let Some(channel) = &identity_config.channel {
        inspect_channel(&api, channel, &identity_config).await;
    }

    let connector =
        TungsteniteConnector::new(config.reconnect.clone()).with_feed_url(config.feed_url.clone());
    let mut manager = FeedConnectionManager::new(connector);
    let mut watcher = IdentityWatcher::new();
    let mut changes = manager.subscribe();

    watcher.observe(identity, &mut manager);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                report(&state);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    manager.teardown();
    Ok(())
}

fn report(state: &ConnectionState) {
    let Some(connection) = &state.connection else {
        return;
    };
    info!(
        connection = %connection.id,
        phase = ?connection.phase,
        connected = state.is_connected,
        messages = state.messages.len(),
        since = state.last_connected_at.as_deref().unwrap_or("-"),
        "Feed state changed"
    );
    if let Some(latest) = state.messages.last() {
        info!("Latest feed item: {}", latest.payload());
    }
}

async fn show_inbox(api: &NotificationApi, account: &str, chain_id: u64) {
    match api.fetch_notifications(account, chain_id).await {
        Ok(inbox) => {
            info!("{} notification(s) in inbox", inbox.len());
            for item in &inbox {
                info!("[{}] {}: {}", item.app, item.display_title(), item.display_body());
            }
        }
        Err(e) => warn!("Inbox fetch failed: {}", e.user_message()),
    }
    match api.fetch_spam_notifications(account, chain_id).await {
        Ok(spam) => info!("{} notification(s) in spam", spam.len()),
        Err(e) => warn!("Spam fetch failed: {}", e.user_message()),
    }
}

async fn inspect_channel(api: &NotificationApi, channel: &str, identity: &IdentityConfig) {
    let network_id = identity.chain_id.unwrap_or(1);
    let record = match api.get_channel(channel).await {
        Ok(record) => record,
        Err(e) => {
            warn!("Channel lookup failed: {}", e.user_message());
            return;
        }
    };
    info!(
        "Channel {} ({})",
        record.name.as_deref().unwrap_or("unnamed"),
        record.channel
    );

    match api.get_subscribers(&record, network_id).await {
        Ok(list) => info!("{} subscriber(s) on network {}", list.subscribers.len(), network_id),
        Err(e) => warn!("Subscriber lookup failed: {}", e.user_message()),
    }

    if let Some(account) = &identity.account {
        match api.is_subscribed(&record, account, network_id).await {
            Ok(subscribed) => info!("{} subscribed: {}", account, subscribed),
            Err(e) => warn!("Subscription lookup failed: {}", e.user_message()),
        }
    }
}
