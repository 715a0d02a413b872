//! Identity watcher: decides when the feed connection must be replaced.

use notifykit_shared::Identity;

use super::connection::FeedConnector;
use super::manager::FeedConnectionManager;

/// Tracks the last observed identity and reconfigures the manager once per
/// distinct value.
///
/// The host calls [`observe`](Self::observe) with its current identity
/// whenever it likes (every tick is fine); only changes reach the manager.
#[derive(Debug, Default, Clone)]
pub struct IdentityWatcher {
    last: Option<Identity>,
}

impl IdentityWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current identity. Returns whether the manager was
    /// reconfigured.
    pub fn observe<C: FeedConnector>(
        &mut self,
        identity: Identity,
        manager: &mut FeedConnectionManager<C>,
    ) -> bool {
        if self.last.as_ref() == Some(&identity) {
            return false;
        }
        crate::log_debug!("Identity changed: {:?}", identity);
        self.last = Some(identity.clone());
        manager.configure(identity);
        true
    }

    pub fn last_observed(&self) -> Option<&Identity> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::connection_mock::MockConnector;
    use notifykit_shared::Environment;

    fn identity(subscriber: Option<&str>, network_id: u64) -> Identity {
        Identity::new(subscriber, Environment::Prod, Some(network_id), false)
    }

    #[test]
    fn repeated_identity_triggers_once() {
        let connector = MockConnector::new();
        let mut manager = FeedConnectionManager::new(connector.clone());
        let mut watcher = IdentityWatcher::new();

        assert!(watcher.observe(identity(Some("0xA"), 1), &mut manager));
        assert!(!watcher.observe(identity(Some("0xA"), 1), &mut manager));
        assert!(!watcher.observe(identity(Some("0xA"), 1), &mut manager));

        assert_eq!(connector.created(), 1);
        assert_eq!(watcher.last_observed(), Some(&identity(Some("0xA"), 1)));
    }

    #[test]
    fn first_subscriber_triggers_a_connection() {
        let connector = MockConnector::new();
        let mut manager = FeedConnectionManager::new(connector.clone());
        let mut watcher = IdentityWatcher::new();

        assert!(watcher.observe(identity(None, 1), &mut manager));
        assert_eq!(connector.created(), 0);

        assert!(watcher.observe(identity(Some("0xA"), 1), &mut manager));
        assert_eq!(connector.created(), 1);
    }

    #[test]
    fn each_distinct_identity_reconfigures() {
        let connector = MockConnector::new();
        let mut manager = FeedConnectionManager::new(connector.clone());
        let mut watcher = IdentityWatcher::new();

        watcher.observe(identity(Some("0xA"), 1), &mut manager);
        watcher.observe(identity(Some("0xA"), 5), &mut manager);
        watcher.observe(identity(Some("0xB"), 5), &mut manager);

        assert_eq!(connector.created(), 3);
        assert_eq!(connector.socket(0).close_calls(), 1);
        assert_eq!(connector.socket(1).close_calls(), 1);
        assert_eq!(connector.socket(2).close_calls(), 0);
    }

    #[test]
    fn returning_to_the_live_identity_keeps_its_connection() {
        let connector = MockConnector::new();
        let mut manager = FeedConnectionManager::new(connector.clone());
        let mut watcher = IdentityWatcher::new();

        watcher.observe(identity(Some("0xA"), 1), &mut manager);
        watcher.observe(identity(None, 1), &mut manager);
        assert!(watcher.observe(identity(Some("0xA"), 1), &mut manager));

        assert_eq!(connector.created(), 1);
        assert_eq!(connector.socket(0).close_calls(), 0);
    }
}
