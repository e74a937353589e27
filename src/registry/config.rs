//! Registry configuration

use std::time::Duration;

/// Configuration for the router and broadcast registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each endpoint's mailbox (messages, not bytes)
    pub mailbox_capacity: usize,

    /// How often the background task evicts dead mailboxes
    pub prune_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
            prune_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the mailbox capacity (at least 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the prune interval
    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval.max(Duration::from_millis(1));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.mailbox_capacity, 1024);
        assert_eq!(config.prune_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_mailbox_capacity_floor() {
        // tokio's mpsc panics on a zero capacity
        let config = RegistryConfig::default().mailbox_capacity(0);

        assert_eq!(config.mailbox_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .mailbox_capacity(16)
            .prune_interval(Duration::from_millis(250));

        assert_eq!(config.mailbox_capacity, 16);
        assert_eq!(config.prune_interval, Duration::from_millis(250));
    }
}
