//! Messaging configuration loaded from environment variables.

use std::time::Duration;

use crate::envelope::topics;
use crate::routing::RoutingTable;

/// Broker and consumer settings.
///
/// Reads from environment variables:
/// - `BROKER_TENANT` (default: `"partner-lifecycle"`)
/// - `BROKER_NAMESPACE` (default: `"events"`)
/// - `SERVICE_NAME` written into every outbound envelope (default: `"Partner"`)
/// - `CONSUMER_RECEIVE_TIMEOUT_MS` (default: `1000`)
/// - `CONSUMER_TOPICS` comma separated topic keys (default: `"content-events"`)
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    pub tenant: String,
    pub namespace: String,
    pub service_name: String,
    pub receive_timeout: Duration,
    pub inbound_topics: Vec<String>,
}

impl MessagingConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tenant: std::env::var("BROKER_TENANT").unwrap_or(defaults.tenant),
            namespace: std::env::var("BROKER_NAMESPACE").unwrap_or(defaults.namespace),
            service_name: std::env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            receive_timeout: std::env::var("CONSUMER_RECEIVE_TIMEOUT_MS")
                .ok()
                .and_then(|ms| ms.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.receive_timeout),
            inbound_topics: std::env::var("CONSUMER_TOPICS")
                .ok()
                .map(|list| parse_list(&list))
                .filter(|keys| !keys.is_empty())
                .unwrap_or(defaults.inbound_topics),
        }
    }

    /// Builds the routing table for the configured tenant and namespace.
    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::saga_defaults(&self.tenant, &self.namespace)
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            tenant: "partner-lifecycle".to_string(),
            namespace: "events".to_string(),
            service_name: "Partner".to_string(),
            receive_timeout: Duration::from_millis(1000),
            inbound_topics: vec![topics::CONTENT_EVENTS.to_string()],
        }
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = MessagingConfig::default();
        assert_eq!(config.tenant, "partner-lifecycle");
        assert_eq!(config.namespace, "events");
        assert_eq!(config.service_name, "Partner");
        assert_eq!(config.receive_timeout, Duration::from_secs(1));
        assert_eq!(config.inbound_topics, vec!["content-events"]);
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(parse_list(" a, ,b ,"), vec!["a", "b"]);
    }

    #[test]
    fn test_routing_table_uses_configured_namespace() {
        let config = MessagingConfig {
            namespace: "staging".to_string(),
            ..MessagingConfig::default()
        };
        assert_eq!(
            config.routing_table().topic_name("LevelUpdated"),
            "persistent://partner-lifecycle/staging/LevelUpdated"
        );
    }
}
