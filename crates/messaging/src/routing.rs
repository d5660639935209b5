//! Mapping from event kinds to broker topics.

use std::collections::HashMap;

use crate::envelope::{EventStatus, kinds, topics};

/// Resolves the topic an event is published on.
///
/// Routing happens in two steps: `(kind, status)` picks a topic key (an
/// explicit override, or the kind itself), then the key is qualified as
/// `persistent://{tenant}/{namespace}/{key}`. Keys owned by another
/// service resolve under that service's tenant.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    tenant: String,
    namespace: String,
    overrides: HashMap<(String, EventStatus), String>,
    tenant_prefixes: Vec<(String, String)>,
}

impl RoutingTable {
    /// Creates a table with no overrides.
    pub fn new(tenant: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            namespace: namespace.into(),
            overrides: HashMap::new(),
            tenant_prefixes: Vec::new(),
        }
    }

    /// Routes `(kind, status)` to `key` instead of the kind's own topic.
    pub fn with_override(
        mut self,
        kind: impl Into<String>,
        status: EventStatus,
        key: impl Into<String>,
    ) -> Self {
        self.overrides.insert((kind.into(), status), key.into());
        self
    }

    /// Resolves keys starting with `prefix` under `tenant`.
    pub fn with_tenant_prefix(
        mut self,
        prefix: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        self.tenant_prefixes.push((prefix.into(), tenant.into()));
        self
    }

    /// Returns the table used by the creation saga under the given tenant
    /// and namespace.
    pub fn saga_defaults(tenant: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(tenant, namespace)
            .with_override(
                kinds::COMMAND_CREATE_PARTNER,
                EventStatus::Failed,
                topics::CONTENT_EVENTS,
            )
            .with_override(
                kinds::PARTNERSHIP_CREATION_FAILED,
                EventStatus::Failed,
                topics::CONTENT_EVENTS,
            )
            .with_override(
                kinds::EVENT_PARTNER_CREATED,
                EventStatus::Success,
                topics::PARTNER_EVENTS,
            )
            .with_tenant_prefix("content", "content-management")
    }

    /// Returns the topic key for an event kind and status.
    pub fn topic_key(&self, kind: &str, status: &EventStatus) -> String {
        self.overrides
            .get(&(kind.to_string(), status.clone()))
            .cloned()
            .unwrap_or_else(|| kind.to_string())
    }

    /// Returns the fully qualified topic for a key.
    pub fn topic_name(&self, key: &str) -> String {
        let tenant = self
            .tenant_prefixes
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, tenant)| tenant.as_str())
            .unwrap_or(&self.tenant);

        format!("persistent://{}/{}/{}", tenant, self.namespace, key)
    }

    /// Returns the fully qualified topic for an event kind and status.
    pub fn route(&self, kind: &str, status: &EventStatus) -> String {
        self.topic_name(&self.topic_key(kind, status))
    }

    /// Returns the subscription name used when consuming a key.
    pub fn subscription_name(key: &str) -> String {
        format!("{key}-subscription")
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::saga_defaults("partner-lifecycle", "events")
    }
}
