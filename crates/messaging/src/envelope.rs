//! The JSON envelope exchanged with other services.

use chrono::{DateTime, Utc};
use common::{CorrelationId, EventId};
use serde::{Deserialize, Serialize};

/// Event kinds that take part in the partnership creation saga.
pub mod kinds {
    /// Inbound request to create a partnership; with status `failed` it is
    /// also the kind of the failure reply.
    pub const COMMAND_CREATE_PARTNER: &str = "CommandCreatePartner";

    /// Reply announcing a successfully created partnership.
    pub const EVENT_PARTNER_CREATED: &str = "EventPartnerCreated";

    pub const PARTNERSHIP_CREATION_FAILED: &str = "PartnershipCreationFailed";
    pub const PARTNERSHIP_ACTIVATED: &str = "PartnershipActivated";
    pub const PARTNERSHIP_SUSPENDED: &str = "PartnershipSuspended";
    pub const PARTNERSHIP_TERMINATED: &str = "PartnershipTerminated";
}

/// Topic keys shared with other services.
pub mod topics {
    /// Topic owned by the content service, carrying saga commands and failure replies.
    pub const CONTENT_EVENTS: &str = "content-events";

    /// Topic carrying successful partner creation replies.
    pub const PARTNER_EVENTS: &str = "partner-events";
}

/// Outcome tag carried by every envelope.
///
/// Matching is case-insensitive; unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventStatus {
    Success,
    Failed,
    Other(String),
}

impl EventStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Failed => "failed",
            EventStatus::Other(s) => s,
        }
    }
}

impl From<&str> for EventStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "success" => EventStatus::Success,
            "failed" => EventStatus::Failed,
            _ => EventStatus::Other(s.to_string()),
        }
    }
}

impl From<String> for EventStatus {
    fn from(s: String) -> Self {
        EventStatus::from(s.as_str())
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message on the wire.
///
/// The correlation travels as `correlation_id`; the legacy `saga_id` key
/// is still accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(alias = "saga_id", default)]
    pub correlation_id: Option<CorrelationId>,

    #[serde(default)]
    pub service: String,

    pub status: EventStatus,

    #[serde(default)]
    pub event_id: EventId,

    pub event_type: String,

    #[serde(default)]
    pub event_data: serde_json::Value,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl EventEnvelope {
    /// Encodes the envelope as UTF-8 JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from UTF-8 JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
