//! Partnership aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod state;
mod value_objects;

pub use aggregate::{NewPartnership, Partnership, PartnershipSnapshot};
pub use commands::*;
pub use events::{PartnershipChange, PartnershipEvent};
pub use state::PartnershipState;
pub use value_objects::{BrandId, PartnerId, PartnershipLevel, PartnershipType};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised for input a partnership can never accept.
///
/// Transitions that are merely not allowed in the current state are not
/// errors; they come back as [`TransitionOutcome::Ignored`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartnershipError {
    /// Partnership type string is not one of the known wire values.
    #[error("Unknown partnership type: {0}")]
    UnknownPartnershipType(String),

    /// Level string is not one of the known wire values.
    #[error("Unknown partnership level: {0}")]
    UnknownLevel(String),

    /// State string is not one of the known wire values.
    #[error("Unknown partnership state: {0}")]
    UnknownState(String),

    /// Commission rate is negative or not a number.
    #[error("Invalid commission rate: {0} (must be a non-negative number)")]
    InvalidCommissionRate(f64),

    /// Renewal end date is not in the future.
    #[error("Renewal end date {0} is not in the future")]
    RenewalDateInPast(DateTime<Utc>),
}

/// Result of asking the aggregate to transition.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State changed and an event was recorded.
    Applied,

    /// The transition is not legal from `current`; nothing changed.
    Ignored { current: PartnershipState },
}

impl TransitionOutcome {
    /// Returns true if the transition took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }

    /// Returns the outcome name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionOutcome::Applied => "applied",
            TransitionOutcome::Ignored { .. } => "ignored",
        }
    }
}
