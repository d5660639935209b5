//! Partnership state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PartnershipError;

/// The state of a partnership in its lifecycle.
///
/// State transitions:
/// ```text
/// Initiating ──► Negotiating ──► Active ──┬──► Renewed
///                                 ▲  │    │
///                                 │  ▼    │
///                              Suspended ─┴──► Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PartnershipState {
    /// Partnership has been registered, nothing agreed yet.
    #[default]
    #[serde(rename = "iniciando")]
    Initiating,

    /// Terms are being negotiated.
    #[serde(rename = "en_negociacion")]
    Negotiating,

    /// Partnership is running; level may change.
    #[serde(rename = "activo")]
    Active,

    /// Temporarily on hold.
    #[serde(rename = "suspendido")]
    Suspended,

    /// Ended (terminal state).
    #[serde(rename = "terminado")]
    Terminated,

    /// Renewed under a new end date (terminal for this record).
    #[serde(rename = "renovado")]
    Renewed,
}

impl PartnershipState {
    pub const ALL: [PartnershipState; 6] = [
        PartnershipState::Initiating,
        PartnershipState::Negotiating,
        PartnershipState::Active,
        PartnershipState::Suspended,
        PartnershipState::Terminated,
        PartnershipState::Renewed,
    ];

    /// Returns true if negotiation can start in this state.
    pub fn can_start_negotiation(&self) -> bool {
        matches!(self, PartnershipState::Initiating)
    }

    /// Returns true if the partnership can be activated in this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, PartnershipState::Negotiating)
    }

    /// Returns true if the partnership can be suspended in this state.
    pub fn can_suspend(&self) -> bool {
        matches!(self, PartnershipState::Active)
    }

    /// Returns true if the partnership can be terminated in this state.
    pub fn can_terminate(&self) -> bool {
        matches!(self, PartnershipState::Active | PartnershipState::Suspended)
    }

    /// Returns true if the partnership can be renewed in this state.
    pub fn can_renew(&self) -> bool {
        matches!(self, PartnershipState::Active)
    }

    /// Returns true if the level can change in this state.
    pub fn can_update_level(&self) -> bool {
        matches!(self, PartnershipState::Active)
    }

    /// Returns true if a suspended partnership can return to active.
    pub fn can_reactivate(&self) -> bool {
        matches!(self, PartnershipState::Suspended)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PartnershipState::Terminated | PartnershipState::Renewed)
    }

    /// Returns the wire value of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipState::Initiating => "iniciando",
            PartnershipState::Negotiating => "en_negociacion",
            PartnershipState::Active => "activo",
            PartnershipState::Suspended => "suspendido",
            PartnershipState::Terminated => "terminado",
            PartnershipState::Renewed => "renovado",
        }
    }
}

impl FromStr for PartnershipState {
    type Err = PartnershipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PartnershipError::UnknownState(s.to_string()))
    }
}

impl std::fmt::Display for PartnershipState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
