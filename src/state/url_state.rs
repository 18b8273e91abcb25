/// URL state definitions for tracking check progress
///
/// This module defines every state a URL can be in during one run.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a URL within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlState {
    // ===== Active States =====
    /// Waiting for the active tier
    Pending,

    /// Handed to a source, no verdict yet
    InFlight,

    // ===== Terminal States =====
    /// A definite verdict (indexed / not indexed) was recorded
    Resolved,

    /// Retries exhausted or the tier gave up; verdict is `unknown`
    Errored,
}

impl UrlState {
    /// Returns true if this is a terminal state (verdict recorded)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Errored)
    }

    /// Returns true if this is an active state (URL may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Checks whether a transition is allowed
    ///
    /// `InFlight → Pending` happens when a tier fails wholesale or a stop
    /// interrupts a request; `Pending → Errored` happens when a run fails
    /// before the URL was ever handed to a source. Terminal states never move.
    pub fn can_transition_to(&self, to: UrlState) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::InFlight)
                | (Self::Pending, Self::Errored)
                | (Self::InFlight, Self::Pending)
                | (Self::InFlight, Self::Resolved)
                | (Self::InFlight, Self::Errored)
        )
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Resolved => "resolved",
            Self::Errored => "errored",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "resolved" => Some(Self::Resolved),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }

    /// Returns all possible URL states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::InFlight, Self::Resolved, Self::Errored]
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
