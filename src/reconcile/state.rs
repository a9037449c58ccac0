//! Context Phase Tracking
//!
//! This module provides the phase enumeration that drives the reconciliation
//! state machine.
//!
//! **Architecture**:
//! - `ContextPhase`: the context's position in the lifecycle, persisted in its status
//! - `valid_next_phases`: the transition table consulted by every action
//! - Phases outside the built-in set are carried as `Other` so that actions
//!   registered by the surrounding system can claim them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an integration context.
///
/// `New` is persisted as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContextPhase {
    /// Never reconciled
    #[default]
    New,

    /// Platform ready and digest stamped; image build pending
    Building,

    /// Integration image built for the stamped digest
    Ready,

    /// Builder reported a failure for the stamped digest
    Error,

    /// Phase owned by an externally registered action
    Other(String),
}

impl ContextPhase {
    /// Get the persisted name for this phase.
    pub fn as_str(&self) -> &str {
        match self {
            ContextPhase::New => "",
            ContextPhase::Building => "Building",
            ContextPhase::Ready => "Ready",
            ContextPhase::Error => "Error",
            ContextPhase::Other(name) => name,
        }
    }

    /// Get all valid phase transitions FROM this phase.
    pub fn valid_next_phases(&self) -> Vec<ContextPhase> {
        match self {
            ContextPhase::New => vec![ContextPhase::Building],
            ContextPhase::Building => vec![ContextPhase::Ready, ContextPhase::Error],
            // Spec drift sends a built context back through initialization
            ContextPhase::Ready => vec![ContextPhase::New],
            ContextPhase::Error => vec![ContextPhase::New],
            ContextPhase::Other(_) => vec![],
        }
    }

    /// Check if a transition to the given phase is valid.
    pub fn can_transition_to(&self, next: &ContextPhase) -> bool {
        self.valid_next_phases().contains(next)
    }
}

impl From<String> for ContextPhase {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => ContextPhase::New,
            "Building" => ContextPhase::Building,
            "Ready" => ContextPhase::Ready,
            "Error" => ContextPhase::Error,
            _ => ContextPhase::Other(value),
        }
    }
}

impl From<ContextPhase> for String {
    fn from(phase: ContextPhase) -> Self {
        phase.as_str().to_string()
    }
}

impl fmt::Display for ContextPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextPhase::New => write!(f, "New"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
