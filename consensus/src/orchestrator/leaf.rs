//! Leaf lifecycle: states, transitions and per-leaf records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decomposition::NodeIndex;
use crate::engine::QualityVerdict;
use crate::hashing::Fingerprint;

/// How many times a rejected leaf may go back to `Pending`.
pub const MAX_REFINEMENTS: u32 = 1;

/// State of a leaf subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafState {
    /// Waiting to be solved.
    Pending,
    /// Solver produced a result.
    Solved,
    /// Result is being verified.
    Verifying,
    /// Verified. Terminal.
    Accepted,
    /// Failed to solve or to verify. Terminal unless refined.
    Rejected,
}

impl LeafState {
    /// Whether this is a terminal state (ignoring the single refinement).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    /// Valid transitions from this state.
    ///
    /// `Pending → Rejected` covers a solver that fails or times out.
    pub fn valid_transitions(self) -> &'static [LeafState] {
        match self {
            Self::Pending => &[Self::Solved, Self::Rejected],
            Self::Solved => &[Self::Verifying],
            Self::Verifying => &[Self::Accepted, Self::Rejected],
            Self::Rejected => &[Self::Pending],
            Self::Accepted => &[],
        }
    }
}

impl std::fmt::Display for LeafState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Solved => write!(f, "solved"),
            Self::Verifying => write!(f, "verifying"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A state transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafTransition {
    pub from: LeafState,
    pub to: LeafState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} → {to}: {reason}")]
pub struct TransitionError {
    pub from: LeafState,
    pub to: LeafState,
    pub reason: String,
}

/// Everything tracked about one leaf during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafRecord {
    /// Depth-first position among the task's leaves
    pub order: usize,
    pub node: NodeIndex,
    pub leaf_id: String,
    /// Top-level component the leaf belongs to
    pub component_id: Option<String>,
    pub state: LeafState,
    /// Solve attempts started
    pub attempts: u32,
    /// Times the leaf went back to `Pending`
    pub refinements: u32,
    pub fingerprint: Option<Fingerprint>,
    pub verdict: Option<QualityVerdict>,
    pub error: Option<String>,
    pub transitions: Vec<LeafTransition>,
}

impl LeafRecord {
    pub fn new(order: usize, node: NodeIndex, leaf_id: String, component_id: Option<String>) -> Self {
        Self {
            order,
            node,
            leaf_id,
            component_id,
            state: LeafState::Pending,
            attempts: 0,
            refinements: 0,
            fingerprint: None,
            verdict: None,
            error: None,
            transitions: Vec::new(),
        }
    }

    /// Move to `to`, recording the transition.
    pub fn transition(&mut self, to: LeafState, reason: &str) -> Result<(), TransitionError> {
        let from = self.state;
        if !from.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from,
                to,
                reason: format!("{} is not reachable from {}", to, from),
            });
        }
        if from == LeafState::Rejected && self.refinements >= MAX_REFINEMENTS {
            return Err(TransitionError {
                from,
                to,
                reason: format!("refinement limit of {} reached", MAX_REFINEMENTS),
            });
        }

        if to == LeafState::Pending {
            self.refinements += 1;
            self.verdict = None;
            self.fingerprint = None;
            self.error = None;
        }
        self.transitions.push(LeafTransition {
            from,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.state = to;
        Ok(())
    }

    /// Whether the leaf may be sent back for refinement.
    pub fn can_refine(&self) -> bool {
        self.state == LeafState::Rejected && self.refinements < MAX_REFINEMENTS
    }

    /// Quality score of the latest verdict, zero when there is none.
    pub fn quality_score(&self) -> f64 {
        self.verdict.as_ref().map(|v| v.quality_score).unwrap_or(0.0)
    }
}

/// Serializable summary of a leaf's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafReport {
    pub leaf_id: String,
    pub component_id: Option<String>,
    pub state: LeafState,
    pub attempts: u32,
    pub refined: bool,
    pub quality_score: f64,
    pub fingerprint: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LeafRecord> for LeafReport {
    fn from(record: &LeafRecord) -> Self {
        Self {
            leaf_id: record.leaf_id.clone(),
            component_id: record.component_id.clone(),
            state: record.state,
            attempts: record.attempts,
            refined: record.refinements > 0,
            quality_score: record.quality_score(),
            fingerprint: record.fingerprint.clone(),
            error: record.error.clone(),
        }
    }
}
