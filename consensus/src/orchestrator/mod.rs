//! Task orchestration: decompose, solve, verify, vote
//!
//! Drives a task through the whole pipeline and folds the per-leaf verdicts
//! into one task-level verdict.
//!
//! # Leaf Flow
//!
//! ```text
//! Pending → Solved → Verifying → Accepted
//!    │                    │
//!    └────────────────────┴──→ Rejected ──(refine, once)──→ Pending
//! ```
//!
//! Task confidence is the mean leaf quality score. When it, or the MAKER
//! vote over the aggregated leaf fingerprints, falls below the MAKER
//! threshold, rejected leaves are refined once and the task is re-scored.
//! Accepted leaves are never solved again.

pub mod leaf;
pub mod runner;
pub mod vote_log;

pub use leaf::{LeafRecord, LeafReport, LeafState, LeafTransition, TransitionError, MAX_REFINEMENTS};
pub use runner::{
    ComponentConfidence, OrchestratorError, OrchestratorResult, OrchestratorStatus, SolveError,
    Solver, TaskOrchestrator, TaskVerdict,
};
pub use vote_log::{MemoryVoteLog, RecordedVote, VoteLog, VoteLogError, VoteRecord};
