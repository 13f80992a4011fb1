//! MAKER Consensus Library
//!
//! Task decomposition and multi-verifier consensus for agent swarms:
//! - Bounded decomposition of a task into a tree of subtasks
//! - Content fingerprints for structured results
//! - Concurrent verifier rounds with per-judge timeouts
//! - Majority and reputation-weighted voting over fingerprint groups
//! - A reputation ledger with per-voter scores in `[0, 100]`
//! - Task orchestration with a single refinement pass and a MAKER vote
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use maker_consensus::{ConsensusConfig, ConsensusEngine, ResultValue};
//!
//! # async fn run() {
//! let config = ConsensusConfig::from_env();
//! let engine = ConsensusEngine::new(&config);
//! let verdict = engine.verify(&ResultValue::from("42")).await;
//! println!("verified={} score={:.2}", verdict.verified, verdict.quality_score);
//! # }
//! ```

pub mod config;
pub mod decomposition;
pub mod engine;
pub mod hashing;
pub mod orchestrator;
pub mod reputation;
pub mod verifier;
pub mod voting;

// Re-export configuration
pub use config::{ConfigError, ConfigResult, ConsensusConfig};

// Re-export decomposition types
pub use decomposition::{
    Decomposer, Decomposition, DecompositionError, DecompositionResult, NodeIndex, NodeKind,
    SubtaskNode, Task,
};

// Re-export engine types
pub use engine::{ConsensusEngine, EngineStatus, FlagKind, FlagSeverity, QualityFlag, QualityVerdict};

// Re-export hashing types
pub use hashing::{fingerprint, Fingerprint, ResultValue};

// Re-export orchestrator types
pub use orchestrator::{
    ComponentConfidence, LeafReport, LeafState, MemoryVoteLog, OrchestratorError,
    OrchestratorResult, OrchestratorStatus, SolveError, Solver, TaskOrchestrator, TaskVerdict,
    VoteLog, VoteLogError, VoteRecord,
};

// Re-export reputation types
pub use reputation::{
    LedgerError, LedgerResult, LedgerSnapshot, ReputationLedger, ReputationStore,
    SharedReputationLedger,
};

// Re-export verifier and voting types
pub use verifier::{FingerprintJudge, Judge, JudgeError, Judgment, Verifier};
pub use voting::{ConsensusDecision, ConsensusResult, VoteGroup, Voter, VotingStrategy};
