//! Append-only log of task-level votes
//!
//! MAKER votes are recorded in an external transaction log. The core only
//! appends; it never reads the log back and a failed append never changes a
//! verdict.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hashing::Fingerprint;
use crate::reputation::ReputationStore;
use crate::verifier::Judgment;
use crate::voting::ConsensusResult;

/// Error type for vote log appends
#[derive(Debug, thiserror::Error)]
pub enum VoteLogError {
    #[error("Vote log unavailable: {0}")]
    Unavailable(String),

    #[error("Vote log rejected record: {0}")]
    Rejected(String),
}

/// One voter's ballot as recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedVote {
    pub voter_id: String,
    pub fingerprint: Fingerprint,
    pub valid: bool,
    pub reputation: u8,
    pub weight: f64,
}

/// A complete task-level vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub task_id: String,
    pub voting_method: String,
    pub votes: Vec<RecordedVote>,
    pub consensus: ConsensusResult,
    pub recorded_at: DateTime<Utc>,
}

impl VoteRecord {
    /// Build a record, capturing each voter's reputation at vote time.
    pub fn new(
        task_id: &str,
        judgments: &[Judgment],
        ledger: &dyn ReputationStore,
        consensus: ConsensusResult,
    ) -> Self {
        let votes = judgments
            .iter()
            .map(|j| RecordedVote {
                voter_id: j.voter_id.clone(),
                fingerprint: j.fingerprint.clone(),
                valid: j.is_valid,
                reputation: ledger.score(&j.voter_id),
                weight: ledger.weight(&j.voter_id),
            })
            .collect();
        Self {
            task_id: task_id.to_string(),
            voting_method: "maker".to_string(),
            votes,
            consensus,
            recorded_at: Utc::now(),
        }
    }
}

/// External append-only transaction log.
#[async_trait]
pub trait VoteLog: Send + Sync {
    async fn append(&self, record: VoteRecord) -> Result<(), VoteLogError>;
}

/// In-memory vote log.
#[derive(Debug, Default)]
pub struct MemoryVoteLog {
    records: Mutex<Vec<VoteRecord>>,
}

impl MemoryVoteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything appended so far, oldest first.
    pub fn records(&self) -> Vec<VoteRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VoteLog for MemoryVoteLog {
    async fn append(&self, record: VoteRecord) -> Result<(), VoteLogError> {
        self.records
            .lock()
            .map_err(|_| VoteLogError::Unavailable("lock poisoned".to_string()))?
            .push(record);
        Ok(())
    }
}
