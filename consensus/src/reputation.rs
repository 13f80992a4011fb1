//! Reputation ledger
//!
//! Maps voter identities to integer trust scores in `[0, 100]`. Scores weight
//! votes in reputation-weighted consensus rounds. The ledger is an explicit
//! object handed to the voter; there is no process-wide instance.
//!
//! Reads are concurrent. Each entry is an atomic behind a read-mostly lock,
//! so updates to one voter are serialized while updates to different voters
//! do not contend. Only the first write for an unseen voter takes the write
//! lock.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Lowest possible reputation score.
pub const MIN_SCORE: u8 = 0;
/// Highest possible reputation score.
pub const MAX_SCORE: u8 = 100;
/// Score reported for voters the ledger has never seen.
pub const DEFAULT_SCORE: u8 = 50;

/// Error type for ledger persistence
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger persistence
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Shared reference to ReputationLedger
pub type SharedReputationLedger = Arc<ReputationLedger>;

/// Minimal reputation store contract the voter depends on.
pub trait ReputationStore: Send + Sync {
    /// Current score for a voter, or the default for unseen voters.
    fn score(&self, voter_id: &str) -> u8;

    /// Set a voter's score, clamping into `[0, 100]`. Returns the stored value.
    fn set_score(&self, voter_id: &str, score: i64) -> u8;

    /// Vote weight in `[0.0, 1.0]` derived from the score.
    fn weight(&self, voter_id: &str) -> f64 {
        f64::from(self.score(voter_id)) / f64::from(MAX_SCORE)
    }
}

/// Clamp a requested score into range, logging out-of-range requests.
fn clamp_score(voter_id: &str, score: i64) -> u8 {
    let clamped = score.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE));
    if clamped != score {
        warn!(
            voter = voter_id,
            requested = score,
            stored = clamped,
            "Reputation update out of bounds, clamped"
        );
    }
    clamped as u8
}

/// In-memory reputation ledger.
#[derive(Debug)]
pub struct ReputationLedger {
    entries: RwLock<HashMap<String, AtomicU8>>,
    default_score: u8,
}

impl Default for ReputationLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ReputationLedger {
    /// Create an empty ledger with the standard default score.
    pub fn new() -> Self {
        Self::with_default(DEFAULT_SCORE)
    }

    /// Create an empty ledger reporting `default_score` for unseen voters.
    pub fn with_default(default_score: u8) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_score: default_score.min(MAX_SCORE),
        }
    }

    /// Create a shared reference to this ledger
    pub fn shared(self) -> SharedReputationLedger {
        Arc::new(self)
    }

    pub fn default_score(&self) -> u8 {
        self.default_score
    }

    /// Adjust a voter's score by `delta`, starting from its current score.
    pub fn adjust(&self, voter_id: &str, delta: i64) -> u8 {
        {
            let entries = self.read();
            if let Some(entry) = entries.get(voter_id) {
                let mut stored = 0;
                let _ = entry.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    stored = clamp_score(voter_id, i64::from(current) + delta);
                    Some(stored)
                });
                return stored;
            }
        }

        let mut entries = self.write();
        let entry = entries
            .entry(voter_id.to_string())
            .or_insert_with(|| AtomicU8::new(self.default_score));
        let stored = clamp_score(voter_id, i64::from(entry.load(Ordering::Acquire)) + delta);
        entry.store(stored, Ordering::Release);
        stored
    }

    /// Number of voters with an explicit score.
    pub fn tracked(&self) -> usize {
        self.read().len()
    }

    /// Whether a voter has an explicit score.
    pub fn contains(&self, voter_id: &str) -> bool {
        self.read().contains_key(voter_id)
    }

    /// Point-in-time copy of all explicit scores, ordered by voter id.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let scores = self
            .read()
            .iter()
            .map(|(voter, score)| (voter.clone(), score.load(Ordering::Acquire)))
            .collect();
        LedgerSnapshot {
            default_score: self.default_score,
            scores,
        }
    }

    /// Rebuild a ledger from a snapshot. Scores are clamped on the way in.
    pub fn restore(snapshot: LedgerSnapshot) -> Self {
        let ledger = Self::with_default(snapshot.default_score);
        {
            let mut entries = ledger.write();
            for (voter, score) in snapshot.scores {
                let stored = clamp_score(&voter, i64::from(score));
                entries.insert(voter, AtomicU8::new(stored));
            }
        }
        ledger
    }

    /// Persist the ledger as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> LedgerResult<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), voters = snapshot.scores.len(), "Reputation ledger saved");
        Ok(())
    }

    /// Load a ledger previously written by [`ReputationLedger::save`].
    pub fn load(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let snapshot: LedgerSnapshot = serde_json::from_str(&content)?;
        Ok(Self::restore(snapshot))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AtomicU8>> {
        // Entries are atomics, so a poisoned lock never exposes a torn value
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AtomicU8>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReputationStore for ReputationLedger {
    fn score(&self, voter_id: &str) -> u8 {
        self.read()
            .get(voter_id)
            .map(|score| score.load(Ordering::Acquire))
            .unwrap_or(self.default_score)
    }

    fn set_score(&self, voter_id: &str, score: i64) -> u8 {
        let stored = clamp_score(voter_id, score);
        {
            let entries = self.read();
            if let Some(entry) = entries.get(voter_id) {
                entry.store(stored, Ordering::Release);
                return stored;
            }
        }
        self.write()
            .entry(voter_id.to_string())
            .and_modify(|entry| entry.store(stored, Ordering::Release))
            .or_insert_with(|| AtomicU8::new(stored));
        stored
    }
}

/// Serializable ledger contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Score reported for unseen voters
    #[serde(default = "default_score")]
    pub default_score: u8,
    /// Explicit scores by voter id
    #[serde(default)]
    pub scores: BTreeMap<String, u8>,
}

fn default_score() -> u8 {
    DEFAULT_SCORE
}
