//! Multi-verifier rounds
//!
//! A round asks every requested verifier to judge the same result, all at
//! once, and waits for every one of them before anything is voted on.
//!
//! ```text
//! result ──┬─ JoinSet::spawn(judge, verifier-0) ─┐
//!          ├─ JoinSet::spawn(judge, verifier-1) ─┼─ join all ─→ Vec<Judgment>
//!          └─ JoinSet::spawn(judge, verifier-2) ─┘   (voter order)
//! ```
//!
//! A judge that errors, times out or panics still yields a judgment: an
//! invalid one carrying [`Fingerprint::failed`]. The round therefore always
//! returns exactly one judgment per requested verifier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::hashing::{fingerprint, Fingerprint, ResultValue};

/// Default number of verifiers per round
pub const DEFAULT_VERIFIER_COUNT: usize = 3;

/// Why a judge failed to produce a judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum JudgeError {
    #[error("judge failed: {0}")]
    Failed(String),

    #[error("judge timed out after {0}ms")]
    TimedOut(u64),

    #[error("judge task aborted: {0}")]
    Aborted(String),
}

/// One verifier's verdict on a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub voter_id: String,
    pub fingerprint: Fingerprint,
    /// What the verifier observed, if it produced anything
    pub observed: Option<ResultValue>,
    pub is_valid: bool,
    /// Verifier-reported confidence (0.0–1.0)
    pub raw_confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Set on synthetic judgments standing in for a failed verifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<JudgeError>,
}

impl Judgment {
    /// Judgment that the verifier observed `observed`.
    pub fn observed(voter_id: impl Into<String>, observed: ResultValue, is_valid: bool) -> Self {
        Self {
            voter_id: voter_id.into(),
            fingerprint: fingerprint(&observed),
            observed: Some(observed),
            is_valid,
            raw_confidence: if is_valid { 0.9 } else { 0.1 },
            timestamp: Utc::now(),
            failure: None,
        }
    }

    /// Synthetic judgment recorded for a verifier that produced nothing.
    pub fn failed(voter_id: impl Into<String>, error: JudgeError) -> Self {
        Self {
            voter_id: voter_id.into(),
            fingerprint: Fingerprint::failed(),
            observed: None,
            is_valid: false,
            raw_confidence: 0.0,
            timestamp: Utc::now(),
            failure: Some(error),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.raw_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Whether this judgment may support a fingerprint in a vote.
    pub fn supports(&self) -> bool {
        self.is_valid && !self.fingerprint.is_failed()
    }
}

/// An independent check of a result.
///
/// In production a judge re-executes the subtask or validates the output
/// against an external source.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(&self, result: &ResultValue, voter_id: &str) -> Result<Judgment, JudgeError>;
}

/// Reference judge: fingerprints the result it was given and accepts it.
///
/// `is_valid` is `!fingerprint.is_empty()`, which always holds for a real
/// fingerprint. Replace it with a judge that actually checks something.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintJudge;

#[async_trait]
impl Judge for FingerprintJudge {
    async fn judge(&self, result: &ResultValue, voter_id: &str) -> Result<Judgment, JudgeError> {
        let fp = fingerprint(result);
        let is_valid = !fp.as_str().is_empty();
        Ok(Judgment::observed(voter_id, result.clone(), is_valid))
    }
}

/// Runs verification rounds with a per-judge timeout.
#[derive(Debug, Clone)]
pub struct Verifier {
    judge_timeout: Duration,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Verifier {
    pub fn new(judge_timeout: Duration) -> Self {
        Self { judge_timeout }
    }

    pub fn judge_timeout(&self) -> Duration {
        self.judge_timeout
    }

    /// Standard verifier ids for a round of `count`.
    pub fn verifier_ids(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("verifier-{i}")).collect()
    }

    /// Run one round: every verifier judges `result` concurrently.
    ///
    /// Returns one judgment per entry of `verifier_ids`, in the same order.
    pub async fn verify_round(
        &self,
        result: Arc<ResultValue>,
        verifier_ids: &[String],
        judge: Arc<dyn Judge>,
    ) -> Vec<Judgment> {
        if verifier_ids.is_empty() {
            debug!("Empty verification round");
            return Vec::new();
        }

        let timeout = self.judge_timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let mut join_set: JoinSet<(usize, Judgment)> = JoinSet::new();

        for (slot, voter_id) in verifier_ids.iter().enumerate() {
            let judge = judge.clone();
            let result = result.clone();
            let voter_id = voter_id.clone();

            join_set.spawn(async move {
                let judgment =
                    match tokio::time::timeout(timeout, judge.judge(&result, &voter_id)).await {
                        Ok(Ok(judgment)) => judgment,
                        Ok(Err(e)) => {
                            warn!(voter = %voter_id, error = %e, "Verifier failed");
                            Judgment::failed(voter_id, e)
                        }
                        Err(_) => {
                            warn!(voter = %voter_id, timeout_ms, "Verifier timed out");
                            Judgment::failed(voter_id, JudgeError::TimedOut(timeout_ms))
                        }
                    };
                (slot, judgment)
            });
        }

        // Full barrier: nothing is returned until every judge has finished
        let mut slots: Vec<Option<Judgment>> = vec![None; verifier_ids.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, judgment)) => {
                    debug!(
                        voter = %judgment.voter_id,
                        fingerprint = judgment.fingerprint.short(),
                        valid = judgment.is_valid,
                        "Judgment received"
                    );
                    slots[slot] = Some(judgment);
                }
                Err(e) => {
                    warn!(error = %e, "Verifier task panicked");
                }
            }
        }

        let judgments: Vec<Judgment> = slots
            .into_iter()
            .zip(verifier_ids)
            .map(|(slot, voter_id)| {
                slot.unwrap_or_else(|| {
                    Judgment::failed(
                        voter_id.clone(),
                        JudgeError::Aborted("verifier task did not complete".to_string()),
                    )
                })
            })
            .collect();

        let failed = judgments.iter().filter(|j| j.failure.is_some()).count();
        info!(
            verifiers = judgments.len(),
            failed,
            "Verification round complete"
        );

        judgments
    }
}

/// Turn candidate results from several agents into judgments, one per
/// result, identified as `agent-{idx}`.
pub fn judgments_from_results(results: &[ResultValue]) -> Vec<Judgment> {
    results
        .iter()
        .enumerate()
        .map(|(idx, result)| Judgment::observed(format!("agent-{idx}"), result.clone(), true))
        .collect()
}
