//! Per-result quality verification
//!
//! [`ConsensusEngine::verify`] is the single entry point the agent layer
//! uses to check a result: run a verifier round, vote on it, and turn the
//! vote into a quality score.
//!
//! `quality_score = min(1.0, consensus_strength + bonus)`, where the bonus
//! only applies when every verifier agreed.
//!
//! The engine reads the reputation ledger but never writes it while
//! verifying. Feeding outcomes back into reputation is the caller's call,
//! through [`ConsensusEngine::update_reputation`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ConsensusConfig;
use crate::hashing::ResultValue;
use crate::reputation::{ReputationLedger, ReputationStore, SharedReputationLedger};
use crate::verifier::{judgments_from_results, FingerprintJudge, Judge, Judgment, Verifier};
use crate::voting::{ConsensusResult, Voter, VotingStrategy};

/// Consensus strength below which a verdict is flagged as low consensus.
const LOW_CONSENSUS_STRENGTH: f64 = 0.5;

/// Outcome of verifying one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub verified: bool,
    /// Consensus strength plus the unanimity bonus, capped at 1.0
    pub quality_score: f64,
    pub consensus: ConsensusResult,
    pub verifier_count: usize,
}

/// Severity of a quality flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSeverity {
    Medium,
    High,
}

/// Kind of problem found in a verified result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    VerificationFailed,
    LowConsensus,
    EmptyResult,
}

/// A problem worth surfacing to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub kind: FlagKind,
    pub severity: FlagSeverity,
    pub message: String,
    /// Score or strength that triggered the flag, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Point-in-time engine status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub verifier_count: usize,
    pub quality_threshold: f64,
    pub strategy: VotingStrategy,
    pub reputation_tracked: usize,
    pub capabilities: Vec<String>,
}

/// Verifier + voter + reputation ledger behind one `verify` call.
pub struct ConsensusEngine {
    verifier: Verifier,
    voter: Voter,
    judge: Arc<dyn Judge>,
    ledger: SharedReputationLedger,
    verifier_ids: Vec<String>,
    unanimous_bonus: f64,
}

impl ConsensusEngine {
    /// Engine with the reference judge and a fresh ledger.
    pub fn new(config: &ConsensusConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(FingerprintJudge),
            ReputationLedger::with_default(config.default_reputation).shared(),
        )
    }

    pub fn with_parts(
        config: &ConsensusConfig,
        judge: Arc<dyn Judge>,
        ledger: SharedReputationLedger,
    ) -> Self {
        let strategy = if config.quality_reputation_weighted {
            VotingStrategy::ReputationWeighted
        } else {
            VotingStrategy::Majority
        };
        Self {
            verifier: Verifier::new(config.judge_timeout()),
            voter: Voter::new(strategy, config.quality_threshold),
            judge,
            ledger,
            verifier_ids: Verifier::verifier_ids(config.verifier_count),
            unanimous_bonus: config.unanimous_bonus,
        }
    }

    /// Replace the judge
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = judge;
        self
    }

    /// Replace the verifier ids used for each round
    pub fn with_verifier_ids(mut self, ids: Vec<String>) -> Self {
        self.verifier_ids = ids;
        self
    }

    pub fn ledger(&self) -> &SharedReputationLedger {
        &self.ledger
    }

    pub fn judge(&self) -> Arc<dyn Judge> {
        self.judge.clone()
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Verify one result with a full verifier round.
    pub async fn verify(&self, result: &ResultValue) -> QualityVerdict {
        let judgments = self.run_round(Arc::new(result.clone())).await;
        self.score(&judgments)
    }

    /// Run a verifier round without voting on it.
    pub async fn run_round(&self, result: Arc<ResultValue>) -> Vec<Judgment> {
        self.verifier
            .verify_round(result, &self.verifier_ids, self.judge.clone())
            .await
    }

    /// Vote on a completed round and score it.
    pub fn score(&self, judgments: &[Judgment]) -> QualityVerdict {
        let consensus = self.voter.vote(judgments, &*self.ledger);
        let bonus = if consensus.all_agree {
            self.unanimous_bonus
        } else {
            0.0
        };
        let quality_score = (consensus.consensus_strength + bonus).min(1.0);
        let verified = self.voter.passes(quality_score);

        info!(
            quality_score,
            verified,
            strength = consensus.consensus_strength,
            "Result verified"
        );

        QualityVerdict {
            verified,
            quality_score,
            verifier_count: judgments.len(),
            consensus,
        }
    }

    /// Vote directly over candidate results from several agents.
    ///
    /// Each result becomes one judgment (`agent-{idx}`); the verdict uses the
    /// same scoring as [`ConsensusEngine::verify`].
    pub fn verify_with_voting(&self, results: &[ResultValue]) -> QualityVerdict {
        self.score(&judgments_from_results(results))
    }

    /// Set a voter's reputation (clamped to `[0, 100]`).
    pub fn update_reputation(&self, voter_id: &str, score: i64) -> u8 {
        let stored = self.ledger.set_score(voter_id, score);
        info!(voter = voter_id, score = stored, "Updated reputation");
        stored
    }

    /// Flag problems with a result and its verdict.
    pub fn flag_issues(&self, result: &ResultValue, verdict: &QualityVerdict) -> Vec<QualityFlag> {
        let mut flags = Vec::new();

        if !verdict.verified {
            flags.push(QualityFlag {
                kind: FlagKind::VerificationFailed,
                severity: FlagSeverity::High,
                message: "Result failed verification".to_string(),
                value: Some(verdict.quality_score),
            });
        }

        let strength = verdict.consensus.consensus_strength;
        if strength < LOW_CONSENSUS_STRENGTH {
            flags.push(QualityFlag {
                kind: FlagKind::LowConsensus,
                severity: FlagSeverity::Medium,
                message: "Low consensus among verifiers".to_string(),
                value: Some(strength),
            });
        }

        if result.is_empty() {
            flags.push(QualityFlag {
                kind: FlagKind::EmptyResult,
                severity: FlagSeverity::High,
                message: "Result is empty or missing".to_string(),
                value: None,
            });
        }

        if !flags.is_empty() {
            warn!(flags = flags.len(), "Quality issues flagged");
        }
        flags
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            verifier_count: self.verifier_ids.len(),
            quality_threshold: self.voter.threshold,
            strategy: self.voter.strategy,
            reputation_tracked: self.ledger.tracked(),
            capabilities: [
                "maker_voting",
                "result_verification",
                "confidence_scoring",
                "error_detection",
                "quality_assurance",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::JudgeError;
    use async_trait::async_trait;

    /// Two verifiers see the result, the last one sees something else.
    struct SplitJudge;

    #[async_trait]
    impl Judge for SplitJudge {
        async fn judge(&self, result: &ResultValue, voter_id: &str) -> Result<Judgment, JudgeError> {
            if voter_id == "verifier-2" {
                Ok(Judgment::observed(voter_id, ResultValue::from("diverged"), true))
            } else {
                Ok(Judgment::observed(voter_id, result.clone(), true))
            }
        }
    }

    fn sample() -> ResultValue {
        ResultValue::map([
            ("data", ResultValue::from("test")),
            ("value", ResultValue::from(42i64)),
        ])
    }

    #[tokio::test]
    async fn test_default_verify_is_unanimous() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let verdict = engine.verify(&sample()).await;

        assert!(verdict.verified);
        assert_eq!(verdict.quality_score, 1.0);
        assert_eq!(verdict.verifier_count, 3);
        assert!(verdict.consensus.all_agree);
        assert_eq!(verdict.consensus.majority_count, 3);
    }

    #[tokio::test]
    async fn test_two_of_three_gets_no_bonus() {
        let engine =
            ConsensusEngine::new(&ConsensusConfig::default()).with_judge(Arc::new(SplitJudge));
        let verdict = engine.verify(&sample()).await;

        assert!((verdict.quality_score - 2.0 / 3.0).abs() < 1e-12);
        assert!(!verdict.verified);
        assert!(!verdict.consensus.all_agree);
    }

    #[tokio::test]
    async fn test_verify_does_not_touch_ledger() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        engine.verify(&sample()).await;
        assert_eq!(engine.ledger().tracked(), 0);

        assert_eq!(engine.update_reputation("verifier-0", 130), 100);
        assert_eq!(engine.ledger().score("verifier-0"), 100);
        assert_eq!(engine.status().reputation_tracked, 1);
    }

    #[tokio::test]
    async fn test_empty_verifier_set() {
        let engine =
            ConsensusEngine::new(&ConsensusConfig::default()).with_verifier_ids(Vec::new());
        let verdict = engine.verify(&sample()).await;
        assert!(!verdict.verified);
        assert_eq!(verdict.quality_score, 0.0);
        assert_eq!(verdict.verifier_count, 0);
    }

    #[test]
    fn test_unanimous_bonus_is_capped() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let judgments: Vec<Judgment> = (0..3)
            .map(|i| Judgment::observed(format!("verifier-{i}"), sample(), true))
            .collect();
        let verdict = engine.score(&judgments);
        assert_eq!(verdict.consensus.consensus_strength, 1.0);
        assert_eq!(verdict.quality_score, 1.0);
    }

    #[test]
    fn test_unweighted_quality_counts_invalid_members() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let judgments = vec![
            Judgment::observed("verifier-0", sample(), true),
            Judgment::observed("verifier-1", sample(), true),
            Judgment::observed("verifier-2", sample(), false),
        ];
        let verdict = engine.score(&judgments);
        assert_eq!(verdict.consensus.majority_count, 3);
        assert!(verdict.consensus.all_agree);
        assert_eq!(verdict.quality_score, 1.0);
        assert!(verdict.verified);
    }

    #[test]
    fn test_verify_with_voting() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let agreeing = vec![sample(), sample(), sample()];
        let verdict = engine.verify_with_voting(&agreeing);
        assert!(verdict.verified);
        assert_eq!(verdict.verifier_count, 3);

        let split = vec![sample(), ResultValue::from("x"), ResultValue::from("y")];
        let verdict = engine.verify_with_voting(&split);
        assert!(!verdict.verified);
        assert!((verdict.consensus.consensus_strength - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_flag_issues() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let split = vec![ResultValue::Null, ResultValue::from("x"), ResultValue::from("y")];
        let verdict = engine.verify_with_voting(&split);
        let flags = engine.flag_issues(&ResultValue::Null, &verdict);
        let kinds: Vec<FlagKind> = flags.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FlagKind::VerificationFailed,
                FlagKind::LowConsensus,
                FlagKind::EmptyResult
            ]
        );

        let good = engine.verify_with_voting(&[sample(), sample()]);
        assert!(engine.flag_issues(&sample(), &good).is_empty());
    }

    #[test]
    fn test_status() {
        let engine = ConsensusEngine::new(&ConsensusConfig::default());
        let status = engine.status();
        assert_eq!(status.verifier_count, 3);
        assert_eq!(status.strategy, VotingStrategy::Majority);
        assert!(status.capabilities.contains(&"maker_voting".to_string()));
    }

    #[tokio::test]
    async fn test_weighted_quality_mode() {
        let config = ConsensusConfig {
            quality_reputation_weighted: true,
            ..Default::default()
        };
        let engine = ConsensusEngine::new(&config).with_judge(Arc::new(SplitJudge));
        engine.update_reputation("verifier-0", 0);
        engine.update_reputation("verifier-1", 0);
        engine.update_reputation("verifier-2", 100);
        let verdict = engine.verify(&sample()).await;
        assert_eq!(verdict.consensus.consensus_strength, 1.0);
        assert!(verdict.verified);
    }
}
