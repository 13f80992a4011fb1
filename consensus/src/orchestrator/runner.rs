//! Task orchestrator
//!
//! Solves and verifies every leaf of a decomposition on a semaphore-bounded
//! `JoinSet`, then scores the task and runs the MAKER vote.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::leaf::{LeafRecord, LeafReport, LeafState};
use super::vote_log::{VoteLog, VoteRecord};
use crate::config::ConsensusConfig;
use crate::decomposition::{Decomposer, Decomposition, DecompositionError, SubtaskNode, Task};
use crate::engine::{ConsensusEngine, EngineStatus};
use crate::hashing::{fingerprint, ResultValue};
use crate::voting::{ConsensusResult, Voter, VotingStrategy};

/// Why a solver produced no result for a leaf.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error("solver failed: {0}")]
    Failed(String),

    #[error("solver timed out after {0}ms")]
    TimedOut(u64),
}

/// External collaborator that produces a result for one leaf.
#[async_trait]
pub trait Solver: Send + Sync {
    async fn solve(&self, node: &SubtaskNode) -> Result<ResultValue, SolveError>;
}

/// Error type for orchestrator runs
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Decomposition failed: {0}")]
    Decomposition(#[from] DecompositionError),

    #[error("Run cancelled with {completed_leaves} of {leaf_count} leaves finished")]
    Cancelled {
        completed_leaves: usize,
        leaf_count: usize,
    },
}

/// Result type for orchestrator runs
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Confidence of one top-level component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfidence {
    pub component_id: String,
    pub leaf_count: usize,
    pub accepted_leaves: usize,
    /// Mean quality score of the component's leaves
    pub confidence: f64,
}

/// Task-level outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVerdict {
    pub task_id: String,
    /// Mean leaf quality score, 0.0 with no leaves
    pub confidence: f64,
    pub accepted: bool,
    /// Still short of the MAKER threshold after any refinement
    pub needs_refinement: bool,
    pub leaf_count: usize,
    pub accepted_leaves: usize,
    pub rejected_leaves: usize,
    pub refined_leaves: usize,
    pub component_confidence: Vec<ComponentConfidence>,
    pub maker_vote: ConsensusResult,
    pub leaves: Vec<LeafReport>,
}

/// Point-in-time orchestrator status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    pub engine: EngineStatus,
    pub target_subtask_count: usize,
    pub max_depth: usize,
    pub maker_voter_count: usize,
    pub maker_threshold: f64,
    pub max_concurrent_leaves: usize,
    pub refine_failed_leaves: bool,
    pub vote_log_enabled: bool,
}

/// Composes decomposition, per-leaf verification and the MAKER vote.
pub struct TaskOrchestrator {
    config: ConsensusConfig,
    decomposer: Decomposer,
    engine: Arc<ConsensusEngine>,
    solver: Arc<dyn Solver>,
    vote_log: Option<Arc<dyn VoteLog>>,
    maker_voter: Voter,
    maker_voter_ids: Vec<String>,
}

impl TaskOrchestrator {
    pub fn new(config: ConsensusConfig, engine: Arc<ConsensusEngine>, solver: Arc<dyn Solver>) -> Self {
        let decomposer = Decomposer::new(config.target_subtask_count, config.max_depth);
        let maker_voter = Voter::new(VotingStrategy::ReputationWeighted, config.maker_threshold);
        let maker_voter_ids = (0..config.maker_voter_count)
            .map(|i| format!("voter-{i}"))
            .collect();
        Self {
            config,
            decomposer,
            engine,
            solver,
            vote_log: None,
            maker_voter,
            maker_voter_ids,
        }
    }

    /// Record MAKER votes in `log`
    pub fn with_vote_log(mut self, log: Arc<dyn VoteLog>) -> Self {
        self.vote_log = Some(log);
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ConsensusEngine> {
        &self.engine
    }

    pub fn decompose(&self, task: &Task) -> OrchestratorResult<Decomposition> {
        Ok(self.decomposer.decompose(task)?)
    }

    /// Decompose `task`, solve and verify every leaf, and score the task.
    ///
    /// Cancellation is honoured between rounds: leaves already being solved
    /// or verified finish, no new leaf starts, and the run returns
    /// [`OrchestratorError::Cancelled`].
    pub async fn decompose_and_verify(
        &self,
        task: &Task,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<TaskVerdict> {
        let decomposition = self.decompose(task)?;
        let task_id = task.id.as_str();
        info!(task_id, leaves = decomposition.leaf_count, "Starting task run");

        let records: Vec<LeafRecord> = decomposition
            .leaves()
            .into_iter()
            .enumerate()
            .filter_map(|(order, index)| {
                let node = decomposition.node(index)?;
                let component_id = decomposition
                    .component_of(index)
                    .and_then(|c| decomposition.node(c))
                    .map(|c| c.id.clone());
                Some(LeafRecord::new(order, index, node.id.clone(), component_id))
            })
            .collect();

        let mut records = self.run_pass(&decomposition, records, cancel).await;
        check_cancelled(task_id, &records, cancel)?;

        let mut maker_vote = self.maker_vote(task_id, &records).await;
        let mut confidence = mean_confidence(&records);
        let mut accepted = self.task_accepted(confidence, &maker_vote);

        if !accepted && self.config.refine_failed_leaves {
            let mut refining = 0usize;
            for record in records.iter_mut().filter(|r| r.can_refine()) {
                if record.transition(LeafState::Pending, "refinement").is_ok() {
                    refining += 1;
                }
            }

            if refining > 0 {
                info!(
                    task_id,
                    refining,
                    confidence,
                    strength = maker_vote.consensus_strength,
                    "Task below MAKER threshold, refining rejected leaves"
                );
                check_cancelled(task_id, &records, cancel)?;
                records = self.run_pass(&decomposition, records, cancel).await;
                check_cancelled(task_id, &records, cancel)?;

                maker_vote = self.maker_vote(task_id, &records).await;
                confidence = mean_confidence(&records);
                accepted = self.task_accepted(confidence, &maker_vote);
            }
        }

        let component_confidence = decomposition
            .components()
            .map(|component| {
                let leaves: Vec<&LeafRecord> = records
                    .iter()
                    .filter(|r| r.component_id.as_deref() == Some(component.id.as_str()))
                    .collect();
                ComponentConfidence {
                    component_id: component.id.clone(),
                    leaf_count: leaves.len(),
                    accepted_leaves: count_state(leaves.iter().copied(), LeafState::Accepted),
                    confidence: mean(leaves.iter().map(|r| r.quality_score())),
                }
            })
            .collect();

        let verdict = TaskVerdict {
            task_id: task.id.clone(),
            confidence,
            accepted,
            needs_refinement: !accepted,
            leaf_count: records.len(),
            accepted_leaves: count_state(records.iter(), LeafState::Accepted),
            rejected_leaves: count_state(records.iter(), LeafState::Rejected),
            refined_leaves: records.iter().filter(|r| r.refinements > 0).count(),
            component_confidence,
            maker_vote,
            leaves: records.iter().map(LeafReport::from).collect(),
        };

        info!(
            task_id,
            confidence = verdict.confidence,
            accepted = verdict.accepted,
            accepted_leaves = verdict.accepted_leaves,
            rejected_leaves = verdict.rejected_leaves,
            refined_leaves = verdict.refined_leaves,
            "Task run complete"
        );

        Ok(verdict)
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            engine: self.engine.status(),
            target_subtask_count: self.decomposer.target_subtask_count,
            max_depth: self.decomposer.max_depth,
            maker_voter_count: self.maker_voter_ids.len(),
            maker_threshold: self.maker_voter.threshold,
            max_concurrent_leaves: self.config.max_concurrent_leaves,
            refine_failed_leaves: self.config.refine_failed_leaves,
            vote_log_enabled: self.vote_log.is_some(),
        }
    }

    fn task_accepted(&self, confidence: f64, maker_vote: &ConsensusResult) -> bool {
        self.maker_voter.passes(confidence) && maker_vote.is_approved()
    }

    /// Run every `Pending` leaf once. Other leaves pass through untouched.
    ///
    /// At most `max_concurrent_leaves` leaves are solved and verified at a
    /// time; a leaf that has not acquired a permit when the run is cancelled
    /// never starts.
    async fn run_pass(
        &self,
        decomposition: &Decomposition,
        mut records: Vec<LeafRecord>,
        cancel: &CancellationToken,
    ) -> Vec<LeafRecord> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent_leaves.max(1)));
        let solve_timeout = self.config.solve_timeout();
        let mut join_set: JoinSet<(usize, LeafRecord)> = JoinSet::new();
        let mut spawned = vec![false; records.len()];

        for (slot, record) in records.iter().enumerate() {
            let node = match decomposition.node(record.node) {
                Some(node) if record.state == LeafState::Pending => node.clone(),
                _ => continue,
            };
            spawned[slot] = true;

            let record = record.clone();
            let sem = sem.clone();
            let engine = self.engine.clone();
            let solver = self.solver.clone();
            let cancel = cancel.clone();

            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (slot, record);
                };
                if cancel.is_cancelled() {
                    return (slot, record);
                }
                (slot, run_leaf(record, node, engine, solver, solve_timeout).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, record)) => {
                    spawned[slot] = false;
                    records[slot] = record;
                }
                Err(e) => {
                    warn!(error = %e, "Leaf task panicked");
                }
            }
        }

        // Whatever is still marked spawned never came back
        for (slot, lost) in spawned.into_iter().enumerate() {
            if lost {
                let record = &mut records[slot];
                record.attempts += 1;
                record.error = Some("leaf task aborted".to_string());
                advance(record, LeafState::Rejected, "leaf task aborted");
            }
        }

        records
    }

    /// Reputation-weighted vote over the aggregated leaf results.
    async fn maker_vote(&self, task_id: &str, records: &[LeafRecord]) -> ConsensusResult {
        let aggregate = aggregate_result(records);
        let judgments = self
            .engine
            .verifier()
            .verify_round(Arc::new(aggregate), &self.maker_voter_ids, self.engine.judge())
            .await;

        let ledger = self.engine.ledger();
        let consensus = self.maker_voter.vote(&judgments, &**ledger);
        info!(
            task_id,
            strength = consensus.consensus_strength,
            decision = %consensus.decision,
            voters = judgments.len(),
            "MAKER vote complete"
        );

        if let Some(log) = &self.vote_log {
            let record = VoteRecord::new(task_id, &judgments, &**ledger, consensus.clone());
            if let Err(e) = log.append(record).await {
                warn!(task_id, error = %e, "Failed to record MAKER vote");
            }
        }

        consensus
    }
}

/// Solve and verify one leaf.
async fn run_leaf(
    mut record: LeafRecord,
    node: SubtaskNode,
    engine: Arc<ConsensusEngine>,
    solver: Arc<dyn Solver>,
    solve_timeout: Duration,
) -> LeafRecord {
    record.attempts += 1;
    let timeout_ms = solve_timeout.as_millis() as u64;

    let solved = match tokio::time::timeout(solve_timeout, solver.solve(&node)).await {
        Ok(solved) => solved,
        Err(_) => Err(SolveError::TimedOut(timeout_ms)),
    };
    let result = match solved {
        Ok(result) => result,
        Err(e) => {
            warn!(leaf = %record.leaf_id, attempt = record.attempts, error = %e, "Solve failed");
            record.error = Some(e.to_string());
            advance(&mut record, LeafState::Rejected, "solve failed");
            return record;
        }
    };

    record.fingerprint = Some(fingerprint(&result));
    advance(&mut record, LeafState::Solved, "solved");
    advance(&mut record, LeafState::Verifying, "verification round started");

    let verdict = engine.verify(&result).await;
    let (next, reason) = if verdict.verified {
        (LeafState::Accepted, "verified")
    } else {
        (LeafState::Rejected, "verification failed")
    };
    debug!(
        leaf = %record.leaf_id,
        quality_score = verdict.quality_score,
        state = %next,
        "Leaf verified"
    );
    record.verdict = Some(verdict);
    advance(&mut record, next, reason);
    record
}

fn advance(record: &mut LeafRecord, to: LeafState, reason: &str) {
    if let Err(e) = record.transition(to, reason) {
        warn!(leaf = %record.leaf_id, error = %e, "Leaf transition refused");
    }
}

fn check_cancelled(
    task_id: &str,
    records: &[LeafRecord],
    cancel: &CancellationToken,
) -> OrchestratorResult<()> {
    if !cancel.is_cancelled() {
        return Ok(());
    }
    let completed_leaves = records.iter().filter(|r| r.state.is_terminal()).count();
    warn!(task_id, completed_leaves, "Task run cancelled");
    Err(OrchestratorError::Cancelled {
        completed_leaves,
        leaf_count: records.len(),
    })
}

/// Leaf id to fingerprint for accepted leaves, null for the rest.
fn aggregate_result(records: &[LeafRecord]) -> ResultValue {
    ResultValue::map(records.iter().map(|r| {
        let value = match (&r.fingerprint, r.state) {
            (Some(fp), LeafState::Accepted) => ResultValue::from(fp.as_str()),
            _ => ResultValue::Null,
        };
        (r.leaf_id.clone(), value)
    }))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn mean_confidence(records: &[LeafRecord]) -> f64 {
    mean(records.iter().map(|r| r.quality_score()))
}

fn count_state<'a>(records: impl Iterator<Item = &'a LeafRecord>, state: LeafState) -> usize {
    records.filter(|r| r.state == state).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::vote_log::{MemoryVoteLog, VoteLogError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns the node id; fails each leaf's first `fail_first` attempts,
    /// or every attempt for leaves in `always_fail`.
    #[derive(Default)]
    struct ScriptedSolver {
        fail_first: u32,
        always_fail: Vec<String>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedSolver {
        fn calls(&self, leaf_id: &str) -> u32 {
            self.calls.lock().unwrap().get(leaf_id).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl Solver for ScriptedSolver {
        async fn solve(&self, node: &SubtaskNode) -> Result<ResultValue, SolveError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(node.id.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            if self.always_fail.contains(&node.id) || attempt <= self.fail_first {
                return Err(SolveError::Failed(format!("attempt {attempt} failed")));
            }
            Ok(ResultValue::from(node.id.as_str()))
        }
    }

    struct SlowSolver;

    #[async_trait]
    impl Solver for SlowSolver {
        async fn solve(&self, _node: &SubtaskNode) -> Result<ResultValue, SolveError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(ResultValue::from("late"))
        }
    }

    /// Cancels the run from inside the first solve.
    struct CancellingSolver {
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Solver for CancellingSolver {
        async fn solve(&self, node: &SubtaskNode) -> Result<ResultValue, SolveError> {
            self.cancel.cancel();
            Ok(ResultValue::from(node.id.as_str()))
        }
    }

    struct BrokenLog;

    #[async_trait]
    impl VoteLog for BrokenLog {
        async fn append(&self, _record: VoteRecord) -> Result<(), VoteLogError> {
            Err(VoteLogError::Unavailable("offline".to_string()))
        }
    }

    /// One component with six leaves (`subtask-0-0` .. `subtask-0-5`).
    fn small_config() -> ConsensusConfig {
        ConsensusConfig {
            target_subtask_count: 6,
            max_depth: 2,
            ..Default::default()
        }
    }

    fn orchestrator(config: ConsensusConfig, solver: Arc<dyn Solver>) -> TaskOrchestrator {
        let engine = Arc::new(ConsensusEngine::new(&config));
        TaskOrchestrator::new(config, engine, solver)
    }

    fn task() -> Task {
        Task::new("Build a parser").with_id("task-1")
    }

    #[tokio::test]
    async fn test_all_leaves_accepted() {
        let solver = Arc::new(ScriptedSolver::default());
        let log = Arc::new(MemoryVoteLog::new());
        let orch = orchestrator(small_config(), solver.clone()).with_vote_log(log.clone());

        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(verdict.leaf_count, 6);
        assert_eq!(verdict.accepted_leaves, 6);
        assert_eq!(verdict.confidence, 1.0);
        assert!(verdict.accepted);
        assert!(!verdict.needs_refinement);
        assert_eq!(verdict.refined_leaves, 0);
        assert!(verdict.maker_vote.is_approved());
        assert_eq!(verdict.maker_vote.total_count, 5);
        assert_eq!(solver.total_calls(), 6);

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].task_id, "task-1");
        assert_eq!(records[0].votes.len(), 5);
    }

    #[tokio::test]
    async fn test_leaves_reported_in_depth_first_order() {
        let orch = orchestrator(small_config(), Arc::new(ScriptedSolver::default()));
        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();
        let ids: Vec<&str> = verdict.leaves.iter().map(|l| l.leaf_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["subtask-0-0", "subtask-0-1", "subtask-0-2", "subtask-0-3", "subtask-0-4", "subtask-0-5"]
        );
        assert_eq!(verdict.component_confidence.len(), 1);
        assert_eq!(verdict.component_confidence[0].component_id, "component-0");
        assert_eq!(verdict.component_confidence[0].leaf_count, 6);
    }

    #[tokio::test]
    async fn test_refinement_recovers_failed_leaves() {
        let solver = Arc::new(ScriptedSolver {
            fail_first: 1,
            ..Default::default()
        });
        let orch = orchestrator(small_config(), solver.clone());

        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(verdict.accepted);
        assert_eq!(verdict.confidence, 1.0);
        assert_eq!(verdict.refined_leaves, 6);
        assert!(verdict.leaves.iter().all(|l| l.attempts == 2 && l.refined));
        assert_eq!(solver.total_calls(), 12);
    }

    #[tokio::test]
    async fn test_refinement_never_resolves_accepted_leaves() {
        let always_fail: Vec<String> = (1..6).map(|j| format!("subtask-0-{j}")).collect();
        let solver = Arc::new(ScriptedSolver {
            always_fail,
            ..Default::default()
        });
        let orch = orchestrator(small_config(), solver.clone());

        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(solver.calls("subtask-0-0"), 1);
        assert_eq!(solver.calls("subtask-0-3"), 2);
        assert_eq!(verdict.accepted_leaves, 1);
        assert_eq!(verdict.rejected_leaves, 5);
        assert_eq!(verdict.refined_leaves, 5);
        assert!(!verdict.accepted);
        assert!(verdict.needs_refinement);
        assert!((verdict.confidence - 1.0 / 6.0).abs() < 1e-12);
        // Every leaf ends terminal
        assert!(verdict.leaves.iter().all(|l| l.state.is_terminal()));
        assert!(verdict.leaves[1].error.is_some());
    }

    #[tokio::test]
    async fn test_refinement_disabled() {
        let solver = Arc::new(ScriptedSolver {
            fail_first: 1,
            ..Default::default()
        });
        let config = ConsensusConfig {
            refine_failed_leaves: false,
            ..small_config()
        };
        let orch = orchestrator(config, solver.clone());

        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(solver.total_calls(), 6);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.refined_leaves, 0);
        assert!(verdict.needs_refinement);
    }

    #[tokio::test(start_paused = true)]
    async fn test_solve_timeout_rejects_leaf() {
        let config = ConsensusConfig {
            solve_timeout_ms: 100,
            ..small_config()
        };
        let orch = orchestrator(config, Arc::new(SlowSolver));

        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(verdict.rejected_leaves, 6);
        assert_eq!(verdict.confidence, 0.0);
        assert!(!verdict.accepted);
        for leaf in &verdict.leaves {
            assert_eq!(leaf.attempts, 2);
            assert!(leaf.error.as_deref().unwrap_or_default().contains("timed out"));
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let solver = Arc::new(ScriptedSolver::default());
        let orch = orchestrator(small_config(), solver.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orch.decompose_and_verify(&task(), &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Cancelled {
                completed_leaves: 0,
                leaf_count: 6
            }
        ));
        assert_eq!(solver.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_run_finishes_in_flight_leaf() {
        let cancel = CancellationToken::new();
        let config = ConsensusConfig {
            max_concurrent_leaves: 1,
            ..small_config()
        };
        let orch = orchestrator(
            config,
            Arc::new(CancellingSolver {
                cancel: cancel.clone(),
            }),
        );

        let err = orch.decompose_and_verify(&task(), &cancel).await.unwrap_err();
        match err {
            OrchestratorError::Cancelled {
                completed_leaves,
                leaf_count,
            } => {
                assert_eq!(completed_leaves, 1);
                assert_eq!(leaf_count, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_vote_log_failure_does_not_change_verdict() {
        let orch = orchestrator(small_config(), Arc::new(ScriptedSolver::default()))
            .with_vote_log(Arc::new(BrokenLog));
        let verdict = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(verdict.accepted);
    }

    #[tokio::test]
    async fn test_invalid_decomposition() {
        let config = ConsensusConfig {
            max_depth: 0,
            ..Default::default()
        };
        let orch = orchestrator(config, Arc::new(ScriptedSolver::default()));
        let err = orch
            .decompose_and_verify(&task(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Decomposition(_)));
    }

    #[test]
    fn test_status() {
        let orch = orchestrator(small_config(), Arc::new(ScriptedSolver::default()))
            .with_vote_log(Arc::new(MemoryVoteLog::new()));
        let status = orch.status();
        assert_eq!(status.maker_voter_count, 5);
        assert!((status.maker_threshold - 0.66).abs() < f64::EPSILON);
        assert!(status.vote_log_enabled);
        assert_eq!(status.engine.verifier_count, 3);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        assert_eq!(mean(std::iter::empty()), 0.0);
        assert_eq!(mean_confidence(&[]), 0.0);
    }
}
