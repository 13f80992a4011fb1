//! Voting over a round of judgments
//!
//! Judgments are partitioned by fingerprint. Unweighted, the largest group is
//! the majority and consensus strength is its share of the round. Weighted,
//! only valid judgments carry approval weight, and strength is the majority's
//! share of the total reputation weight.
//!
//! Synthetic failure judgments form their own group and count toward the
//! round total, but that group never wins, so a round with failed verifiers
//! can never look stronger than it is.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::hashing::Fingerprint;
use crate::reputation::ReputationStore;
use crate::verifier::Judgment;

/// Default acceptance threshold for per-result quality checks
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.7;

/// Default acceptance threshold for task-level MAKER votes
pub const DEFAULT_MAKER_THRESHOLD: f64 = 0.66;

/// How judgments are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// One judgment, one vote
    Majority,
    /// Each judgment weighs `reputation / 100`
    ReputationWeighted,
}

impl std::fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Majority => write!(f, "majority"),
            Self::ReputationWeighted => write!(f, "reputation_weighted"),
        }
    }
}

/// Outcome of a vote against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusDecision {
    Approved,
    Rejected,
    /// Nothing to vote on: no judgments, or no weight behind any of them
    NoConsensus,
}

impl std::fmt::Display for ConsensusDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::NoConsensus => write!(f, "no_consensus"),
        }
    }
}

/// Judgments sharing one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteGroup {
    pub fingerprint: Fingerprint,
    /// Every voter in the group, in round order
    pub voters: Vec<String>,
    /// Voters whose judgment was valid
    pub support: usize,
    /// Reputation weight of the valid judgments in the group
    pub weight: f64,
}

impl VoteGroup {
    pub fn size(&self) -> usize {
        self.voters.len()
    }
}

/// Size of one fingerprint group, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSize {
    pub fingerprint: Fingerprint,
    pub count: usize,
}

/// Result of one vote. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub majority_fingerprint: Option<Fingerprint>,
    /// Members of the majority group
    pub majority_count: usize,
    pub total_count: usize,
    /// Share of the round behind the majority (0.0–1.0)
    pub consensus_strength: f64,
    /// Exactly one distinct fingerprint, and not the failed one
    pub all_agree: bool,
    /// Group sizes in first-encountered order
    pub group_sizes: Vec<GroupSize>,
    pub strategy: VotingStrategy,
    pub threshold: f64,
    pub decision: ConsensusDecision,
}

impl ConsensusResult {
    /// Result of a round with nothing to count.
    pub fn indeterminate(total_count: usize, strategy: VotingStrategy, threshold: f64) -> Self {
        Self {
            majority_fingerprint: None,
            majority_count: 0,
            total_count,
            consensus_strength: 0.0,
            all_agree: false,
            group_sizes: Vec::new(),
            strategy,
            threshold,
            decision: ConsensusDecision::NoConsensus,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == ConsensusDecision::Approved
    }

    pub fn group_count(&self) -> usize {
        self.group_sizes.len()
    }
}

/// Partition judgments by fingerprint, keeping first-encountered order.
///
/// Every judgment lands in exactly one group. `weight` is filled from the
/// store when one is given, otherwise left at zero.
pub fn partition(judgments: &[Judgment], ledger: Option<&dyn ReputationStore>) -> Vec<VoteGroup> {
    let mut groups: Vec<VoteGroup> = Vec::new();
    for judgment in judgments {
        let index = match groups
            .iter()
            .position(|g| g.fingerprint == judgment.fingerprint)
        {
            Some(index) => index,
            None => {
                groups.push(VoteGroup {
                    fingerprint: judgment.fingerprint.clone(),
                    voters: Vec::new(),
                    support: 0,
                    weight: 0.0,
                });
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.voters.push(judgment.voter_id.clone());
        if judgment.supports() {
            group.support += 1;
            if let Some(store) = ledger {
                group.weight += store.weight(&judgment.voter_id);
            }
        }
    }
    groups
}

/// Index of the majority group. Ties go to the group encountered first.
///
/// The failed group is never a candidate. Unweighted rounds compare member
/// counts; weighted rounds compare approval weight, then member count.
fn majority_index(groups: &[VoteGroup], strategy: VotingStrategy) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, group) in groups.iter().enumerate() {
        if group.fingerprint.is_failed() {
            continue;
        }
        let better = match best.map(|b| &groups[b]) {
            None => true,
            Some(current) => match strategy {
                VotingStrategy::Majority => group.size() > current.size(),
                VotingStrategy::ReputationWeighted => {
                    group.weight > current.weight
                        || (group.weight == current.weight && group.size() > current.size())
                }
            },
        };
        if better {
            best = Some(index);
        }
    }
    best
}

/// Decides rounds against a threshold.
#[derive(Debug, Clone)]
pub struct Voter {
    pub strategy: VotingStrategy,
    pub threshold: f64,
}

impl Voter {
    pub fn new(strategy: VotingStrategy, threshold: f64) -> Self {
        Self {
            strategy,
            threshold,
        }
    }

    /// Unweighted voter at the per-result quality threshold.
    pub fn quality() -> Self {
        Self::new(VotingStrategy::Majority, DEFAULT_QUALITY_THRESHOLD)
    }

    /// Reputation-weighted voter at the MAKER threshold.
    pub fn maker() -> Self {
        Self::new(VotingStrategy::ReputationWeighted, DEFAULT_MAKER_THRESHOLD)
    }

    /// Whether `score` clears this voter's threshold (inclusive).
    pub fn passes(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Vote on a complete round of judgments.
    pub fn vote(&self, judgments: &[Judgment], ledger: &dyn ReputationStore) -> ConsensusResult {
        let total_count = judgments.len();
        if total_count == 0 {
            debug!("No judgments to vote on");
            return ConsensusResult::indeterminate(0, self.strategy, self.threshold);
        }

        let weighted = self.strategy == VotingStrategy::ReputationWeighted;
        let groups = partition(judgments, weighted.then_some(ledger));
        let group_sizes: Vec<GroupSize> = groups
            .iter()
            .map(|g| GroupSize {
                fingerprint: g.fingerprint.clone(),
                count: g.size(),
            })
            .collect();
        let all_agree = groups.len() == 1 && !groups[0].fingerprint.is_failed();

        let Some(majority) = majority_index(&groups, self.strategy).map(|i| &groups[i]) else {
            info!(total_count, "Every verifier failed, consensus indeterminate");
            return ConsensusResult {
                all_agree,
                group_sizes,
                ..ConsensusResult::indeterminate(total_count, self.strategy, self.threshold)
            };
        };

        let consensus_strength = match self.strategy {
            VotingStrategy::Majority => majority.size() as f64 / total_count as f64,
            VotingStrategy::ReputationWeighted => {
                let total_weight: f64 = judgments.iter().map(|j| ledger.weight(&j.voter_id)).sum();
                if total_weight > 0.0 {
                    (majority.weight / total_weight).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
        };

        let decision = if weighted && consensus_strength == 0.0 && majority.weight == 0.0 {
            ConsensusDecision::NoConsensus
        } else if self.passes(consensus_strength) {
            ConsensusDecision::Approved
        } else {
            ConsensusDecision::Rejected
        };

        info!(
            strategy = %self.strategy,
            majority = majority.fingerprint.short(),
            majority_count = majority.size(),
            total_count,
            strength = consensus_strength,
            all_agree,
            decision = %decision,
            "Vote complete"
        );

        ConsensusResult {
            majority_fingerprint: Some(majority.fingerprint.clone()),
            majority_count: majority.size(),
            total_count,
            consensus_strength,
            all_agree,
            group_sizes,
            strategy: self.strategy,
            threshold: self.threshold,
            decision,
        }
    }
}
