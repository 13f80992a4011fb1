//! Local stand-in for the agent layer's solver.

use async_trait::async_trait;
use maker_consensus::{ResultValue, SolveError, Solver, SubtaskNode};
use tracing::debug;

/// Answers every leaf with a record of what was asked.
///
/// Deterministic, so repeated runs produce identical fingerprints.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoSolver;

#[async_trait]
impl Solver for EchoSolver {
    async fn solve(&self, node: &SubtaskNode) -> Result<ResultValue, SolveError> {
        debug!(leaf = %node.id, "Echo solve");
        Ok(ResultValue::map([
            ("leaf", ResultValue::from(node.id.as_str())),
            ("description", ResultValue::from(node.description.as_str())),
            ("depth", ResultValue::from(node.depth as i64)),
        ]))
    }
}
