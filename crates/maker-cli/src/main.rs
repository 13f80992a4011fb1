mod solver;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use maker_consensus::{
    ConsensusConfig, ConsensusEngine, FingerprintJudge, MemoryVoteLog, ReputationLedger,
    ResultValue, SharedReputationLedger, Task, TaskOrchestrator,
};
use serde::Serialize;
use solver::EchoSolver;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings layered on top of the config file and environment
#[derive(Args, Debug)]
struct Overrides {
    /// TOML config file (MAKER_* environment variables still apply on top)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Reputation ledger JSON file, loaded if present and saved after a run
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Target subtask count (overrides MAKER_TARGET_SUBTASKS)
    #[arg(long, global = true)]
    target: Option<usize>,

    /// Maximum decomposition depth (overrides MAKER_MAX_DEPTH)
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Verifiers per round (overrides MAKER_VERIFIER_COUNT)
    #[arg(long, global = true)]
    verifiers: Option<usize>,

    /// Weight per-result checks by reputation
    #[arg(long, global = true, default_value_t = false)]
    weighted: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decompose a task and print the tree's leaves
    Decompose {
        /// Task description
        #[arg(long)]
        task: String,

        /// Task id (defaults to a fresh UUID)
        #[arg(long)]
        task_id: Option<String>,
    },

    /// Verify one JSON result, or vote over several candidates
    Verify {
        /// Result as JSON; repeat to vote over candidates
        #[arg(long = "result", required = true)]
        results: Vec<String>,
    },

    /// Decompose, solve and verify a task end to end
    Run {
        /// Task description
        #[arg(long)]
        task: String,

        /// Task id (defaults to a fresh UUID)
        #[arg(long)]
        task_id: Option<String>,
    },
}

#[derive(Serialize)]
struct DecomposeReport<'a> {
    task_id: &'a str,
    node_count: usize,
    leaf_count: usize,
    level_widths: Vec<usize>,
    leaves: Vec<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maker_consensus=info,maker=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli.overrides)?;
    let ledger = load_ledger(cli.overrides.ledger.as_deref(), config.default_reputation)?;

    match cli.command {
        Command::Decompose { task, task_id } => {
            let task = build_task(task, task_id);
            let engine = Arc::new(ConsensusEngine::new(&config));
            let orchestrator = TaskOrchestrator::new(config, engine, Arc::new(EchoSolver));
            let decomposition = orchestrator.decompose(&task)?;

            let leaves = decomposition.leaves();
            let report = DecomposeReport {
                task_id: &task.id,
                node_count: decomposition.len(),
                leaf_count: decomposition.leaf_count,
                level_widths: decomposition.level_widths(),
                leaves: leaves
                    .iter()
                    .filter_map(|i| decomposition.node(*i))
                    .map(|n| n.id.as_str())
                    .collect(),
            };
            print_json(&report)?;
        }

        Command::Verify { results } => {
            let results = results
                .iter()
                .map(|raw| {
                    serde_json::from_str::<serde_json::Value>(raw)
                        .map(ResultValue::from)
                        .with_context(|| format!("Result is not valid JSON: {raw}"))
                })
                .collect::<Result<Vec<_>>>()?;

            let engine = ConsensusEngine::with_parts(&config, Arc::new(FingerprintJudge), ledger);
            let verdict = match results.as_slice() {
                [single] => engine.verify(single).await,
                many => engine.verify_with_voting(many),
            };
            let flags = results
                .first()
                .map(|r| engine.flag_issues(r, &verdict))
                .unwrap_or_default();

            print_json(&serde_json::json!({ "verdict": verdict, "flags": flags }))?;
        }

        Command::Run { task, task_id } => {
            let task = build_task(task, task_id);
            let engine = Arc::new(ConsensusEngine::with_parts(
                &config,
                Arc::new(FingerprintJudge),
                ledger.clone(),
            ));
            let vote_log = Arc::new(MemoryVoteLog::new());
            let orchestrator = TaskOrchestrator::new(config, engine, Arc::new(EchoSolver))
                .with_vote_log(vote_log.clone());

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, finishing in-flight rounds");
                    ctrl_c.cancel();
                }
            });

            info!(status = ?orchestrator.status(), "Starting run");
            let verdict = orchestrator
                .decompose_and_verify(&task, &cancel)
                .await
                .context("Task run failed")?;

            print_json(&serde_json::json!({
                "verdict": verdict,
                "vote_log": vote_log.records(),
            }))?;

            if let Some(path) = &cli.overrides.ledger {
                ledger
                    .save(path)
                    .with_context(|| format!("Failed to save ledger to {}", path.display()))?;
            }
        }
    }

    Ok(())
}

/// Defaults, then the config file or environment, then flags.
fn load_config(overrides: &Overrides) -> Result<ConsensusConfig> {
    let mut config = match &overrides.config {
        Some(path) => ConsensusConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConsensusConfig::from_env(),
    };

    if let Some(target) = overrides.target {
        config.target_subtask_count = target;
    }
    if let Some(depth) = overrides.max_depth {
        config.max_depth = depth;
    }
    if let Some(count) = overrides.verifiers {
        config.verifier_count = count;
    }
    if overrides.weighted {
        config.quality_reputation_weighted = true;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_ledger(path: Option<&Path>, default_score: u8) -> Result<SharedReputationLedger> {
    let ledger = match path {
        Some(path) if path.exists() => ReputationLedger::load(path)
            .with_context(|| format!("Failed to load ledger from {}", path.display()))?,
        _ => ReputationLedger::with_default(default_score),
    };
    Ok(ledger.shared())
}

fn build_task(description: String, id: Option<String>) -> Task {
    let task = Task::new(description);
    match id {
        Some(id) => task.with_id(id),
        None => task,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
