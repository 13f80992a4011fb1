//! Engine configuration
//!
//! Layered the usual way: defaults, then an optional TOML file, then
//! `MAKER_*` environment variables. Callers apply command-line overrides on
//! top and call [`ConsensusConfig::validate`] once at the end.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::reputation::{DEFAULT_SCORE, MAX_SCORE};
use crate::voting::{DEFAULT_MAKER_THRESHOLD, DEFAULT_QUALITY_THRESHOLD};

/// Error type for configuration loading and validation
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for decomposition, verification and voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Verifiers per quality round
    pub verifier_count: usize,

    /// Voters in the task-level MAKER vote
    pub maker_voter_count: usize,

    /// Minimum quality score for a result to be verified
    pub quality_threshold: f64,

    /// Minimum weighted consensus for a task-level MAKER vote
    pub maker_threshold: f64,

    /// Added to the quality score when every verifier agrees
    pub unanimous_bonus: f64,

    /// Weight quality rounds by reputation as well
    pub quality_reputation_weighted: bool,

    /// Reputation reported for unseen voters
    pub default_reputation: u8,

    /// Per-judge timeout in milliseconds
    pub judge_timeout_ms: u64,

    /// Per-solve timeout in milliseconds
    pub solve_timeout_ms: u64,

    /// Target subtask count handed to the decomposer
    pub target_subtask_count: usize,

    /// Maximum decomposition depth
    pub max_depth: usize,

    /// Leaves solved and verified at the same time
    pub max_concurrent_leaves: usize,

    /// Re-solve rejected leaves once when the task falls short
    pub refine_failed_leaves: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            verifier_count: 3,
            maker_voter_count: 5,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            maker_threshold: DEFAULT_MAKER_THRESHOLD,
            unanimous_bonus: 0.1,
            quality_reputation_weighted: false,
            default_reputation: DEFAULT_SCORE,
            judge_timeout_ms: 30_000,
            solve_timeout_ms: 120_000,
            target_subtask_count: 100,
            max_depth: 3,
            max_concurrent_leaves: 8,
            refine_failed_leaves: true,
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        if let Ok(value) = raw.trim().parse() {
            *target = value;
        }
    }
}

fn env_bool(var: &str, target: &mut bool) {
    if let Ok(val) = std::env::var(var) {
        *target = val.to_lowercase() == "true" || val == "1";
    }
}

impl ConsensusConfig {
    /// Create config from defaults plus environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `MAKER_*` environment variables onto this config.
    pub fn apply_env(&mut self) {
        env_parse("MAKER_VERIFIER_COUNT", &mut self.verifier_count);
        env_parse("MAKER_VOTER_COUNT", &mut self.maker_voter_count);
        env_parse("MAKER_QUALITY_THRESHOLD", &mut self.quality_threshold);
        env_parse("MAKER_VOTE_THRESHOLD", &mut self.maker_threshold);
        env_parse("MAKER_UNANIMOUS_BONUS", &mut self.unanimous_bonus);
        env_bool("MAKER_QUALITY_WEIGHTED", &mut self.quality_reputation_weighted);
        env_parse("MAKER_DEFAULT_REPUTATION", &mut self.default_reputation);
        env_parse("MAKER_JUDGE_TIMEOUT_MS", &mut self.judge_timeout_ms);
        env_parse("MAKER_SOLVE_TIMEOUT_MS", &mut self.solve_timeout_ms);
        env_parse("MAKER_TARGET_SUBTASKS", &mut self.target_subtask_count);
        env_parse("MAKER_MAX_DEPTH", &mut self.max_depth);
        env_parse("MAKER_MAX_CONCURRENT_LEAVES", &mut self.max_concurrent_leaves);
        env_bool("MAKER_REFINE", &mut self.refine_failed_leaves);
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file as written, without the environment.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a TOML file, then overlay the environment.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn judge_timeout(&self) -> Duration {
        Duration::from_millis(self.judge_timeout_ms)
    }

    pub fn solve_timeout(&self) -> Duration {
        Duration::from_millis(self.solve_timeout_ms)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        fn unit(field: &'static str, value: f64) -> ConfigResult<()> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside 0.0..=1.0"),
                })
            }
        }
        fn positive(field: &'static str, value: u64) -> ConfigResult<()> {
            if value > 0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                })
            }
        }

        unit("quality_threshold", self.quality_threshold)?;
        unit("maker_threshold", self.maker_threshold)?;
        unit("unanimous_bonus", self.unanimous_bonus)?;
        positive("verifier_count", self.verifier_count as u64)?;
        positive("maker_voter_count", self.maker_voter_count as u64)?;
        positive("judge_timeout_ms", self.judge_timeout_ms)?;
        positive("solve_timeout_ms", self.solve_timeout_ms)?;
        positive("target_subtask_count", self.target_subtask_count as u64)?;
        positive("max_depth", self.max_depth as u64)?;
        positive("max_concurrent_leaves", self.max_concurrent_leaves as u64)?;
        if self.default_reputation > MAX_SCORE {
            return Err(ConfigError::Invalid {
                field: "default_reputation",
                reason: format!("{} exceeds {}", self.default_reputation, MAX_SCORE),
            });
        }
        Ok(())
    }
}
