//! # Config
//!
//! This module contains the `Config` struct, which holds all the
//! configuration params for the verdict engine. Every section and every
//! field is optional in the TOML file; missing values take the defaults
//! below. A loaded config is always passed through [`Config::validate`]
//! before use, so the engine never runs with weights that do not sum to
//! one or with a dispute window longer than the expiry deadline.

use std::{fs::File, io::Read, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use veridict_data_structures::{drops::Drops, types::ScoringWeights};

/// Errors while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("could not read configuration file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The signal weights do not form a convex combination
    #[error(
        "scoring weights must be non-negative and sum to 1.0 \
         (analysis {analysis}, stake {stake}, witness {witness})"
    )]
    InvalidWeights {
        /// Configured analysis weight
        analysis: f64,
        /// Configured stake weight
        stake: f64,
        /// Configured witness weight
        witness: f64,
    },
    /// The confidence threshold is outside [0, 1]
    #[error("confidence threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
    /// The expiry deadline does not leave room for the dispute window
    #[error("expiry deadline ({deadline}s) must not precede the minimum dispute window ({window}s)")]
    DeadlineBeforeWindow {
        /// Configured expiry deadline in seconds
        deadline: u64,
        /// Configured minimum dispute window in seconds
        window: u64,
    },
    /// A target used for confidence normalization is zero
    #[error("confidence targets must be greater than zero")]
    ZeroConfidenceTarget,
}

/// The total configuration object that contains all other, more specific,
/// configuration objects (scoring, resolution, settlement).
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// Veracity scoring configuration
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Resolution gating configuration
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Settlement retry configuration
    #[serde(default)]
    pub settlement: SettlementConfig,
}

/// Scoring-specific configuration: the signal weights and the evidence
/// targets against which confidence is normalized.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoringConfig {
    /// Relative weights of the three veracity signals
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Total staked volume at which the stake half of confidence saturates
    #[serde(default = "default_volume_target")]
    pub volume_target: Drops,

    /// Witness count at which the testimony half of confidence saturates
    #[serde(default = "default_witness_target")]
    pub witness_target: u32,
}

fn default_volume_target() -> Drops {
    // 10 units of staked value
    Drops::from_units(10)
}

fn default_witness_target() -> u32 {
    5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: ScoringWeights::default(),
            volume_target: default_volume_target(),
            witness_target: default_witness_target(),
        }
    }
}

/// Resolution-specific configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ResolutionConfig {
    /// Minimum confidence for a verdict to be reached
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Seconds an item must stay disputable before it can resolve, so a
    /// single large stake cannot force a snap verdict
    #[serde(default = "default_min_dispute_window_secs")]
    pub min_dispute_window_secs: u64,

    /// Seconds after which an unresolved item expires and refunds
    #[serde(default = "default_expiry_deadline_secs")]
    pub expiry_deadline_secs: u64,

    /// Base reputation delta applied at settlement, before the regression
    /// scaling of the reputation ledger
    #[serde(default = "default_reputation_base_delta")]
    pub reputation_base_delta: u8,
}

fn default_confidence_threshold() -> f64 {
    0.75
}

fn default_min_dispute_window_secs() -> u64 {
    // 24 hours
    86_400
}

fn default_expiry_deadline_secs() -> u64 {
    // 7 days
    604_800
}

fn default_reputation_base_delta() -> u8 {
    5
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            confidence_threshold: default_confidence_threshold(),
            min_dispute_window_secs: default_min_dispute_window_secs(),
            expiry_deadline_secs: default_expiry_deadline_secs(),
            reputation_base_delta: default_reputation_base_delta(),
        }
    }
}

/// Settlement-specific configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SettlementConfig {
    /// How many times a retryable gateway failure is retried before the
    /// item is surfaced as settlement-pending
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff between retries, in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for SettlementConfig {
    fn default() -> Self {
        SettlementConfig {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl Config {
    /// Parse a configuration from a TOML string and validate it.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut contents = String::new();
        File::open(path.as_ref())?.read_to_string(&mut contents)?;
        debug!("loaded configuration from {}", path.as_ref().display());

        Self::from_str(&contents)
    }

    /// Check the cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = self.scoring.weights;
        if !weights.is_valid() {
            return Err(ConfigError::InvalidWeights {
                analysis: weights.analysis_weight,
                stake: weights.stake_weight,
                witness: weights.witness_weight,
            });
        }

        let threshold = self.resolution.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        if self.resolution.expiry_deadline_secs < self.resolution.min_dispute_window_secs {
            return Err(ConfigError::DeadlineBeforeWindow {
                deadline: self.resolution.expiry_deadline_secs,
                window: self.resolution.min_dispute_window_secs,
            });
        }

        if self.scoring.volume_target == Drops::zero() || self.scoring.witness_target == 0 {
            return Err(ConfigError::ZeroConfidenceTarget);
        }

        Ok(())
    }
}
