//! Engine configuration, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::compiler::ScriptFormat;
use crate::core::quotes::QuoteTiming;
use crate::core::timing::TimingPolicy;
use crate::schema::sport::Tier;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one engine instance. Every field has a default, so a RON
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingPolicy,
    /// Kickboxing inserts a surprise round after this many anchor sections.
    pub surprise_every_anchors: usize,
    /// Leading Calisthenics sections limited to `opening_max_tier`.
    pub calisthenics_opening_sections: usize,
    pub opening_max_tier: Tier,
    pub quote_timing: QuoteTiming,
    /// Opening and closing lines and round headers. Off by default.
    pub script: ScriptFormat,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingPolicy::default(),
            surprise_every_anchors: 2,
            calisthenics_opening_sections: 2,
            opening_max_tier: Tier::Intermediate,
            quote_timing: QuoteTiming::Excluded,
            script: ScriptFormat::default(),
            seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;
        if !(timing.target.is_finite() && timing.target > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "target must be positive, got {}",
                timing.target
            )));
        }
        if timing.perfect_band < 0.0 || timing.tolerance < timing.perfect_band {
            return Err(ConfigError::Invalid(format!(
                "need 0 <= perfect_band ({}) <= tolerance ({})",
                timing.perfect_band, timing.tolerance
            )));
        }
        if self.surprise_every_anchors == 0 {
            return Err(ConfigError::Invalid(
                "surprise_every_anchors must be at least 1".to_string(),
            ));
        }
        if let QuoteTiming::PerQuote { minutes } = self.quote_timing {
            if minutes < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "quote minutes must not be negative, got {minutes}"
                )));
            }
        }
        if let Some(rounds) = &self.script.rounds {
            if rounds.label.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "round label must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
