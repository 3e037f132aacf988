// 6.0 config.rs: all settings in one place. staleness, confidence floor,
// margin rates, event retention.

use crate::margin::MarginParams;
use serde::{Deserialize, Serialize};

/// Oracle read-gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum price age before gated reads fail with `StalePrice`.
    /// Default 24h: card prices move on a daily cadence.
    pub max_staleness_seconds: i64,
    /// Minimum confidence score for gated reads. 0 disables the floor.
    pub min_confidence: u8,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_staleness_seconds: 86_400,
            min_confidence: 50,
        }
    }
}

/// Complete configuration for the settlement core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub oracle: OracleConfig,
    pub margin: MarginParams,
    /// Maximum number of audit events retained in memory.
    pub max_events: usize,
    /// Print each audit event as it is emitted.
    pub verbose: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            oracle: OracleConfig::default(),
            margin: MarginParams::default(),
            max_events: 100_000,
            verbose: false,
        }
    }
}
