//! Assistant configuration
//!
//! Defaults mirror the demo UI. A JSON file may override any field and a few
//! environment variables (loaded through `.env` by the binary) are applied last.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const ENV_FAST: &str = "WATER_SQL_FAST";
pub const ENV_HISTORY_CAPACITY: &str = "WATER_SQL_HISTORY_CAPACITY";
pub const ENV_MOCK_SEED: &str = "WATER_SQL_MOCK_SEED";

/// Cosmetic delays between the visible steps of a turn, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub analyze_ms: u64,
    pub schema_ms: u64,
    pub generate_ms: u64,
    pub before_stream_ms: u64,
    pub per_line_ms: u64,
}

impl PacingConfig {
    /// No delays at all; used by tests and `--fast`
    pub fn instant() -> Self {
        Self {
            analyze_ms: 0,
            schema_ms: 0,
            generate_ms: 0,
            before_stream_ms: 0,
            per_line_ms: 0,
        }
    }

    pub fn step_delays(&self) -> [Duration; 3] {
        [
            Duration::from_millis(self.analyze_ms),
            Duration::from_millis(self.schema_ms),
            Duration::from_millis(self.generate_ms),
        ]
    }

    pub fn before_stream(&self) -> Duration {
        Duration::from_millis(self.before_stream_ms)
    }

    pub fn per_line(&self) -> Duration {
        Duration::from_millis(self.per_line_ms)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            analyze_ms: 500,
            schema_ms: 700,
            generate_ms: 800,
            before_stream_ms: 300,
            per_line_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub pacing: PacingConfig,

    /// How many resolved turns the conversation context remembers
    pub history_capacity: usize,

    pub recent_search_capacity: usize,

    /// Executions kept in the result panel history
    pub result_history_capacity: usize,

    pub page_size: usize,

    /// Fixed seed for mock data; random when absent
    pub mock_seed: Option<u64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            pacing: PacingConfig::default(),
            history_capacity: 5,
            recent_search_capacity: 5,
            result_history_capacity: 10,
            page_size: 20,
            mock_seed: None,
        }
    }
}

impl AssistantConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AssistantError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            AssistantError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(fast) = lookup(ENV_FAST) {
            if matches!(fast.trim(), "1" | "true" | "yes") {
                self.pacing = PacingConfig::instant();
            }
        }

        if let Some(raw) = lookup(ENV_HISTORY_CAPACITY) {
            match raw.trim().parse::<usize>() {
                Ok(cap) if cap > 0 => self.history_capacity = cap,
                _ => warn!("Ignoring invalid {}={}", ENV_HISTORY_CAPACITY, raw),
            }
        }

        if let Some(raw) = lookup(ENV_MOCK_SEED) {
            match raw.trim().parse::<u64>() {
                Ok(seed) => self.mock_seed = Some(seed),
                Err(_) => warn!("Ignoring invalid {}={}", ENV_MOCK_SEED, raw),
            }
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(AssistantError::Config(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(AssistantError::Config(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_demo() {
        let config = AssistantConfig::default();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.result_history_capacity, 10);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pacing.analyze_ms, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_FAST, "1"),
            (ENV_HISTORY_CAPACITY, "3"),
            (ENV_MOCK_SEED, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = AssistantConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.pacing, PacingConfig::instant());
        assert_eq!(config.history_capacity, 3);
        assert_eq!(config.mock_seed, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AssistantConfig =
            serde_json::from_str(r#"{"page_size": 50, "pacing": {"per_line_ms": 0}}"#).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.pacing.per_line_ms, 0);
        assert_eq!(config.pacing.schema_ms, 700);
        assert_eq!(config.history_capacity, 5);
    }

    #[test]
    fn test_zero_history_capacity_rejected() {
        let config = AssistantConfig {
            history_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AssistantError::Config(_))));
    }
}
