//! Runtime configuration for the orchestration pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// Deploy mode; detailed downstream error text is only surfaced to users
/// outside production.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    #[default]
    Production,
    Development,
}

/// Tunables for one orchestrator instance. Every field has a sensible
/// default, so embedders can deserialize a partial TOML table or just use
/// `ChatConfig::default()`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub deploy_mode: DeployMode,
    /// Cap on devices fetched per tenant for aggregation.
    pub device_limit: usize,
    /// Budget for the best-effort secondary intent pass.
    pub secondary_intent_timeout_secs: u64,
    /// Budget for best-effort vector-store calls (save and search).
    pub enrichment_timeout_secs: u64,
    /// Budget for the monthly comparison call, the most expensive path.
    pub comparison_timeout_secs: u64,
    /// Result cap for the retrieval-augmentation search.
    pub enrichment_limit: usize,
    /// Similarity score threshold for retrieval-augmentation hits.
    pub enrichment_score_threshold: f64,
    /// Character budget for the appended related-analyses section.
    pub enrichment_char_budget: usize,
    /// Character budget for detailed error text in non-production mode.
    pub error_detail_budget: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            deploy_mode: DeployMode::Production,
            device_limit: 500,
            secondary_intent_timeout_secs: 2,
            enrichment_timeout_secs: 4,
            comparison_timeout_secs: 25,
            enrichment_limit: 3,
            enrichment_score_threshold: 0.5,
            enrichment_char_budget: 1200,
            error_detail_budget: 240,
        }
    }
}

impl ChatConfig {
    /// Parses a configuration from a TOML document; missing keys fall
    /// back to defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn secondary_intent_timeout(&self) -> Duration {
        Duration::from_secs(self.secondary_intent_timeout_secs)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    pub fn comparison_timeout(&self) -> Duration {
        Duration::from_secs(self.comparison_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_production_safe() {
        let config = ChatConfig::default();
        assert_eq!(config.deploy_mode, DeployMode::Production);
        assert_eq!(config.enrichment_timeout(), Duration::from_secs(4));
        assert_eq!(config.comparison_timeout(), Duration::from_secs(25));
        assert_eq!(config.enrichment_char_budget, 1200);
    }

    #[test]
    fn partial_toml_fills_missing_keys() {
        let config = ChatConfig::from_toml_str(
            "deploy_mode = \"development\"\nenrichment_limit = 5\n",
        )
        .unwrap();
        assert_eq!(config.deploy_mode, DeployMode::Development);
        assert_eq!(config.enrichment_limit, 5);
        assert_eq!(config.device_limit, 500);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        assert!(ChatConfig::from_toml_str("deploy_mode = 7").is_err());
    }
}
