use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

/// Tunables for quote caching, pacing and the upstream provider.
///
/// Every field has a default, so a JSON settings file only needs the keys it
/// wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// TTL of the price-only cache entries (single-symbol price lookups).
    pub price_ttl_secs: u64,

    /// TTL of the metrics-only cache entries.
    pub metrics_ttl_secs: u64,

    /// TTL of full quotes fetched by a single-symbol lookup.
    pub quote_ttl_secs: u64,

    /// TTL of full quotes fetched by a batch. Longer than the single-symbol
    /// TTLs so that dashboard polling does not hit the provider every time.
    pub batch_ttl_secs: u64,

    /// TTL of generated mock quotes. Short so a recovered provider is used again quickly.
    pub mock_ttl_secs: u64,

    /// Pause between two consecutive upstream calls within a batch.
    pub pacing_delay_ms: u64,

    /// Upper bound on a single upstream request.
    pub request_timeout_ms: u64,

    /// Fixed seed for mock quote generation; random when unset.
    pub mock_seed: Option<u64>,

    /// Base URL of the Yahoo Finance quote endpoint.
    pub yahoo_base_url: String,

    /// Page that hands out the session cookie the crumb is bound to.
    pub yahoo_session_url: String,

    /// Endpoint returning the crumb token for the current session.
    pub yahoo_crumb_url: String,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            price_ttl_secs: 15,
            metrics_ttl_secs: 60,
            quote_ttl_secs: 60,
            batch_ttl_secs: 120,
            mock_ttl_secs: 30,
            pacing_delay_ms: 500,
            request_timeout_ms: 10_000,
            mock_seed: None,
            yahoo_base_url: "https://query1.finance.yahoo.com/v7/finance/quote".to_string(),
            yahoo_session_url: "https://fc.yahoo.com".to_string(),
            yahoo_crumb_url: "https://query1.finance.yahoo.com/v1/test/getcrumb".to_string(),
        }
    }
}

impl TrackerSettings {
    /// Parse settings from JSON, filling unspecified keys with defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a JSON file on disk.
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Zero TTLs would make every read a miss and defeat rate-limit protection.
    pub fn validate(&self) -> Result<(), CoreError> {
        let ttls = [
            ("price_ttl_secs", self.price_ttl_secs),
            ("metrics_ttl_secs", self.metrics_ttl_secs),
            ("quote_ttl_secs", self.quote_ttl_secs),
            ("batch_ttl_secs", self.batch_ttl_secs),
            ("mock_ttl_secs", self.mock_ttl_secs),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, v)| *v == 0) {
            return Err(CoreError::Config(format!("{name} must be greater than zero")));
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "request_timeout_ms must be greater than zero".into(),
            ));
        }
        let real_ttl = self.quote_ttl_secs.min(self.batch_ttl_secs);
        if self.mock_ttl_secs >= real_ttl {
            return Err(CoreError::Config(format!(
                "mock_ttl_secs ({}) must be shorter than quote_ttl_secs ({}) and batch_ttl_secs ({})",
                self.mock_ttl_secs, self.quote_ttl_secs, self.batch_ttl_secs
            )));
        }
        Ok(())
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }

    pub fn metrics_ttl(&self) -> Duration {
        Duration::from_secs(self.metrics_ttl_secs)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_ttl_secs)
    }

    pub fn batch_ttl(&self) -> Duration {
        Duration::from_secs(self.batch_ttl_secs)
    }

    pub fn mock_ttl(&self) -> Duration {
        Duration::from_secs(self.mock_ttl_secs)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
