use serde::{Deserialize, Serialize};

/// Root application configuration. Loaded from environment variables
/// with the prefix `MTA__` (e.g. `MTA__CACHE__TTL_SECS=600`).
///
/// Every stage receives the section it needs by reference, so two analyses
/// running side by side with different settings never share state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub confidence: ConfidenceConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Share of rows that must carry a customer id before customer-id
    /// linking is chosen.
    #[serde(default = "default_customer_id_min_coverage")]
    pub customer_id_min_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_half_life_days")]
    pub default_half_life_days: f64,
    #[serde(default = "default_first_touch_weight")]
    pub default_first_touch_weight: f64,
    #[serde(default = "default_last_touch_weight")]
    pub default_last_touch_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    #[serde(default = "default_quality_weight")]
    pub quality_weight: f64,
    #[serde(default = "default_sample_size_weight")]
    pub sample_size_weight: f64,
    #[serde(default = "default_model_fit_weight")]
    pub model_fit_weight: f64,
    #[serde(default = "default_identity_weight")]
    pub identity_weight: f64,
    /// log10 of the row count at which the sample-size factor saturates.
    #[serde(default = "default_sample_size_saturation_log10")]
    pub sample_size_saturation_log10: f64,
    /// Touchpoint count at which a channel's volume factor saturates.
    #[serde(default = "default_channel_volume_saturation")]
    pub channel_volume_saturation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_minimum_data_completeness")]
    pub minimum_data_completeness: f64,
    #[serde(default = "default_minimum_sample_size")]
    pub minimum_sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Unset means the in-process cache is used on its own.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

// Default functions
fn default_node_id() -> String {
    "mta-01".to_string()
}
fn default_customer_id_min_coverage() -> f64 {
    0.8
}
fn default_half_life_days() -> f64 {
    7.0
}
fn default_first_touch_weight() -> f64 {
    0.4
}
fn default_last_touch_weight() -> f64 {
    0.4
}
fn default_quality_weight() -> f64 {
    0.4
}
fn default_sample_size_weight() -> f64 {
    0.3
}
fn default_model_fit_weight() -> f64 {
    0.2
}
fn default_identity_weight() -> f64 {
    0.1
}
fn default_sample_size_saturation_log10() -> f64 {
    3.0
}
fn default_channel_volume_saturation() -> f64 {
    100.0
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_minimum_data_completeness() -> f64 {
    0.8
}
fn default_minimum_sample_size() -> usize {
    100
}
fn default_cache_enabled() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_max_entries() -> usize {
    10_000
}
fn default_connect_timeout_ms() -> u64 {
    2000
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            customer_id_min_coverage: default_customer_id_min_coverage(),
        }
    }
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            default_half_life_days: default_half_life_days(),
            default_first_touch_weight: default_first_touch_weight(),
            default_last_touch_weight: default_last_touch_weight(),
        }
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            quality_weight: default_quality_weight(),
            sample_size_weight: default_sample_size_weight(),
            model_fit_weight: default_model_fit_weight(),
            identity_weight: default_identity_weight(),
            sample_size_saturation_log10: default_sample_size_saturation_log10(),
            channel_volume_saturation: default_channel_volume_saturation(),
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            minimum_data_completeness: default_minimum_data_completeness(),
            minimum_sample_size: default_minimum_sample_size(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            identity: IdentityConfig::default(),
            attribution: AttributionConfig::default(),
            confidence: ConfidenceConfig::default(),
            insights: InsightsConfig::default(),
            cache: CacheConfig::default(),
            redis: RedisConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("MTA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load an optional TOML file first, then let environment variables
    /// override it.
    pub fn load_with_file(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MTA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.identity.customer_id_min_coverage, 0.8);
        assert_eq!(config.attribution.default_half_life_days, 7.0);
        assert_eq!(config.attribution.default_first_touch_weight, 0.4);
        assert_eq!(config.attribution.default_last_touch_weight, 0.4);

        let c = &config.confidence;
        let total = c.quality_weight + c.sample_size_weight + c.model_fit_weight + c.identity_weight;
        assert!((total - 1.0).abs() < 1e-9);
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"cache": {"ttl_secs": 60}}"#).unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 10_000);
        assert!(config.cache.enabled);
        assert_eq!(config.node_id, "mta-01");
    }
}
