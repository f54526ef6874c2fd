use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SALES_INSIGHT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dataset_path: Option<String>,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Row cap for the campaign ROI ranking.
    #[serde(default = "default_campaign_limit")]
    pub campaign_limit: usize,
    /// Row cap for the audience performance table.
    #[serde(default = "default_audience_limit")]
    pub audience_limit: usize,
    /// How many campaigns the ROI leaderboard shows.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// How many entries the "top 3" KPI strips show.
    #[serde(default = "default_podium_size")]
    pub podium_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    /// Campaigns with an ROI strictly below this ratio are flagged.
    #[serde(default = "default_roi_threshold")]
    pub roi_threshold: f64,
    #[serde(default = "default_max_avg_discount_pct")]
    pub max_avg_discount_pct: f64,
    #[serde(default = "default_max_avg_duration_days")]
    pub max_avg_duration_days: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default functions
fn default_campaign_limit() -> usize {
    50
}
fn default_audience_limit() -> usize {
    15
}
fn default_top_n() -> usize {
    10
}
fn default_podium_size() -> usize {
    3
}
fn default_cache_enabled() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    600
}
fn default_max_entries() -> usize {
    10_000
}
fn default_roi_threshold() -> f64 {
    1.0
}
fn default_max_avg_discount_pct() -> f64 {
    35.0
}
fn default_max_avg_duration_days() -> f64 {
    20.0
}
fn default_log_filter() -> String {
    "sales_insight=info,insight_query=info,insight_reporting=info".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            campaign_limit: default_campaign_limit(),
            audience_limit: default_audience_limit(),
            top_n: default_top_n(),
            podium_size: default_podium_size(),
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

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            roi_threshold: default_roi_threshold(),
            max_avg_discount_pct: default_max_avg_discount_pct(),
            max_avg_duration_days: default_max_avg_duration_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset_path: None,
            query: QueryConfig::default(),
            cache: CacheConfig::default(),
            alerts: AlertConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SALES_INSIGHT")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.query.campaign_limit, 50);
        assert_eq!(config.query.audience_limit, 15);
        assert!((config.alerts.roi_threshold - 1.0).abs() < f64::EPSILON);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"query": {"top_n": 5}, "cache": {"enabled": false}}"#)
                .unwrap();
        assert_eq!(config.query.top_n, 5);
        assert_eq!(config.query.campaign_limit, 50);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 600);
    }
}
