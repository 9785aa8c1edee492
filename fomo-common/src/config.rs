//! Configuration management for the FOMO scanner.
//!
//! The scanner reads a single JSON file at `~/.fomo-scanner/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (FOMO_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FOMO_LOG_LEVEL` → observability.log_level
//! - `FOMO_LOG_FORMAT` → observability.log_format
//! - `COINGECKO_API_KEY` → coingecko.api_key
//! - `FOMO_REFRESH_INTERVAL_SECS` → scanner.refresh_interval_secs
//! - `FOMO_SCORING_STRATEGY` → scanner.scoring.strategy

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".fomo-scanner"),
        |dirs| dirs.home_dir().join(".fomo-scanner"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Upstream market data API
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,

    /// Discovery pipeline settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// HTTP read surface
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults when the file
    /// is missing.
    ///
    /// Runs before logging is up, so nothing here logs.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Returns the variables that were set but could not be parsed.
    pub fn apply_env_overrides(&mut self) -> Vec<&'static str> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();

        if let Some(level) = lookup("FOMO_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("FOMO_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(key) = lookup("COINGECKO_API_KEY") {
            if !key.trim().is_empty() {
                self.coingecko.api_key = Some(key);
            }
        }
        if let Some(secs) = lookup("FOMO_REFRESH_INTERVAL_SECS") {
            match secs.parse() {
                Ok(s) => self.scanner.refresh_interval_secs = s,
                Err(_) => ignored.push("FOMO_REFRESH_INTERVAL_SECS"),
            }
        }
        if let Some(strategy) = lookup("FOMO_SCORING_STRATEGY") {
            match strategy.parse() {
                Ok(s) => self.scanner.scoring.strategy = s,
                Err(_) => ignored.push("FOMO_SCORING_STRATEGY"),
            }
        }

        ignored
    }

    /// Validate every section that has hard constraints.
    pub fn validate(&self) -> crate::Result<()> {
        self.scanner.validate()
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// CoinGecko
// ============================================================================

/// CoinGecko API settings.
///
/// When `api_key` is set the pro endpoint is used, otherwise the public one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinGeckoConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Override for the API base URL (tests, proxies)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,

    /// Whole-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            rate_limit_rpm: default_rate_limit_rpm(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_rate_limit_rpm() -> u32 {
    500
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

// ============================================================================
// HTTP Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

// ============================================================================
// Scanner
// ============================================================================

/// Discovery pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Seconds between background refreshes
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Seconds to wait after a failed refresh
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Delay before the first refresh after startup
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Upper bound on one whole refresh cycle
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            filter: FilterConfig::default(),
            batch: BatchConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    180
}

fn default_error_backoff_secs() -> u64 {
    60
}

fn default_initial_delay_secs() -> u64 {
    7
}

fn default_cycle_timeout_secs() -> u64 {
    600
}

impl ScannerConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(Error::Config("refresh_interval_secs must be > 0".into()));
        }
        if self.cycle_timeout_secs == 0 {
            return Err(Error::Config("cycle_timeout_secs must be > 0".into()));
        }
        if self.batch.call_timeout_secs == 0 {
            return Err(Error::Config("call_timeout_secs must be > 0".into()));
        }
        if self.filter.page_count == 0 || self.filter.per_page == 0 {
            return Err(Error::Config("page_count and per_page must be > 0".into()));
        }
        if self.batch.max_concurrency == 0 {
            return Err(Error::Config("max_concurrency must be > 0".into()));
        }
        if self.batch.max_results == 0 {
            return Err(Error::Config("max_results must be > 0".into()));
        }

        let scoring = &self.scoring;
        let weight_sum = scoring.blend.reactive + scoring.blend.predictive;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "blend weights must sum to 1.0, got {weight_sum}"
            )));
        }
        if scoring.day_weights.len() != 7 {
            return Err(Error::Config(format!(
                "day_weights needs 7 entries, got {}",
                scoring.day_weights.len()
            )));
        }
        if scoring.month_weights.len() != 12 {
            return Err(Error::Config(format!(
                "month_weights needs 12 entries, got {}",
                scoring.month_weights.len()
            )));
        }
        if let Some(p) = scoring.patterns.iter().find(|p| !(0.0..=1.0).contains(&p.win_rate)) {
            return Err(Error::Config(format!(
                "pattern '{}' has win_rate outside [0, 1]",
                p.name
            )));
        }
        Ok(())
    }
}

/// Candidate filter thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Number of market pages fetched per run
    #[serde(default = "default_page_count")]
    pub page_count: u32,

    /// The N largest assets by market cap are never candidates
    #[serde(default = "default_top_n_exclude")]
    pub top_n_exclude: usize,

    /// Lowercase symbols that are never candidates
    #[serde(default = "default_stablecoins")]
    pub stablecoins: Vec<String>,

    #[serde(default = "default_cap_max")]
    pub cap_max: f64,

    #[serde(default = "default_vol_min")]
    pub vol_min: f64,

    /// Maximum absolute 24h change; larger moves already exploded
    #[serde(default = "default_pump_cap")]
    pub pump_cap: f64,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            page_count: default_page_count(),
            top_n_exclude: default_top_n_exclude(),
            stablecoins: default_stablecoins(),
            cap_max: default_cap_max(),
            vol_min: default_vol_min(),
            pump_cap: default_pump_cap(),
            top_k: default_top_k(),
        }
    }
}

fn default_per_page() -> u32 {
    250
}

fn default_page_count() -> u32 {
    14
}

fn default_top_n_exclude() -> usize {
    15
}

fn default_stablecoins() -> Vec<String> {
    [
        "usdt", "usdc", "dai", "tusd", "usdp", "gusd", "alusd", "eurt", "busd", "usdd", "fdusd",
        "usdn", "mim", "usde", "frax", "sai", "lusd", "susd", "hbusd", "vai", "eurc", "ageur",
        "eurs", "musd", "cusd", "xaut", "xusd", "paxg", "bitusd", "usdx", "usds", "usdsb",
        "celo", "fei", "usdk", "ousd", "usdq", "husd", "bai", "xsgd", "usdtez", "usd+", "usyc",
        "usdl", "pusd",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn default_cap_max() -> f64 {
    50_000_000.0
}

fn default_vol_min() -> f64 {
    50_000.0
}

fn default_pump_cap() -> f64 {
    100.0
}

fn default_top_k() -> usize {
    300
}

/// Batch scoring limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Opportunities scoring below this are not cached
    #[serde(default = "default_min_keep_score")]
    pub min_keep_score: u8,

    /// Largest generation published to the cache
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Per-call timeout around every provider request made while scoring
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_keep_score: default_min_keep_score(),
            max_results: default_max_results(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_max_concurrency() -> usize {
    25
}

fn default_min_keep_score() -> u8 {
    30
}

fn default_max_results() -> usize {
    100
}

fn default_call_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Scoring
// ============================================================================

/// Which scoring stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    /// Volume, price, trend, and distribution only
    Reactive,
    /// Reactive plus research-weighted adjustments
    Enhanced,
    /// Enhanced blended with the predictive overlay
    PredictiveBlend,
    /// Enhanced plus the probability profile
    #[default]
    Probability,
    /// Every stage and overlay
    Full,
}

impl ScoringStrategy {
    pub fn research_enabled(self) -> bool {
        !matches!(self, Self::Reactive)
    }

    pub fn predictive_enabled(self) -> bool {
        matches!(self, Self::PredictiveBlend | Self::Full)
    }

    pub fn probability_enabled(self) -> bool {
        matches!(self, Self::Probability | Self::Full)
    }
}

impl fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reactive => write!(f, "reactive"),
            Self::Enhanced => write!(f, "enhanced"),
            Self::PredictiveBlend => write!(f, "predictive_blend"),
            Self::Probability => write!(f, "probability"),
            Self::Full => write!(f, "full"),
        }
    }
}

impl FromStr for ScoringStrategy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reactive" => Ok(Self::Reactive),
            "enhanced" => Ok(Self::Enhanced),
            "predictive_blend" | "predictive" => Ok(Self::PredictiveBlend),
            "probability" => Ok(Self::Probability),
            "full" => Ok(Self::Full),
            other => Err(Error::InvalidInput(format!("unknown scoring strategy: {other}"))),
        }
    }
}

/// Reactive/predictive blend weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendWeights {
    #[serde(default = "default_reactive_weight")]
    pub reactive: f64,
    #[serde(default = "default_predictive_weight")]
    pub predictive: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            reactive: default_reactive_weight(),
            predictive: default_predictive_weight(),
        }
    }
}

fn default_reactive_weight() -> f64 {
    0.4
}

fn default_predictive_weight() -> f64 {
    0.6
}

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Scoring tables and toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub strategy: ScoringStrategy,

    #[serde(default)]
    pub blend: BlendWeights,

    /// Monday first
    #[serde(default = "default_day_weights")]
    pub day_weights: Vec<f64>,

    /// January first
    #[serde(default = "default_month_weights")]
    pub month_weights: Vec<f64>,

    /// Months (1-12) treated as earnings season
    #[serde(default = "default_earnings_months")]
    pub earnings_months: Vec<u32>,

    #[serde(default = "default_earnings_multiplier")]
    pub earnings_multiplier: f64,

    /// Volume spike range rewarded by the research stage
    #[serde(default = "default_volume_sweet_spot")]
    pub volume_sweet_spot: Bounds,

    /// Market cap range rewarded by the research stage
    #[serde(default = "default_market_cap_sweet_spot")]
    pub market_cap_sweet_spot: Bounds,

    /// Market caps above this are penalised
    #[serde(default = "default_mega_cap_threshold")]
    pub mega_cap_threshold: f64,

    /// Query the trending endpoint for the sentiment bonus
    #[serde(default = "default_true")]
    pub sentiment_enabled: bool,

    /// How long fetched history and tickers are reused
    #[serde(default = "default_history_cache_ttl_secs")]
    pub history_cache_ttl_secs: u64,

    #[serde(default = "default_patterns")]
    pub patterns: Vec<HistoricalPattern>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            strategy: ScoringStrategy::default(),
            blend: BlendWeights::default(),
            day_weights: default_day_weights(),
            month_weights: default_month_weights(),
            earnings_months: default_earnings_months(),
            earnings_multiplier: default_earnings_multiplier(),
            volume_sweet_spot: default_volume_sweet_spot(),
            market_cap_sweet_spot: default_market_cap_sweet_spot(),
            mega_cap_threshold: default_mega_cap_threshold(),
            sentiment_enabled: true,
            history_cache_ttl_secs: default_history_cache_ttl_secs(),
            patterns: default_patterns(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_day_weights() -> Vec<f64> {
    vec![1.0, 1.15, 1.0, 1.0, 1.15, 0.95, 0.95]
}

fn default_month_weights() -> Vec<f64> {
    vec![1.0, 1.0, 1.0, 1.2, 1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 1.2, 1.0]
}

fn default_earnings_months() -> Vec<u32> {
    vec![1, 4, 7, 10]
}

fn default_earnings_multiplier() -> f64 {
    1.1
}

fn default_volume_sweet_spot() -> Bounds {
    Bounds::new(5.0, 10.0)
}

fn default_market_cap_sweet_spot() -> Bounds {
    Bounds::new(1_000_000_000.0, 50_000_000_000.0)
}

fn default_mega_cap_threshold() -> f64 {
    100_000_000_000.0
}

fn default_history_cache_ttl_secs() -> u64 {
    300
}

/// A named historical outcome pattern used by the probability overlay.
///
/// Every `Option` bound left unset matches anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoricalPattern {
    pub name: String,

    #[serde(default)]
    pub min_score: Option<u8>,
    #[serde(default)]
    pub max_score: Option<u8>,
    #[serde(default)]
    pub min_spike: Option<f64>,
    #[serde(default)]
    pub max_market_cap: Option<f64>,
    #[serde(default)]
    pub min_abs_change_24h: Option<f64>,
    #[serde(default)]
    pub max_abs_change_24h: Option<f64>,
    /// Case-sensitive substring of the signal label
    #[serde(default)]
    pub label_contains: Option<String>,

    pub win_rate: f64,
    /// Average gain on winners, percent
    pub avg_gain: f64,
    /// Average loss on losers, percent
    pub avg_loss: f64,
    pub sample_size: u32,
    pub horizon_hours: u32,
}

fn default_patterns() -> Vec<HistoricalPattern> {
    let base = HistoricalPattern {
        name: String::new(),
        min_score: None,
        max_score: None,
        min_spike: None,
        max_market_cap: None,
        min_abs_change_24h: None,
        max_abs_change_24h: None,
        label_contains: None,
        win_rate: 0.5,
        avg_gain: 0.0,
        avg_loss: 0.0,
        sample_size: 0,
        horizon_hours: 24,
    };

    vec![
        HistoricalPattern {
            name: "stealth_accumulation".into(),
            min_score: Some(80),
            min_spike: Some(3.0),
            max_abs_change_24h: Some(5.0),
            win_rate: 0.78,
            avg_gain: 22.0,
            avg_loss: 8.0,
            sample_size: 140,
            horizon_hours: 72,
            ..base.clone()
        },
        HistoricalPattern {
            name: "volume_breakout".into(),
            min_score: Some(60),
            min_spike: Some(5.0),
            win_rate: 0.68,
            avg_gain: 18.0,
            avg_loss: 9.0,
            sample_size: 210,
            horizon_hours: 48,
            ..base.clone()
        },
        HistoricalPattern {
            name: "early_momentum".into(),
            min_score: Some(70),
            max_score: Some(89),
            min_abs_change_24h: Some(5.0),
            max_abs_change_24h: Some(15.0),
            win_rate: 0.62,
            avg_gain: 15.0,
            avg_loss: 8.0,
            sample_size: 180,
            horizon_hours: 24,
            ..base.clone()
        },
        HistoricalPattern {
            name: "micro_cap_spike".into(),
            min_spike: Some(2.5),
            max_market_cap: Some(50_000_000.0),
            win_rate: 0.55,
            avg_gain: 35.0,
            avg_loss: 15.0,
            sample_size: 95,
            horizon_hours: 48,
            ..base.clone()
        },
        HistoricalPattern {
            name: "accelerating_breakout".into(),
            label_contains: Some("Accelerating".into()),
            win_rate: 0.71,
            avg_gain: 20.0,
            avg_loss: 8.0,
            sample_size: 60,
            horizon_hours: 48,
            ..base.clone()
        },
        HistoricalPattern {
            name: "late_chase".into(),
            label_contains: Some("Pumping".into()),
            win_rate: 0.38,
            avg_gain: 10.0,
            avg_loss: 14.0,
            sample_size: 160,
            horizon_hours: 24,
            ..base.clone()
        },
        HistoricalPattern {
            name: "low_activity".into(),
            max_score: Some(35),
            win_rate: 0.35,
            avg_gain: 6.0,
            avg_loss: 7.0,
            sample_size: 300,
            horizon_hours: 72,
            ..base
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.coingecko.rate_limit_rpm, 500);
        assert_eq!(config.scanner.refresh_interval_secs, 180);
        assert_eq!(config.scanner.filter.top_n_exclude, 15);
        assert_eq!(config.scanner.scoring.strategy, ScoringStrategy::Probability);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "scanner": { "refresh_interval_secs": 60, "filter": { "top_k": 50 } } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.scanner.refresh_interval_secs, 60);
        assert_eq!(config.scanner.filter.top_k, 50);
        assert_eq!(config.scanner.filter.per_page, 250);
        assert_eq!(config.scanner.scoring.day_weights.len(), 7);
        assert!(!config.scanner.filter.stablecoins.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "observability": { "level": "debug" }, "scanner": { "scoring": { "strategy": "full" } } }"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.scanner.scoring.strategy, ScoringStrategy::Full);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FOMO_LOG_LEVEL", "trace"),
            ("COINGECKO_API_KEY", "cg-123"),
            ("FOMO_REFRESH_INTERVAL_SECS", "90"),
            ("FOMO_SCORING_STRATEGY", "predictive"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        let ignored = config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert!(ignored.is_empty());
        assert_eq!(config.observability.log_level, "trace");
        assert_eq!(config.coingecko.api_key.as_deref(), Some("cg-123"));
        assert_eq!(config.scanner.refresh_interval_secs, 90);
        assert_eq!(config.scanner.scoring.strategy, ScoringStrategy::PredictiveBlend);
    }

    #[test]
    fn test_invalid_env_override_is_ignored() {
        let mut config = Config::default();
        let ignored = config.apply_overrides_from(|k| match k {
            "FOMO_REFRESH_INTERVAL_SECS" => Some("soon".to_string()),
            "FOMO_SCORING_STRATEGY" => Some("yolo".to_string()),
            _ => None,
        });

        assert_eq!(config.scanner.refresh_interval_secs, 180);
        assert_eq!(config.scanner.scoring.strategy, ScoringStrategy::Probability);
        assert_eq!(ignored, vec!["FOMO_REFRESH_INTERVAL_SECS", "FOMO_SCORING_STRATEGY"]);
    }

    #[test]
    fn test_validate_rejects_bad_blend() {
        let mut config = ScannerConfig::default();
        config.scoring.blend.predictive = 0.9;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_short_tables() {
        let mut config = ScannerConfig::default();
        config.scoring.month_weights.pop();
        assert!(config.validate().is_err());

        let mut config = ScannerConfig::default();
        config.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = ScannerConfig::default();
        config.cycle_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(m)) if m.contains("cycle_timeout_secs")));

        let mut config = ScannerConfig::default();
        config.batch.call_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(m)) if m.contains("call_timeout_secs")));

        assert!(ScannerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_strategy_flags() {
        assert!(!ScoringStrategy::Reactive.research_enabled());
        assert!(ScoringStrategy::Enhanced.research_enabled());
        assert!(ScoringStrategy::PredictiveBlend.predictive_enabled());
        assert!(!ScoringStrategy::PredictiveBlend.probability_enabled());
        assert!(ScoringStrategy::Full.predictive_enabled());
        assert!(ScoringStrategy::Full.probability_enabled());
        assert!("bogus".parse::<ScoringStrategy>().is_err());
        assert_eq!(ScoringStrategy::PredictiveBlend.to_string(), "predictive_blend");
    }

    #[test]
    fn test_bounds_inclusive() {
        let b = Bounds::new(5.0, 10.0);
        assert!(b.contains(5.0));
        assert!(b.contains(10.0));
        assert!(!b.contains(10.01));
    }
}
