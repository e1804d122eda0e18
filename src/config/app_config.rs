//! Application configuration - data source, LLM endpoints and scoring knobs
//!
//! Every struct implements `Default` with the values in [`super::defaults`],
//! so a missing file or a partial file both produce a complete config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$DISTRICT_INTEL_CONFIG` env var
/// 2. `./district_intel.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Postgres connection settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Chat-completions endpoint and model selection
    #[serde(default)]
    pub llm: LlmConfig,

    /// P-Score weights and scorer heuristics
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Alert scan threshold
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Chatbot façade behaviour
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Load configuration using the standard search order, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = Self::discover();
        config.apply_env_overrides();
        config.warn_suspicious();
        config
    }

    /// Log values that are legal but probably unintended.
    pub fn warn_suspicious(&self) {
        for w in super::validation::suspicious_values(self) {
            warn!("{}", w);
        }
    }

    fn discover() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check working directory
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Apply `DATABASE_URL` and `P_SCORE_WEIGHT_{HVI,ISS,RCS}` from the process
    /// environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }

        let weights = &mut self.scoring.weights;
        for (name, slot) in [
            ("P_SCORE_WEIGHT_HVI", &mut weights.hvi),
            ("P_SCORE_WEIGHT_ISS", &mut weights.iss),
            ("P_SCORE_WEIGHT_RCS", &mut weights.rcs),
        ] {
            if let Some(raw) = lookup(name) {
                match raw.trim().parse::<f64>() {
                    Ok(v) => *slot = v,
                    Err(_) => warn!(var = name, value = %raw, "Ignoring non-numeric weight override"),
                }
            }
        }
    }

    /// Validate internal consistency.
    ///
    /// Rules:
    /// - P-Score weights must be finite, non-negative and sum to > 0
    /// - Heuristic multipliers must be >= 1.0, triggers and ratios in range
    /// - Timeouts and pool size must be > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let w = &self.scoring.weights;
        for (name, value) in [("hvi", w.hvi), ("iss", w.iss), ("rcs", w.rcs)] {
            if !value.is_finite() {
                errors.push(format!("scoring.weights.{name} must be finite (got {value})"));
            } else if value < 0.0 {
                errors.push(format!("scoring.weights.{name} must be >= 0 (got {value})"));
            }
        }
        let sum = w.hvi + w.iss + w.rcs;
        if sum.is_finite() && sum <= 0.0 {
            errors.push(format!("scoring.weights must sum to > 0, got {sum:.2}"));
        }

        let h = &self.scoring.heuristics;
        Self::check_multiplier(h.hvi_occupancy_uplift, "scoring.heuristics.hvi_occupancy_uplift", &mut errors);
        Self::check_multiplier(h.iss_forecast_multiplier, "scoring.heuristics.iss_forecast_multiplier", &mut errors);
        if !(0.0..=100.0).contains(&h.hvi_uplift_occupancy_trigger) {
            errors.push(format!(
                "scoring.heuristics.hvi_uplift_occupancy_trigger must be within 0-100 (got {})",
                h.hvi_uplift_occupancy_trigger
            ));
        }
        if !(0.0..=1.0).contains(&h.iss_infrastructure_share_trigger) {
            errors.push(format!(
                "scoring.heuristics.iss_infrastructure_share_trigger must be within 0-1 (got {})",
                h.iss_infrastructure_share_trigger
            ));
        }
        if !(0.0..=1.0).contains(&h.rcs_default_escalation_ratio) {
            errors.push(format!(
                "scoring.heuristics.rcs_default_escalation_ratio must be within 0-1 (got {})",
                h.rcs_default_escalation_ratio
            ));
        }

        if !self.alerts.threshold.is_finite() || self.alerts.threshold < 0.0 {
            errors.push(format!("alerts.threshold must be a finite value >= 0 (got {})", self.alerts.threshold));
        }

        let db = &self.database;
        if db.max_connections == 0 {
            errors.push("database.max_connections must be > 0".to_string());
        }
        if db.acquire_timeout_secs == 0 {
            errors.push("database.acquire_timeout_secs must be > 0".to_string());
        }
        if db.query_timeout_secs == 0 {
            errors.push("database.query_timeout_secs must be > 0".to_string());
        }

        let llm = &self.llm;
        if llm.timeout_secs == 0 {
            errors.push("llm.timeout_secs must be > 0".to_string());
        }
        for (name, t) in [("temperature", llm.temperature), ("sql_temperature", llm.sql_temperature)] {
            if !t.is_finite() || !(0.0..=2.0).contains(&t) {
                errors.push(format!("llm.{name} must be within 0-2 (got {t})"));
            }
        }
        if llm.enabled && llm.base_url.trim().is_empty() {
            errors.push("llm.base_url must be set when llm.enabled = true".to_string());
        }

        if self.chat.history_limit == 0 {
            errors.push("chat.history_limit must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_multiplier(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() {
            errors.push(format!("{name} must be finite (got {value})"));
        } else if value < 1.0 {
            errors.push(format!("{name} must be >= 1.0 (got {value:.3})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Database
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL. `DATABASE_URL` overrides it.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: defaults::DB_MAX_CONNECTIONS,
            acquire_timeout_secs: defaults::DB_ACQUIRE_TIMEOUT_SECS,
            query_timeout_secs: defaults::DB_QUERY_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `false` forces every LLM step onto its deterministic fallback
    pub enabled: bool,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub routing_model: String,
    pub synthesis_model: String,
    pub sql_model: String,
    pub chat_model: String,
    pub temperature: f64,
    pub sql_temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: defaults::LLM_BASE_URL.to_string(),
            api_key_env: defaults::LLM_API_KEY_ENV.to_string(),
            routing_model: defaults::LLM_GENERAL_MODEL.to_string(),
            synthesis_model: defaults::LLM_GENERAL_MODEL.to_string(),
            sql_model: defaults::LLM_SQL_MODEL.to_string(),
            chat_model: defaults::LLM_GENERAL_MODEL.to_string(),
            temperature: defaults::LLM_TEMPERATURE,
            sql_temperature: defaults::LLM_SQL_TEMPERATURE,
            max_tokens: defaults::LLM_MAX_TOKENS,
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    /// API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

// ============================================================================
// Scoring
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: PScoreWeights,
    pub heuristics: Heuristics,
}

/// Relative P-Score weights. Always applied normalized by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PScoreWeights {
    pub hvi: f64,
    pub iss: f64,
    pub rcs: f64,
}

impl Default for PScoreWeights {
    fn default() -> Self {
        Self {
            hvi: defaults::P_WEIGHT_HVI,
            iss: defaults::P_WEIGHT_ISS,
            rcs: defaults::P_WEIGHT_RCS,
        }
    }
}

impl PScoreWeights {
    pub fn total(&self) -> f64 {
        self.hvi + self.iss + self.rcs
    }
}

/// Fixed heuristic constants of the scorers, exposed for override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heuristics {
    pub hvi_occupancy_uplift: f64,
    pub hvi_uplift_occupancy_trigger: f64,
    pub iss_forecast_multiplier: f64,
    pub iss_infrastructure_share_trigger: f64,
    pub rcs_default_escalation_ratio: f64,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            hvi_occupancy_uplift: defaults::HVI_OCCUPANCY_UPLIFT,
            hvi_uplift_occupancy_trigger: defaults::HVI_UPLIFT_OCCUPANCY_TRIGGER,
            iss_forecast_multiplier: defaults::ISS_FORECAST_MULTIPLIER,
            iss_infrastructure_share_trigger: defaults::ISS_INFRASTRUCTURE_SHARE_TRIGGER,
            rcs_default_escalation_ratio: defaults::RCS_DEFAULT_ESCALATION_RATIO,
        }
    }
}

// ============================================================================
// Alerts & Chat
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::ALERT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Default number of turns returned by `history()`
    pub history_limit: usize,
    /// Re-format orchestrator answers with the LLM
    pub formatting: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: defaults::CHAT_HISTORY_LIMIT,
            formatting: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
[scoring.weights]
hvi = 2.0

[alerts]
threshold = 6.5
"#,
        )
        .expect("valid config");
        assert_eq!(config.scoring.weights.hvi, 2.0);
        assert_eq!(config.scoring.weights.iss, defaults::P_WEIGHT_ISS);
        assert_eq!(config.alerts.threshold, 6.5);
        assert_eq!(config.llm.sql_model, defaults::LLM_SQL_MODEL);
    }

    #[test]
    fn test_zero_weight_sum_rejected() {
        let mut config = AppConfig::default();
        config.scoring.weights = PScoreWeights { hvi: 0.0, iss: 0.0, rcs: 0.0 };
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("sum to > 0")), "{errors:?}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_sub_unity_multiplier_and_nan_rejected() {
        let mut config = AppConfig::default();
        config.scoring.heuristics.iss_forecast_multiplier = 0.8;
        config.scoring.weights.rcs = f64::NAN;
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = AppConfig::default();
        config.database.query_timeout_secs = 0;
        config.llm.timeout_secs = 0;
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://localhost/districts"),
            ("P_SCORE_WEIGHT_HVI", "0.5"),
            ("P_SCORE_WEIGHT_ISS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|name| vars.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/districts"));
        assert_eq!(config.scoring.weights.hvi, 0.5);
        assert_eq!(config.scoring.weights.iss, defaults::P_WEIGHT_ISS, "bad value ignored");
    }

    #[test]
    fn test_toml_roundtrip_preserves_values() {
        let mut config = AppConfig::default();
        config.chat.formatting = false;
        let text = config.to_toml().expect("serializable");
        let back = AppConfig::from_toml_str(&text).expect("parses");
        assert_eq!(back, config);
    }
}
