//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks that only warrant a warning.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AppConfig.
///
/// Maintained by hand to match the struct hierarchy in app_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [database]
        "database",
        "database.url",
        "database.max_connections",
        "database.acquire_timeout_secs",
        "database.query_timeout_secs",
        // [llm]
        "llm",
        "llm.enabled",
        "llm.base_url",
        "llm.api_key_env",
        "llm.routing_model",
        "llm.synthesis_model",
        "llm.sql_model",
        "llm.chat_model",
        "llm.temperature",
        "llm.sql_temperature",
        "llm.max_tokens",
        "llm.timeout_secs",
        // [scoring]
        "scoring",
        "scoring.weights",
        "scoring.weights.hvi",
        "scoring.weights.iss",
        "scoring.weights.rcs",
        "scoring.heuristics",
        "scoring.heuristics.hvi_occupancy_uplift",
        "scoring.heuristics.hvi_uplift_occupancy_trigger",
        "scoring.heuristics.iss_forecast_multiplier",
        "scoring.heuristics.iss_infrastructure_share_trigger",
        "scoring.heuristics.rcs_default_escalation_ratio",
        // [alerts]
        "alerts",
        "alerts.threshold",
        // [chat]
        "chat",
        "chat.history_limit",
        "chat.formatting",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Edit distance
// ============================================================================

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Closest known key within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Ties resolve alphabetically so the suggestion is stable across runs
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k < best_key),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

/// Warn about every key in `raw_toml` that AppConfig does not know.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Suspicious values
// ============================================================================

/// Values that are legal but probably not what the operator meant.
pub fn suspicious_values(config: &super::AppConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let total = config.scoring.weights.total();
    if total.is_finite() && total > 0.0 && (total - 1.0).abs() > 0.05 {
        warnings.push(ValidationWarning {
            field: "scoring.weights".to_string(),
            message: format!("P-Score weights sum to {total:.2}; they are normalized before use"),
            suggestion: None,
        });
    }

    if config.alerts.threshold > 10.0 {
        warnings.push(ValidationWarning {
            field: "alerts.threshold".to_string(),
            message: format!(
                "alerts.threshold = {:.1} is above the 0-10 score range; no district can alert",
                config.alerts.threshold
            ),
            suggestion: None,
        });
    }

    if config.llm.enabled && config.llm.api_key().is_none() {
        warnings.push(ValidationWarning {
            field: "llm.api_key_env".to_string(),
            message: format!(
                "llm.enabled = true but ${} is not set; LLM steps will use their fallbacks",
                config.llm.api_key_env
            ),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("amravati", "amravati"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("amravti", "amravati"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_levenshtein_counts_chars_not_bytes() {
        assert_eq!(levenshtein("ä", "a"), 1);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [scoring]
            [scoring.weights]
            hvi = 0.4
        "#
        .parse()
        .expect("valid toml");
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"scoring".to_string()));
        assert!(keys.contains(&"scoring.weights".to_string()));
        assert!(keys.contains(&"scoring.weights.hvi".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[scoring.weights]
hvii = 0.5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("hvii"));
        assert_eq!(warnings[0].suggestion.as_deref(), Some("scoring.weights.hvi"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[database]
max_connections = 4

[llm]
enabled = false

[scoring.heuristics]
iss_forecast_multiplier = 1.3

[chat]
history_limit = 20
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_unnormalized_weights_warn() {
        let mut config = crate::config::AppConfig::default();
        config.llm.enabled = false;
        config.scoring.weights.hvi = 4.0;
        let warnings = suspicious_values(&config);
        assert!(warnings.iter().any(|w| w.field == "scoring.weights"));
    }

    #[test]
    fn test_defaults_clean_without_llm() {
        let mut config = crate::config::AppConfig::default();
        config.llm.enabled = false;
        assert!(suspicious_values(&config).is_empty());
    }
}
