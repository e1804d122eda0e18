//! System-wide default constants.
//!
//! Every value here is the built-in default for a config field or a fixed
//! scoring threshold. Grouped by subsystem.

// ============================================================================
// Config discovery
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DISTRICT_INTEL_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "district_intel.toml";

// ============================================================================
// Database
// ============================================================================

pub const DB_MAX_CONNECTIONS: u32 = 10;

pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Upper bound for any single query, view or raw.
pub const DB_QUERY_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// LLM
// ============================================================================

/// OpenAI-compatible chat-completions endpoint (Groq).
pub const LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub const LLM_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Routing, synthesis and chat formatting.
pub const LLM_GENERAL_MODEL: &str = "llama-3.3-70b-versatile";

/// NL→SQL generation. Small and fast.
pub const LLM_SQL_MODEL: &str = "llama-3.1-8b-instant";

pub const LLM_TEMPERATURE: f64 = 0.3;

/// Low temperature keeps generated SQL stable.
pub const LLM_SQL_TEMPERATURE: f64 = 0.1;

pub const LLM_TIMEOUT_SECS: u64 = 30;

pub const LLM_MAX_TOKENS: u32 = 1_024;

// ============================================================================
// Scoring
// ============================================================================

pub const P_WEIGHT_HVI: f64 = 0.4;
pub const P_WEIGHT_ISS: f64 = 0.3;
pub const P_WEIGHT_RCS: f64 = 0.3;

/// Flat uplift on emergency cases when occupancy is above the trigger.
pub const HVI_OCCUPANCY_UPLIFT: f64 = 1.15;

/// Bed occupancy (%) above which the HVI uplift applies.
pub const HVI_UPLIFT_OCCUPANCY_TRIGGER: f64 = 80.0;

/// ISS multiplier when infrastructure requests dominate.
pub const ISS_FORECAST_MULTIPLIER: f64 = 1.2;

/// Share of infrastructure requests above which the ISS multiplier applies.
pub const ISS_INFRASTRUCTURE_SHARE_TRIGGER: f64 = 0.3;

/// Escalation ratio assumed when a district has workers but no tickets.
pub const RCS_DEFAULT_ESCALATION_RATIO: f64 = 0.1;

/// SEL literacy threshold when the district median is zero or undefined.
pub const SEL_FALLBACK_LITERACY_THRESHOLD: f64 = 75.0;

/// SEL income threshold (INR) when the district median is zero or undefined.
pub const SEL_FALLBACK_INCOME_THRESHOLD: f64 = 50_000.0;

// ============================================================================
// Alerts & chat
// ============================================================================

/// Score above which a district is reported by the alert scans.
pub const ALERT_THRESHOLD: f64 = 7.0;

/// Turns returned by `history()` when no limit is given.
pub const CHAT_HISTORY_LIMIT: usize = 10;

// ============================================================================
// Orchestrator
// ============================================================================

/// Hard cap on state transitions in one run (route + 4 agents + synthesize + slack).
pub const MAX_ORCHESTRATOR_STEPS: usize = 8;

/// Rows shown per result in the deterministic synthesis preview.
pub const SYNTHESIS_PREVIEW_ROWS: usize = 5;
