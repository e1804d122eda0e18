//! Application Configuration Module
//!
//! TOML configuration for the data source, LLM endpoints, scoring weights
//! and heuristics, alert threshold and chat behaviour.
//!
//! ## Loading Order
//!
//! 1. `DISTRICT_INTEL_CONFIG` environment variable (path to TOML file)
//! 2. `district_intel.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Environment overrides (`DATABASE_URL`, `P_SCORE_WEIGHT_*`) are applied
//! on top of whichever source won.
//!
//! ## Usage
//!
//! The config is built once in `main` and handed to the services that need
//! it. There is no global accessor.
//!
//! ```ignore
//! let config = AppConfig::load();
//! let llm = LlmClients::from_config(&config.llm);
//! let orchestrator = Orchestrator::new(data, llm, &config);
//! ```

mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::*;
