//! District Intel: Cross-Sectoral District Intelligence
//!
//! Specialist agents and risk scoring for district administrators.
//!
//! ## Architecture
//!
//! - **Data Access**: read-only Postgres or in-memory snapshot, behind one trait
//! - **Scoring Engine**: HVI, ISS, RCS, SEL and the composite P-Score
//! - **Agents**: data retrieval (NL→SQL) plus health, infrastructure and resource specialists
//! - **Orchestrator**: route → agents → synthesize state machine with an explainability trace
//! - **Chat**: conversational façade with per-session history

pub mod agents;
pub mod chat;
pub mod config;
pub mod data;
pub mod llm;
pub mod scoring;

pub use agents::{AlertReport, ExplainabilityLog, Orchestrator, RunOutput};
pub use chat::{ChatReply, ChatSession};
pub use config::AppConfig;
pub use data::{DataAccess, DataError, PgDataAccess, SnapshotDataAccess};
pub use llm::LlmClients;
pub use scoring::{ComprehensiveScore, ScoringEngine};
