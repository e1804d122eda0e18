//! Specialist agents and the orchestrator that drives them
//!
//! ## Specialists (dispatch priority order)
//!
//! 1. **DataRetrieval** - NL→SQL, guard, execute, district mention detection
//! 2. **Health** - HVI scores / health details
//! 3. **Infrastructure** - ISS scores / demand details
//! 4. **Resource** - RCS scores / utilization details
//!
//! Every specialist implements [`Specialist`]. `run` returns a typed
//! [`AgentPayload`] or an [`AgentError`]; the provided `execute` folds that
//! into an [`AgentResult`] envelope so no error escapes the agent boundary.

pub mod data_retrieval;
pub mod district_match;
pub mod health;
pub mod infrastructure;
pub mod orchestrator;
pub mod resource;
pub mod routing;
pub mod synthesis;
pub mod trace;

pub use data_retrieval::DataRetrievalAgent;
pub use health::HealthAgent;
pub use infrastructure::InfrastructureAgent;
pub use orchestrator::{AlertReport, Orchestrator, OrchestratorError, RunOutput, RunState};
pub use resource::ResourceAgent;
pub use routing::{QueryType, RoutingDecision};
pub use trace::{ExplainabilityLog, TraceEntry, TraceStep};

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::{DataError, GuardViolation, Row};
use crate::llm::LlmError;
use crate::scoring::{
    ComprehensiveScore, DistrictScores, EquityDetails, HealthDetails, InfrastructureDetails,
    MetricKind, ResourceDetails, ScoreError, Severity,
};

// ============================================================================
// Agent identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    DataRetrieval,
    Health,
    Infrastructure,
    Resource,
}

impl AgentKind {
    /// Fixed dispatch order.
    pub const PRIORITY: [AgentKind; 4] = [
        AgentKind::DataRetrieval,
        AgentKind::Health,
        AgentKind::Infrastructure,
        AgentKind::Resource,
    ];

    /// Identifier used in routing decisions.
    pub fn id(self) -> &'static str {
        match self {
            AgentKind::DataRetrieval => "data_retrieval",
            AgentKind::Health => "health",
            AgentKind::Infrastructure => "infrastructure",
            AgentKind::Resource => "resource",
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            AgentKind::DataRetrieval => "DataRetrievalAgent",
            AgentKind::Health => "HealthAgent",
            AgentKind::Infrastructure => "InfrastructureAgent",
            AgentKind::Resource => "ResourceAgent",
        }
    }

    /// Metric tag, if the agent scores one.
    pub fn metric(self) -> Option<MetricKind> {
        match self {
            AgentKind::DataRetrieval => None,
            AgentKind::Health => Some(MetricKind::Hvi),
            AgentKind::Infrastructure => Some(MetricKind::Iss),
            AgentKind::Resource => Some(MetricKind::Rcs),
        }
    }

    /// Case-insensitive parse of a routing identifier.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::PRIORITY
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Requests, payloads, results
// ============================================================================

/// One agent invocation
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub query: &'a str,
    pub district: Option<&'a str>,
    pub action: &'a str,
    pub table_hint: Option<&'a str>,
}

impl<'a> AgentRequest<'a> {
    pub fn new(query: &'a str, district: Option<&'a str>, action: &'a str) -> Self {
        Self {
            query,
            district,
            action,
            table_hint: None,
        }
    }
}

/// Metric output of a domain agent, one variant per shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ScoreResult {
    Scores {
        metric: MetricKind,
        scores: DistrictScores,
    },
    Health(BTreeMap<String, HealthDetails>),
    Infrastructure(BTreeMap<String, InfrastructureDetails>),
    Resource(BTreeMap<String, ResourceDetails>),
    Equity(BTreeMap<String, EquityDetails>),
    Priority(BTreeMap<String, ComprehensiveScore>),
}

impl ScoreResult {
    pub fn metric(&self) -> MetricKind {
        match self {
            ScoreResult::Scores { metric, .. } => *metric,
            ScoreResult::Health(_) => MetricKind::Hvi,
            ScoreResult::Infrastructure(_) => MetricKind::Iss,
            ScoreResult::Resource(_) => MetricKind::Rcs,
            ScoreResult::Equity(_) => MetricKind::Sel,
            ScoreResult::Priority(_) => MetricKind::P,
        }
    }

    pub fn district_count(&self) -> usize {
        match self {
            ScoreResult::Scores { scores, .. } => scores.len(),
            ScoreResult::Health(m) => m.len(),
            ScoreResult::Infrastructure(m) => m.len(),
            ScoreResult::Resource(m) => m.len(),
            ScoreResult::Equity(m) => m.len(),
            ScoreResult::Priority(m) => m.len(),
        }
    }

    /// Headline value per district, sorted by district.
    pub fn headline(&self) -> Vec<(&str, f64)> {
        fn collect<T>(m: &BTreeMap<String, T>, f: impl Fn(&T) -> f64) -> Vec<(&str, f64)> {
            m.iter().map(|(d, v)| (d.as_str(), f(v))).collect()
        }
        match self {
            ScoreResult::Scores { scores, .. } => collect(scores, |s| *s),
            ScoreResult::Health(m) => collect(m, |d| d.hvi_score),
            ScoreResult::Infrastructure(m) => collect(m, |d| d.iss_score),
            ScoreResult::Resource(m) => collect(m, |d| d.rcs_score),
            ScoreResult::Equity(m) => collect(m, |d| d.sel_index),
            ScoreResult::Priority(m) => collect(m, |d| d.p_score),
        }
    }
}

/// Raw rows returned by the data retrieval agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRows {
    pub sql_query: String,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub mentioned_districts: Vec<String>,
    /// Set when the query succeeded with zero rows for named districts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentPayload {
    Rows(QueryRows),
    Scores(ScoreResult),
}

/// Envelope of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<AgentPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn from_outcome(agent: AgentKind, outcome: Result<AgentPayload, AgentError>) -> Self {
        match outcome {
            Ok(payload) => Self {
                agent,
                success: true,
                metric: agent.metric(),
                payload: Some(payload),
                error: None,
            },
            Err(e) => Self {
                agent,
                success: false,
                metric: agent.metric(),
                payload: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn rows(&self) -> Option<&QueryRows> {
        match &self.payload {
            Some(AgentPayload::Rows(r)) => Some(r),
            _ => None,
        }
    }

    pub fn scores(&self) -> Option<&ScoreResult> {
        match &self.payload {
            Some(AgentPayload::Scores(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Failed to generate SQL query: {0}")]
    SqlGeneration(#[from] LlmError),

    #[error("Generated SQL query failed validation (unsafe operation detected): {violation} [{sql}]")]
    Rejected { sql: String, violation: GuardViolation },
}

// ============================================================================
// Specialist trait
// ============================================================================

#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Action the orchestrator requests from this agent.
    fn orchestrated_action(&self) -> &'static str;

    async fn run(&self, request: &AgentRequest<'_>) -> Result<AgentPayload, AgentError>;

    /// Run and fold any error into the envelope.
    async fn execute(&self, request: &AgentRequest<'_>) -> AgentResult {
        let outcome = self.run(request).await;
        if let Err(e) = &outcome {
            tracing::warn!(agent = %self.kind(), action = request.action, error = %e, "Agent failed");
        }
        AgentResult::from_outcome(self.kind(), outcome)
    }
}

// ============================================================================
// Alerts
// ============================================================================

/// A district above an alert threshold, with rule-based recommendations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictAlert {
    pub district: String,
    pub metric: MetricKind,
    pub score: f64,
    pub severity: Severity,
    pub factors: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Highest score first; equal scores keep district order.
pub(crate) fn sort_alerts(alerts: &mut [DistrictAlert]) {
    alerts.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.district.cmp(&b.district))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agent_ids() {
        assert_eq!(AgentKind::parse("Health"), Some(AgentKind::Health));
        assert_eq!(AgentKind::parse(" data_retrieval "), Some(AgentKind::DataRetrieval));
        assert_eq!(AgentKind::parse("weather"), None);
    }

    #[test]
    fn test_priority_order_matches_ord() {
        let mut sorted = AgentKind::PRIORITY;
        sorted.sort();
        assert_eq!(sorted, AgentKind::PRIORITY);
    }

    #[test]
    fn test_error_is_folded_into_envelope() {
        let r = AgentResult::from_outcome(
            AgentKind::Health,
            Err(AgentError::UnknownAction("forecast".to_string())),
        );
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("Unknown action: forecast"));
        assert_eq!(r.metric, Some(MetricKind::Hvi));
        assert!(r.payload.is_none());
    }

    #[test]
    fn test_alert_sorting() {
        let alert = |d: &str, s: f64| DistrictAlert {
            district: d.to_string(),
            metric: MetricKind::Rcs,
            score: s,
            severity: Severity::from_score(s),
            factors: Vec::new(),
            recommendations: Vec::new(),
        };
        let mut alerts = vec![alert("Latur", 7.5), alert("Pune", 9.0), alert("Akola", 7.5)];
        sort_alerts(&mut alerts);
        let order: Vec<&str> = alerts.iter().map(|a| a.district.as_str()).collect();
        assert_eq!(order, vec!["Pune", "Akola", "Latur"]);
    }

    #[test]
    fn test_headline_uses_detail_scores() {
        let mut scores = DistrictScores::new();
        scores.insert("Pune".to_string(), 4.5);
        let r = ScoreResult::Scores {
            metric: MetricKind::Iss,
            scores,
        };
        assert_eq!(r.headline(), vec![("Pune", 4.5)]);
        assert_eq!(r.metric(), MetricKind::Iss);
        assert_eq!(r.district_count(), 1);
    }
}
