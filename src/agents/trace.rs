//! Explainability trace of one orchestrator run.
//!
//! Append-only: entries are pushed in step order and never reordered,
//! deduplicated or edited. A run that executes N agents ends with exactly
//! N + 2 entries (route, one per agent, synthesize).

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::district_match::MatchMethod;
use super::routing::QueryType;
use super::{AgentKind, AgentResult};
use crate::llm::Origin;
use crate::scoring::{ComprehensiveScore, MetricKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceStep {
    /// Greeting short-circuit; no routing happened
    Greeting,
    Route {
        decision: Vec<AgentKind>,
        reasoning: String,
        query_type: QueryType,
        origin: Origin,
        #[serde(skip_serializing_if = "Option::is_none")]
        district: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        district_match: Option<MatchMethod>,
    },
    Agent {
        agent: AgentKind,
        success: bool,
        result_summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metric: Option<MetricKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sql_query: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        mentioned_districts: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        scores_count: Option<usize>,
    },
    Synthesize {
        origin: Origin,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        failed_agents: Vec<AgentKind>,
        /// Comprehensive P-Score of the resolved district, when computable
        #[serde(skip_serializing_if = "Option::is_none")]
        p_score: Option<Box<ComprehensiveScore>>,
    },
}

impl TraceStep {
    /// Agent entry summarizing one result.
    pub fn for_agent(result: &AgentResult) -> Self {
        let rows = result.rows();
        let scores = result.scores();
        let result_summary = match (rows, scores) {
            (Some(r), _) => format!("Retrieved {} rows", r.row_count),
            (_, Some(s)) => format!("Scored {} districts ({})", s.district_count(), s.metric()),
            _ => "No result".to_string(),
        };
        TraceStep::Agent {
            agent: result.agent,
            success: result.success,
            result_summary,
            metric: result.metric,
            error: result.error.clone(),
            sql_query: rows.map(|r| r.sql_query.clone()),
            mentioned_districts: rows.map(|r| r.mentioned_districts.clone()).unwrap_or_default(),
            scores_count: scores.map(|s| s.district_count()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraceStep::Greeting => "greeting",
            TraceStep::Route { .. } => "route",
            TraceStep::Agent { .. } => "agent",
            TraceStep::Synthesize { .. } => "synthesize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub step: TraceStep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainabilityLog {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    entries: Vec<TraceEntry>,
}

impl Default for ExplainabilityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplainabilityLog {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn append(&mut self, step: TraceStep) {
        tracing::debug!(run_id = %self.run_id, step = step.name(), "Trace entry appended");
        self.entries.push(TraceEntry {
            timestamp: Utc::now(),
            step,
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step names in order, e.g. `["route", "agent", "synthesize"]`.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.step.name()).collect()
    }

    /// Human-readable rendering for the CLI.
    pub fn render_text(&self) -> String {
        let mut lines = vec![format!("run {}", self.run_id)];
        for e in &self.entries {
            let ts = e.timestamp.format("%H:%M:%S%.3f");
            let line = match &e.step {
                TraceStep::Greeting => format!("[{ts}] greeting"),
                TraceStep::Route {
                    decision,
                    reasoning,
                    origin,
                    district,
                    ..
                } => {
                    let agents: Vec<&str> = decision.iter().map(|a| a.id()).collect();
                    format!(
                        "[{ts}] route ({}) -> [{}] district={} : {}",
                        origin.label(),
                        agents.join(", "),
                        district.as_deref().unwrap_or("-"),
                        reasoning
                    )
                }
                TraceStep::Agent {
                    agent,
                    success,
                    result_summary,
                    error,
                    ..
                } => match error {
                    Some(err) => format!("[{ts}] {} FAILED: {err}", agent.agent_name()),
                    None => format!(
                        "[{ts}] {} ok={success}: {result_summary}",
                        agent.agent_name()
                    ),
                },
                TraceStep::Synthesize { origin, p_score, .. } => {
                    let p = p_score
                        .as_ref()
                        .map(|p| format!(" P-Score {:.2} ({})", p.p_score, p.priority_level))
                        .unwrap_or_default();
                    format!("[{ts}] synthesize ({}){p}", origin.label())
                }
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}
