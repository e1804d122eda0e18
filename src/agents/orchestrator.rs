//! Orchestrator - supervisor state machine over the specialist agents
//!
//! ## States
//!
//! ```text
//! Route ──greeting──────────────────────────────► Done
//!   │
//!   └─► Agent(k)* (fixed priority order) ─► Synthesize ─► Done
//! ```
//!
//! The routing decision is computed once in `Route` and never revisited. From
//! any non-terminal state the next agent is the first one in
//! [`AgentKind::PRIORITY`] that the decision names and that has not run yet;
//! when none is left the run moves to `Synthesize`.
//!
//! Agent failures never abort a run. They land in the agent results, in the
//! trace and in the footer of the final answer. Only a state machine fault
//! (invalid transition, step limit) makes the run itself fail, and that
//! output still carries the partial trace.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::district_match::{self, DistrictMatch, MatchMethod};
use super::routing::{self, RoutingDecision, GREETING_RESPONSE};
use super::synthesis;
use super::trace::{ExplainabilityLog, TraceStep};
use super::{
    AgentError, AgentKind, AgentRequest, AgentResult, DataRetrievalAgent, DistrictAlert,
    HealthAgent, InfrastructureAgent, ResourceAgent, Specialist,
};
use crate::config::defaults::{MAX_ORCHESTRATOR_STEPS, SYNTHESIS_PREVIEW_ROWS};
use crate::config::AppConfig;
use crate::data::DataAccess;
use crate::llm::{LlmClients, LlmSqlGenerator, SqlGenerator};
use crate::scoring::ScoringEngine;

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "agent", rename_all = "snake_case")]
pub enum RunState {
    Route,
    Agent(AgentKind),
    Synthesize,
    Done,
}

/// What the transition function may look at.
#[derive(Debug, Default)]
pub struct RunContext {
    pub greeting: bool,
    pub decision: Option<RoutingDecision>,
    pub executed: Vec<AgentKind>,
}

impl RunContext {
    fn next_after_dispatch(&self) -> Result<RunState, OrchestratorError> {
        let decision = self
            .decision
            .as_ref()
            .ok_or(OrchestratorError::MissingDecision)?;
        Ok(decision
            .next_agent(&self.executed)
            .map_or(RunState::Synthesize, RunState::Agent))
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid transition from {from:?}: {reason}")]
    InvalidTransition { from: RunState, reason: String },

    #[error("No routing decision available after route step")]
    MissingDecision,

    #[error("Run exceeded {0} steps")]
    StepLimitExceeded(usize),
}

/// Total transition function. `Done` has no outgoing edge.
pub fn transition(state: RunState, ctx: &RunContext) -> Result<RunState, OrchestratorError> {
    match state {
        RunState::Route if ctx.greeting => Ok(RunState::Done),
        RunState::Route => ctx.next_after_dispatch(),
        RunState::Agent(kind) if !ctx.executed.contains(&kind) => {
            Err(OrchestratorError::InvalidTransition {
                from: state,
                reason: format!("agent {kind} has not executed"),
            })
        }
        RunState::Agent(_) => ctx.next_after_dispatch(),
        RunState::Synthesize => Ok(RunState::Done),
        RunState::Done => Err(OrchestratorError::InvalidTransition {
            from: state,
            reason: "run already finished".to_string(),
        }),
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace: ExplainabilityLog,
    pub agent_results: Vec<AgentResult>,
    pub district: Option<String>,
}

/// All three alert scans
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertReport {
    pub health: Vec<DistrictAlert>,
    pub infrastructure: Vec<DistrictAlert>,
    pub resource: Vec<DistrictAlert>,
}

impl AlertReport {
    pub fn is_empty(&self) -> bool {
        self.health.is_empty() && self.infrastructure.is_empty() && self.resource.is_empty()
    }
}

/// Mutable state of one run
struct Run<'q> {
    query: &'q str,
    trace: ExplainabilityLog,
    results: Vec<AgentResult>,
    ctx: RunContext,
    district: Option<String>,
    response: Option<String>,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    data: Arc<dyn DataAccess>,
    scoring: Arc<ScoringEngine>,
    llm: LlmClients,
    data_retrieval: DataRetrievalAgent,
    health: HealthAgent,
    infrastructure: InfrastructureAgent,
    resource: ResourceAgent,
}

impl Orchestrator {
    /// Wire the scoring engine, SQL generator and agents from config.
    pub fn new(data: Arc<dyn DataAccess>, llm: LlmClients, config: &AppConfig) -> Self {
        let scoring = Arc::new(ScoringEngine::new(Arc::clone(&data), config.scoring.clone()));
        let sql: Arc<dyn SqlGenerator> = Arc::new(LlmSqlGenerator::new(Arc::clone(&llm.sql)));
        Self::from_parts(data, scoring, llm, sql)
    }

    pub fn from_parts(
        data: Arc<dyn DataAccess>,
        scoring: Arc<ScoringEngine>,
        llm: LlmClients,
        sql: Arc<dyn SqlGenerator>,
    ) -> Self {
        Self {
            data_retrieval: DataRetrievalAgent::new(Arc::clone(&data), sql),
            health: HealthAgent::new(Arc::clone(&scoring)),
            infrastructure: InfrastructureAgent::new(Arc::clone(&scoring)),
            resource: ResourceAgent::new(Arc::clone(&scoring)),
            data,
            scoring,
            llm,
        }
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn data(&self) -> &dyn DataAccess {
        self.data.as_ref()
    }

    fn specialist(&self, kind: AgentKind) -> &dyn Specialist {
        match kind {
            AgentKind::DataRetrieval => &self.data_retrieval,
            AgentKind::Health => &self.health,
            AgentKind::Infrastructure => &self.infrastructure,
            AgentKind::Resource => &self.resource,
        }
    }

    /// Answer one query. Never returns an error; failures are in the output.
    pub async fn run(&self, query: &str, district: Option<&str>) -> RunOutput {
        info!(query = %query, district = ?district, "Orchestrator run started");
        let mut run = Run {
            query,
            trace: ExplainabilityLog::new(),
            results: Vec::new(),
            ctx: RunContext::default(),
            district: district.map(str::to_string),
            response: None,
        };

        let outcome = self.drive(&mut run).await;
        let Run {
            trace,
            results,
            district,
            response,
            ..
        } = run;

        match outcome {
            Ok(()) => {
                info!(
                    run_id = %trace.run_id,
                    agents = results.len(),
                    trace_entries = trace.len(),
                    "Orchestrator run finished"
                );
                RunOutput {
                    success: true,
                    query: query.to_string(),
                    response,
                    error: None,
                    trace,
                    agent_results: results,
                    district,
                }
            }
            Err(e) => {
                warn!(run_id = %trace.run_id, error = %e, "Orchestrator run failed");
                RunOutput {
                    success: false,
                    query: query.to_string(),
                    response: None,
                    error: Some(e.to_string()),
                    trace,
                    agent_results: results,
                    district,
                }
            }
        }
    }

    async fn drive(&self, run: &mut Run<'_>) -> Result<(), OrchestratorError> {
        let mut state = RunState::Route;
        let mut steps = 0usize;

        while state != RunState::Done {
            steps += 1;
            if steps > MAX_ORCHESTRATOR_STEPS {
                return Err(OrchestratorError::StepLimitExceeded(MAX_ORCHESTRATOR_STEPS));
            }

            match state {
                RunState::Route => self.route(run).await,
                RunState::Agent(kind) => self.dispatch(run, kind).await,
                RunState::Synthesize => self.synthesize(run).await,
                RunState::Done => {}
            }
            state = transition(state, &run.ctx)?;
        }
        Ok(())
    }

    async fn route(&self, run: &mut Run<'_>) {
        if routing::is_greeting(run.query) {
            info!("Greeting detected, skipping routing");
            run.ctx.greeting = true;
            run.response = Some(GREETING_RESPONSE.to_string());
            run.trace.append(TraceStep::Greeting);
            return;
        }

        let matched = match run.district.as_deref() {
            Some(given) => self.resolve_district(given, district_match::canonical).await,
            None => self.resolve_district(run.query, district_match::resolve).await,
        };
        if let Some(m) = &matched {
            run.district = Some(m.district.clone());
        }

        let resolved = routing::route(self.llm.routing.as_ref(), run.query).await;
        let decision = resolved.value;
        run.trace.append(TraceStep::Route {
            decision: decision.agents().to_vec(),
            reasoning: decision.reasoning.clone(),
            query_type: decision.query_type,
            origin: resolved.origin,
            district: run.district.clone(),
            district_match: matched.map(|m| m.method),
        });
        run.ctx.decision = Some(decision);
    }

    async fn resolve_district(
        &self,
        text: &str,
        matcher: fn(&str, &[String]) -> Option<DistrictMatch>,
    ) -> Option<DistrictMatch> {
        let districts = match self.data.list_districts().await {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "District list unavailable, continuing without a district");
                return None;
            }
        };
        let found = matcher(text, &districts);
        if let Some(m) = &found {
            let fuzzy = m.method == MatchMethod::Fuzzy;
            info!(district = %m.district, fuzzy, "Target district resolved");
        }
        found
    }

    /// Known spelling of a caller-supplied district, or the input unchanged
    /// when nothing matches.
    pub async fn canonical_district(&self, name: &str) -> String {
        match self.resolve_district(name, district_match::canonical).await {
            Some(m) => m.district,
            None => name.to_string(),
        }
    }

    async fn dispatch(&self, run: &mut Run<'_>, kind: AgentKind) {
        let agent = self.specialist(kind);
        let request = AgentRequest::new(run.query, run.district.as_deref(), agent.orchestrated_action());
        let result = agent.execute(&request).await;
        info!(agent = %kind, success = result.success, "Agent completed");

        run.trace.append(TraceStep::for_agent(&result));
        run.results.push(result);
        run.ctx.executed.push(kind);
    }

    async fn synthesize(&self, run: &mut Run<'_>) {
        let resolved = synthesis::synthesize(
            self.llm.synthesis.as_ref(),
            run.query,
            &run.results,
            SYNTHESIS_PREVIEW_ROWS,
        )
        .await;

        let p_score = match &run.district {
            Some(d) => self.scoring.comprehensive(Some(d.as_str())).await.remove(d).map(Box::new),
            None => None,
        };

        run.trace.append(TraceStep::Synthesize {
            origin: resolved.origin,
            failed_agents: synthesis::failed_agents(&run.results),
            p_score,
        });
        run.response = Some(resolved.value);
    }

    /// Run the three alert scans with one threshold.
    pub async fn alerts(&self, threshold: f64) -> Result<AlertReport, AgentError> {
        Ok(AlertReport {
            health: self.health.identify_health_crises(threshold).await?,
            infrastructure: self.infrastructure.identify_infrastructure_strain(threshold).await?,
            resource: self.resource.identify_resource_contention(threshold).await?,
        })
    }
}
