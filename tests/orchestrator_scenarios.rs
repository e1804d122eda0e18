//! End-to-end orchestrator runs against the snapshot fixture
//!
//! LLM roles are played by a scripted backend that answers by prompt kind and
//! fails for any kind it has no script for.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use district_intel::agents::routing::GREETING_RESPONSE;
use district_intel::agents::{AgentKind, ScoreResult, TraceStep};
use district_intel::config::AppConfig;
use district_intel::data::{DataAccess, SnapshotDataAccess};
use district_intel::llm::{LlmBackend, LlmClients, LlmError, Origin};
use district_intel::Orchestrator;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Scripted {
    routing: Option<&'static str>,
    sql: Option<&'static str>,
    synthesis: Option<&'static str>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmBackend for Scripted {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let script = if prompt.starts_with("You are an intelligent query routing system") {
            self.routing
        } else if prompt.starts_with("You are a SQL expert") {
            self.sql
        } else if prompt.starts_with("You are an administrative intelligence analyst") {
            self.synthesis
        } else {
            None
        };
        script.map(str::to_string).ok_or(LlmError::Status {
            status: 503,
            body: "scripted outage".to_string(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

fn snapshot() -> Arc<dyn DataAccess> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/districts.json");
    Arc::new(SnapshotDataAccess::from_file(&path).expect("fixture loads"))
}

fn orchestrator(llm: Arc<Scripted>) -> Orchestrator {
    Orchestrator::new(snapshot(), LlmClients::uniform(llm), &AppConfig::default())
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn fuzzy_district_health_run() {
    let llm = Arc::new(Scripted {
        routing: Some(r#"{"agents": ["health"], "reasoning": "health question", "query_type": "single_district"}"#),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("helth issues in amravti", None).await;

    assert!(out.success, "{:?}", out.error);
    assert_eq!(out.district.as_deref(), Some("Amravati"));
    assert_eq!(out.trace.step_names(), vec!["route", "agent", "synthesize"]);

    let health = &out.agent_results[0];
    assert_eq!(health.agent, AgentKind::Health);
    let Some(ScoreResult::Health(details)) = health.scores() else {
        panic!("expected health details, got {:?}", health.payload);
    };
    assert_eq!(details["Amravati"].hvi_score, 10.0);

    let response = out.response.expect("response");
    assert!(
        response.contains("Health Vulnerability Index (HVI) for Amravati: 10.00/10"),
        "{response}"
    );

    match &out.trace.entries()[2].step {
        TraceStep::Synthesize { origin, p_score, .. } => {
            assert!(origin.is_fallback());
            let p = p_score.as_ref().expect("P-Score annotation for resolved district");
            assert_eq!(p.district, "Amravati");
            assert!((0.0..=10.0).contains(&p.p_score));
        }
        other => panic!("expected synthesize entry, got {other:?}"),
    }
}

#[tokio::test]
async fn exact_district_match_recorded_on_route() {
    let llm = Arc::new(Scripted {
        routing: Some(r#"{"agents": ["health"]}"#),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("issues in Amravati", None).await;
    let trace = serde_json::to_value(&out.trace).expect("serializes");
    assert_eq!(trace["entries"][0]["step"], "route");
    assert_eq!(trace["entries"][0]["district"], "Amravati");
    assert_eq!(trace["entries"][0]["district_match"], "exact");
}

#[tokio::test]
async fn classifier_outage_falls_back_to_keywords() {
    let llm = Arc::new(Scripted {
        sql: Some("SELECT * FROM area_wise_demographics_infrastructure"),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("compare Pune and Nagpur infrastructure", None).await;

    assert!(out.success);
    let executed: Vec<AgentKind> = out.agent_results.iter().map(|r| r.agent).collect();
    assert_eq!(executed, vec![AgentKind::DataRetrieval, AgentKind::Infrastructure]);
    assert_eq!(out.trace.len(), executed.len() + 2);

    match &out.trace.entries()[0].step {
        TraceStep::Route { origin, reasoning, .. } => {
            assert!(matches!(origin, Origin::Fallback { .. }));
            assert!(reasoning.starts_with("Fallback routing based on keywords"));
        }
        other => panic!("expected route entry, got {other:?}"),
    }

    let rows = out.agent_results[0].rows().expect("rows");
    assert_eq!(rows.row_count, 3);
    assert_eq!(rows.mentioned_districts.len(), 2);
    assert!(out.response.expect("response").starts_with("Found 3 records:"));
}

#[tokio::test]
async fn empty_agent_list_runs_data_retrieval_and_reports_failure() {
    let llm = Arc::new(Scripted {
        routing: Some("```json\n{\"agents\": [], \"reasoning\": \"unsure\"}\n```"),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("population numbers please", None).await;

    assert!(out.success, "agent failures do not fail the run");
    assert_eq!(out.agent_results.len(), 1);
    let data = &out.agent_results[0];
    assert_eq!(data.agent, AgentKind::DataRetrieval);
    assert!(!data.success);

    let response = out.response.expect("response");
    assert!(
        response.contains("data_retrieval analysis (DataRetrievalAgent)"),
        "{response}"
    );
    assert_eq!(out.trace.step_names(), vec!["route", "agent", "synthesize"]);
}

#[tokio::test]
async fn agents_dispatch_in_priority_order() {
    let llm = Arc::new(Scripted {
        routing: Some(r#"{"agents": ["resource", "data_retrieval", "health"], "reasoning": "all"}"#),
        sql: Some(r#"SELECT * FROM public_workers_data WHERE "District" = 'Pune'"#),
        synthesis: Some("Pune briefing."),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("Pune staffing and hospitals", None).await;

    let order: Vec<AgentKind> = out.agent_results.iter().map(|r| r.agent).collect();
    assert_eq!(
        order,
        vec![AgentKind::DataRetrieval, AgentKind::Health, AgentKind::Resource]
    );
    assert_eq!(
        out.trace.step_names(),
        vec!["route", "agent", "agent", "agent", "synthesize"]
    );
    assert!(out.agent_results.iter().all(|r| r.success));
    assert_eq!(out.response.as_deref(), Some("Pune briefing."));
    assert_eq!(out.district.as_deref(), Some("Pune"));
}

#[tokio::test]
async fn greeting_skips_llm_entirely() {
    let llm = Arc::new(Scripted::default());
    let out = orchestrator(Arc::clone(&llm)).run("Good morning!", None).await;

    assert!(out.success);
    assert_eq!(out.response.as_deref(), Some(GREETING_RESPONSE));
    assert!(out.agent_results.is_empty());
    assert_eq!(out.trace.step_names(), vec!["greeting"]);
    assert!(llm.prompts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn given_district_scopes_scoring() {
    let llm = Arc::new(Scripted {
        routing: Some(r#"{"agents": ["infrastructure"]}"#),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("how strained are services", Some("Nagpur")).await;
    assert_eq!(out.district.as_deref(), Some("Nagpur"));
    let Some(scores) = out.agent_results[0].scores() else {
        panic!("expected scores");
    };
    assert_eq!(scores.district_count(), 1);
}

#[tokio::test]
async fn given_district_is_matched_case_insensitively() {
    let orchestrator = Orchestrator::new(snapshot(), LlmClients::disabled(), &AppConfig::default());
    let out = orchestrator.run("health vulnerability", Some("amravati")).await;

    assert_eq!(out.district.as_deref(), Some("Amravati"));
    let Some(ScoreResult::Health(details)) = out.agent_results[0].scores() else {
        panic!("expected health details, got {:?}", out.agent_results[0].payload);
    };
    assert_eq!(details.len(), 1);
    assert_eq!(details["Amravati"].hvi_score, 10.0);

    match &out.trace.entries()[0].step {
        TraceStep::Route { district, district_match, .. } => {
            assert_eq!(district.as_deref(), Some("Amravati"));
            assert!(district_match.is_some());
        }
        other => panic!("expected route entry, got {other:?}"),
    }
    assert_eq!(orchestrator.canonical_district("PUNE").await, "Pune");
    assert_eq!(orchestrator.canonical_district("Mumbai").await, "Mumbai");
}

#[tokio::test]
async fn failing_agent_still_traced_among_three() {
    let llm = Arc::new(Scripted {
        routing: Some(r#"{"agents": ["resource", "data_retrieval", "health"], "reasoning": "all"}"#),
        synthesis: Some("Pune briefing."),
        ..Scripted::default()
    });
    let out = orchestrator(llm).run("Pune staffing and hospitals", None).await;

    assert!(out.success, "{:?}", out.error);
    assert_eq!(
        out.trace.step_names(),
        vec!["route", "agent", "agent", "agent", "synthesize"]
    );
    let data = &out.agent_results[0];
    assert_eq!(data.agent, AgentKind::DataRetrieval);
    assert!(!data.success);
    assert!(out.agent_results[1..].iter().all(|r| r.success));
    assert_eq!(out.response.as_deref(), Some("Pune briefing."));
}

#[tokio::test]
async fn alert_scans_rank_and_recommend() {
    let out = orchestrator(Arc::new(Scripted::default())).alerts(7.0).await.expect("alerts");

    let health = &out.health[0];
    assert_eq!(health.district, "Amravati");
    assert!(health
        .recommendations
        .iter()
        .any(|r| r == "IMMEDIATE: Deploy emergency medical resources"));
    assert!(out.health.iter().all(|a| a.score > 7.0));
    assert!(out.resource.iter().all(|a| a.score > 7.0));
}
