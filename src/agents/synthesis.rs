//! Final answer synthesis.
//!
//! The LLM gets the query plus all agent results as JSON, with extra
//! instructions for comparative, multi-district and "tell me about" queries.
//! Without the LLM, results are rendered as plain key/value text. Either way a
//! footer names every analysis that failed.

use serde_json::Value;

use super::routing::{is_comparative, MULTI_DISTRICT_KEYWORDS};
use super::{AgentKind, AgentResult};
use crate::llm::{Fallback, LlmBackend, Resolved};

const EXTRA_MULTI_DISTRICT_KEYWORDS: &[&str] = &["top", "highest", "lowest"];
const DISTRICT_INFO_PHRASES: &[&str] = &[
    "tell about",
    "tell me about",
    "show information about",
    "information about",
    "details about",
];

pub const NO_RESULTS_RESPONSE: &str =
    "I couldn't find the requested information. Please try rephrasing your query.";

/// Query shape flags used to pick prompt variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryShape {
    pub comparative: bool,
    pub multi_district: bool,
    pub district_info: bool,
}

impl QueryShape {
    pub fn detect(query: &str) -> Self {
        let q = query.to_lowercase();
        Self {
            comparative: is_comparative(&q),
            multi_district: MULTI_DISTRICT_KEYWORDS
                .iter()
                .chain(EXTRA_MULTI_DISTRICT_KEYWORDS)
                .any(|k| q.contains(k)),
            district_info: DISTRICT_INFO_PHRASES.iter().any(|p| q.contains(p)),
        }
    }
}

pub fn synthesis_prompt(query: &str, results: &[AgentResult]) -> String {
    let results_json = serde_json::to_string_pretty(results)
        .unwrap_or_else(|e| format!("<unserializable results: {e}>"));
    let shape = QueryShape::detect(query);

    let mut instructions = Vec::new();
    if shape.comparative {
        instructions.push("- This is a COMPARATIVE query. Focus on comparing districts, highlighting differences, and providing clear comparisons.");
    }
    if shape.multi_district {
        instructions.push("- This is a MULTI-DISTRICT query. Present data for all districts mentioned, rank/compare them, and identify patterns across districts.");
    }
    if shape.district_info {
        instructions.push("- This is a DISTRICT INFORMATION query. Provide comprehensive information about the district including: (1) Key demographics (population, area), (2) Health infrastructure (hospitals, ICU beds, PHCs, emergency cases), (3) Infrastructure (roads, water treatment plants, electricity substations), (4) Worker resources (total workers, available workers, utilization rate), (5) Key metrics (HVI, ISS, RCS, P-Score if available), and (6) Overall assessment and recommendations.");
    }
    instructions.push("- If agent results contain data with multiple districts, organize the response by district for easy comparison");
    instructions.push("- If data is missing for some districts, clearly state what data is available and what is missing");
    instructions.push("- If any agent result has success=false, say which analysis failed");
    instructions.push("- Use tables or structured format when comparing multiple districts");

    format!(
        "You are an administrative intelligence analyst. Synthesize the following agent results into a clear, actionable response for an administrator.\n\n\
         Original Query: \"{query}\"\n\n\
         Agent Results:\n{results_json}\n\n\
         IMPORTANT INSTRUCTIONS:\n{}\n\n\
         Provide:\n\
         1. Direct answer to the query (if comparing, show clear comparison; if asking \"which\", name the district; if asking \"tell about\", provide comprehensive district overview)\n\
         2. Key insights and cross-sectoral connections\n\
         3. Specific recommendations (if applicable)\n\
         4. Priority level and urgency (if applicable)\n\n\
         Format your response as a clear, professional administrative briefing with proper structure.",
        instructions.join("\n")
    )
}

fn render_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deterministic rendering of successful results.
pub fn deterministic_synthesis(results: &[AgentResult], preview_rows: usize) -> String {
    let mut parts: Vec<String> = Vec::new();

    for result in results.iter().filter(|r| r.success) {
        if let Some(rows) = result.rows() {
            match rows.rows.as_slice() {
                [] => {
                    if let Some(note) = &rows.note {
                        parts.push(note.clone());
                    }
                }
                [row] => {
                    for (k, v) in row.iter().filter(|(_, v)| !v.is_null()) {
                        parts.push(format!("{k}: {}", render_value(v)));
                    }
                }
                many => {
                    parts.push(format!("Found {} records:", many.len()));
                    for (i, row) in many.iter().take(preview_rows).enumerate() {
                        let fields: Vec<String> = row
                            .iter()
                            .filter(|(_, v)| !v.is_null())
                            .map(|(k, v)| format!("{k}: {}", render_value(v)))
                            .collect();
                        parts.push(format!("{}. {}", i + 1, fields.join(", ")));
                    }
                    if many.len() > preview_rows {
                        parts.push(format!("... and {} more", many.len() - preview_rows));
                    }
                }
            }
        }

        if let Some(scores) = result.scores() {
            let metric = scores.metric();
            for (district, value) in scores.headline() {
                parts.push(format!(
                    "{} ({metric}) for {district}: {value:.2}/10",
                    metric.full_name()
                ));
            }
        }
    }

    if parts.is_empty() {
        NO_RESULTS_RESPONSE.to_string()
    } else {
        parts.join("\n")
    }
}

pub fn failed_agents(results: &[AgentResult]) -> Vec<AgentKind> {
    results.iter().filter(|r| !r.success).map(|r| r.agent).collect()
}

/// Footer naming each failed analysis, if any failed.
pub fn failure_footer(results: &[AgentResult]) -> Option<String> {
    let lines: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            format!(
                "- {} analysis ({}): {}",
                r.agent.id(),
                r.agent.agent_name(),
                r.error.as_deref().unwrap_or("Unknown error")
            )
        })
        .collect();
    (!lines.is_empty()).then(|| format!("Note: the following analyses failed:\n{}", lines.join("\n")))
}

/// Synthesize with the LLM, falling back to deterministic text, then append
/// the failure footer.
pub async fn synthesize(
    llm: &dyn LlmBackend,
    query: &str,
    results: &[AgentResult],
    preview_rows: usize,
) -> Resolved<String> {
    let primary = llm.generate(&synthesis_prompt(query, results)).await;
    let mut resolved = Fallback::resolve(primary, |_| deterministic_synthesis(results, preview_rows));
    if let Some(footer) = failure_footer(results) {
        resolved.value = format!("{}\n\n{footer}", resolved.value.trim_end());
    }
    tracing::info!(source = resolved.origin.label(), chars = resolved.value.len(), "Response synthesized");
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentError, AgentPayload, QueryRows, ScoreResult};
    use crate::data::Row;
    use crate::scoring::{DistrictScores, MetricKind};
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => Row::new(),
        }
    }

    fn rows_result(rows: Vec<Row>) -> AgentResult {
        AgentResult::from_outcome(
            AgentKind::DataRetrieval,
            Ok(AgentPayload::Rows(QueryRows {
                sql_query: "SELECT 1".to_string(),
                row_count: rows.len(),
                rows,
                mentioned_districts: Vec::new(),
                note: None,
            })),
        )
    }

    #[test]
    fn test_shape_detection() {
        let s = QueryShape::detect("Compare Pune vs Nagpur");
        assert!(s.comparative && !s.multi_district && !s.district_info);
        assert!(QueryShape::detect("which district has the highest strain").multi_district);
        assert!(QueryShape::detect("Tell me about Latur").district_info);
    }

    #[test]
    fn test_prompt_variants() {
        let p = synthesis_prompt("compare Pune and Nagpur", &[]);
        assert!(p.contains("COMPARATIVE query"));
        assert!(!p.contains("DISTRICT INFORMATION query"));
        assert!(p.contains("Original Query: \"compare Pune and Nagpur\""));
    }

    #[test]
    fn test_single_row_rendered_flat_without_nulls() {
        let r = rows_result(vec![row(json!({"District": "Pune", "Population": 900000, "Roads_Km": null}))]);
        assert_eq!(deterministic_synthesis(&[r], 5), "District: Pune\nPopulation: 900000");
    }

    #[test]
    fn test_many_rows_preview() {
        let rows: Vec<Row> = (1..=7).map(|i| row(json!({"n": i}))).collect();
        let text = deterministic_synthesis(&[rows_result(rows)], 5);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Found 7 records:");
        assert_eq!(lines[1], "1. n: 1");
        assert_eq!(lines[5], "5. n: 5");
        assert_eq!(lines[6], "... and 2 more");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_scores_rendered_per_district() {
        let mut scores = DistrictScores::new();
        scores.insert("Amravati".to_string(), 10.0);
        let r = AgentResult::from_outcome(
            AgentKind::Health,
            Ok(AgentPayload::Scores(ScoreResult::Scores {
                metric: MetricKind::Hvi,
                scores,
            })),
        );
        assert_eq!(
            deterministic_synthesis(&[r], 5),
            "Health Vulnerability Index (HVI) for Amravati: 10.00/10"
        );
    }

    #[test]
    fn test_nothing_found_and_failure_footer() {
        let failed = AgentResult::from_outcome(
            AgentKind::Resource,
            Err(AgentError::UnknownAction("x".to_string())),
        );
        let results = vec![failed];
        assert_eq!(deterministic_synthesis(&results, 5), NO_RESULTS_RESPONSE);
        let footer = failure_footer(&results).expect("footer");
        assert!(footer.contains("resource analysis (ResourceAgent): Unknown action: x"));
        assert_eq!(failed_agents(&results), vec![AgentKind::Resource]);
        assert!(failure_footer(&[]).is_none());
    }
}
