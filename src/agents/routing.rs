//! Query routing
//!
//! A bare greeting short-circuits everything. Otherwise an LLM classifier
//! picks agents; if it fails or emits unparsable JSON, deterministic keyword
//! rules decide. Either way the decision names at least one agent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AgentKind;
use crate::llm::json::{parse_object, JsonExtractError};
use crate::llm::{Fallback, LlmBackend, LlmError, Resolved};

pub const GREETING_RESPONSE: &str = "Hello! I'm the AI Admin Assistant. I can help you analyze districts, health infrastructure, resources, and service metrics. What would you like to know?";

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "greetings", "good morning", "good afternoon", "good evening",
    "good night",
];

pub(crate) const COMPARATIVE_KEYWORDS: &[&str] =
    &["compare", "comparison", "difference", "between", "versus"];
pub(crate) const MULTI_DISTRICT_KEYWORDS: &[&str] = &[
    "all districts", "across districts", "every district", "which district",
];
const HEALTH_KEYWORDS: &[&str] = &[
    "health", "hospital", "bed", "icu", "emergency", "disease", "vulnerability",
];
const INFRASTRUCTURE_KEYWORDS: &[&str] = &[
    "infrastructure", "road", "water", "electricity", "service request", "strain",
];
const RESOURCE_KEYWORDS: &[&str] = &[
    "worker", "resource", "utilization", "availability", "staff", "contention",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Comparative,
    MultiDistrict,
    SingleDistrict,
    General,
    Fallback,
}

impl QueryType {
    fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "comparative" => QueryType::Comparative,
            "multi_district" => QueryType::MultiDistrict,
            "single_district" => QueryType::SingleDistrict,
            _ => QueryType::General,
        }
    }
}

/// Agents chosen for one query. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    agents: Vec<AgentKind>,
    pub reasoning: String,
    pub query_type: QueryType,
}

impl RoutingDecision {
    /// Deduplicates and coerces an empty list to data retrieval.
    pub fn new(agents: Vec<AgentKind>, reasoning: impl Into<String>, query_type: QueryType) -> Self {
        let mut unique = Vec::with_capacity(agents.len());
        for a in agents {
            if !unique.contains(&a) {
                unique.push(a);
            }
        }
        if unique.is_empty() {
            unique.push(AgentKind::DataRetrieval);
        }
        Self {
            agents: unique,
            reasoning: reasoning.into(),
            query_type,
        }
    }

    /// Agents in the order the classifier named them.
    pub fn agents(&self) -> &[AgentKind] {
        &self.agents
    }

    pub fn includes(&self, kind: AgentKind) -> bool {
        self.agents.contains(&kind)
    }

    /// First selected agent, in fixed priority order, not yet executed.
    pub fn next_agent(&self, executed: &[AgentKind]) -> Option<AgentKind> {
        AgentKind::PRIORITY
            .into_iter()
            .find(|k| self.includes(*k) && !executed.contains(k))
    }
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("classifier call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("classifier output unusable: {0}")]
    Parse(#[from] JsonExtractError),
}

/// `true` for a bare greeting ("hi", "Good morning!"). Anything after the
/// greeting other than punctuation or whitespace makes it a real query.
pub fn is_greeting(query: &str) -> bool {
    let q = query.trim().to_lowercase();
    GREETINGS.iter().any(|g| match q.strip_prefix(g) {
        Some(rest) => rest.chars().all(|c| c.is_whitespace() || c.is_ascii_punctuation()),
        None => false,
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// `vs` only counts as a standalone word.
pub(crate) fn is_comparative(query_lower: &str) -> bool {
    contains_any(query_lower, COMPARATIVE_KEYWORDS)
        || query_lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == "vs")
}

pub fn routing_prompt(query: &str) -> String {
    format!(
        r#"You are an intelligent query routing system for a cross-sectoral intelligence platform.

Available agents and their capabilities:
1. "data_retrieval" - Retrieves raw data from database tables. Use for:
   - Direct data queries ("show me", "list", "get", "how many")
   - Comparative queries across districts ("compare", "difference between")
   - Multi-district queries ("all districts", "across districts")
   - Specific metrics ("population", "roads", "workers count")

2. "health" - Analyzes health infrastructure and vulnerability (HVI). Use for:
   - Health vulnerability scores
   - ICU beds, emergency cases, bed occupancy
   - Health risk assessments and capacity

3. "infrastructure" - Analyzes infrastructure strain and demand (ISS). Use for:
   - Infrastructure strain scores
   - Service request volumes
   - Road, water, electricity infrastructure

4. "resource" - Analyzes worker utilization and resource contention (RCS). Use for:
   - Resource contention scores
   - Worker availability and utilization
   - Service request escalation rates and worker response times

User Query: "{query}"

IMPORTANT ROUTING RULES:
- For queries asking "which district", "compare", "all districts", "across districts" -> ALWAYS include "data_retrieval"
- For comparative queries mentioning multiple districts -> include "data_retrieval" + relevant domain agents
- For queries asking specific metrics -> include "data_retrieval" + relevant domain agent
- For general analysis queries -> include all relevant agents

Respond with valid JSON only:
{{
    "agents": ["agent1", "agent2"],
    "reasoning": "brief explanation of why these agents were chosen",
    "query_type": "comparative|multi_district|single_district|general"
}}

Agent names must be exactly: "data_retrieval", "health", "infrastructure", "resource"

Response (JSON only):"#
    )
}

#[derive(Debug, Deserialize)]
struct ClassifierOutput {
    #[serde(default)]
    agents: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    query_type: Option<String>,
}

/// Parse classifier text. Unknown agent names are dropped.
pub fn parse_classifier(text: &str) -> Result<RoutingDecision, JsonExtractError> {
    let out: ClassifierOutput = parse_object(text)?;
    let agents: Vec<AgentKind> = out
        .agents
        .iter()
        .filter_map(|name| {
            let kind = AgentKind::parse(name);
            if kind.is_none() {
                tracing::debug!(agent = %name, "Classifier named unknown agent, dropping");
            }
            kind
        })
        .collect();
    let query_type = out
        .query_type
        .as_deref()
        .map_or(QueryType::General, QueryType::parse);
    Ok(RoutingDecision::new(agents, out.reasoning, query_type))
}

/// Deterministic keyword routing.
pub fn keyword_fallback(query: &str, reason: &str) -> RoutingDecision {
    let q = query.to_lowercase();
    let mut agents = Vec::new();

    if is_comparative(&q) || contains_any(&q, MULTI_DISTRICT_KEYWORDS) {
        agents.push(AgentKind::DataRetrieval);
    }
    if contains_any(&q, HEALTH_KEYWORDS) {
        agents.push(AgentKind::Health);
    }
    if contains_any(&q, INFRASTRUCTURE_KEYWORDS) {
        agents.push(AgentKind::Infrastructure);
    }
    if contains_any(&q, RESOURCE_KEYWORDS) {
        agents.push(AgentKind::Resource);
    }

    RoutingDecision::new(
        agents,
        format!("Fallback routing based on keywords. Error: {reason}"),
        QueryType::Fallback,
    )
}

/// Classify with the LLM, falling back to keywords.
pub async fn route(llm: &dyn LlmBackend, query: &str) -> Resolved<RoutingDecision> {
    let classified: Result<RoutingDecision, RoutingError> = async {
        let text = llm.generate(&routing_prompt(query)).await?;
        Ok(parse_classifier(&text)?)
    }
    .await;
    let resolved = Fallback::resolve(classified, |e| keyword_fallback(query, &e.to_string()));
    tracing::info!(
        agents = ?resolved.value.agents(),
        query_type = ?resolved.value.query_type,
        source = resolved.origin.label(),
        "Query routed"
    );
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greetings() {
        assert!(is_greeting("Hi"));
        assert!(is_greeting("  hey!! "));
        assert!(is_greeting("Good morning!"));
        assert!(!is_greeting("hello there"));
        assert!(!is_greeting("hello, compare Pune and Nagpur health"));
        assert!(!is_greeting("history of Pune hospitals"));
        assert!(!is_greeting("which district needs help"));
    }

    #[test]
    fn test_fallback_comparative_plus_domain() {
        let d = keyword_fallback("compare Pune and Nagpur infrastructure", "timeout");
        assert!(d.includes(AgentKind::DataRetrieval));
        assert!(d.includes(AgentKind::Infrastructure));
        assert_eq!(d.query_type, QueryType::Fallback);
        assert!(d.reasoning.contains("timeout"));
    }

    #[test]
    fn test_fallback_defaults_to_data_retrieval() {
        let d = keyword_fallback("population of Latur", "bad json");
        assert_eq!(d.agents(), &[AgentKind::DataRetrieval]);
    }

    #[test]
    fn test_vs_must_be_a_word() {
        assert!(is_comparative("pune vs nagpur"));
        assert!(!is_comparative("canvas survey"));
    }

    #[test]
    fn test_parse_classifier_fenced() {
        let text = "```json\n{\"agents\": [\"Resource\", \"health\", \"health\"], \"reasoning\": \"staffing\", \"query_type\": \"single_district\"}\n```";
        let d = parse_classifier(text).expect("parses");
        assert_eq!(d.agents(), &[AgentKind::Resource, AgentKind::Health]);
        assert_eq!(d.query_type, QueryType::SingleDistrict);
        assert_eq!(d.reasoning, "staffing");
    }

    #[test]
    fn test_empty_or_unknown_agents_coerced() {
        let d = parse_classifier(r#"{"agents": []}"#).expect("parses");
        assert_eq!(d.agents(), &[AgentKind::DataRetrieval]);
        let d = parse_classifier(r#"{"agents": ["weather"]}"#).expect("parses");
        assert_eq!(d.agents(), &[AgentKind::DataRetrieval]);
        assert_eq!(d.query_type, QueryType::General);
    }

    #[test]
    fn test_next_agent_follows_priority_not_listing_order() {
        let d = RoutingDecision::new(
            vec![AgentKind::Resource, AgentKind::DataRetrieval, AgentKind::Health],
            "",
            QueryType::General,
        );
        assert_eq!(d.next_agent(&[]), Some(AgentKind::DataRetrieval));
        assert_eq!(d.next_agent(&[AgentKind::DataRetrieval]), Some(AgentKind::Health));
        assert_eq!(
            d.next_agent(&[AgentKind::DataRetrieval, AgentKind::Health]),
            Some(AgentKind::Resource)
        );
        assert_eq!(
            d.next_agent(&[AgentKind::DataRetrieval, AgentKind::Health, AgentKind::Resource]),
            None
        );
    }

    #[test]
    fn test_prompt_embeds_query() {
        assert!(routing_prompt("beds in Pune").contains("User Query: \"beds in Pune\""));
    }
}
