//! Health & Vulnerability Agent (HVI)

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    sort_alerts, AgentError, AgentKind, AgentPayload, AgentRequest, DistrictAlert, ScoreResult,
    Specialist,
};
use crate::scoring::{HealthDetails, MetricKind, ScoringEngine};

pub const ACTION_CALCULATE: &str = "calculate_hvi";
pub const ACTION_DETAILED: &str = "detailed_analysis";

pub struct HealthAgent {
    scoring: Arc<ScoringEngine>,
}

impl HealthAgent {
    pub fn new(scoring: Arc<ScoringEngine>) -> Self {
        Self { scoring }
    }

    /// Districts with HVI above `threshold`, highest first.
    pub async fn identify_health_crises(
        &self,
        threshold: f64,
    ) -> Result<Vec<DistrictAlert>, AgentError> {
        let details = self.scoring.hvi_details(None).await?;
        let mut alerts: Vec<DistrictAlert> = details
            .into_iter()
            .filter(|(_, d)| d.hvi_score > threshold)
            .map(|(district, d)| DistrictAlert {
                district,
                metric: MetricKind::Hvi,
                score: d.hvi_score,
                severity: d.severity,
                recommendations: recommendations(&d),
                factors: d.risk_factors,
            })
            .collect();
        sort_alerts(&mut alerts);
        Ok(alerts)
    }
}

pub fn recommendations(d: &HealthDetails) -> Vec<String> {
    let mut recs = Vec::new();
    if d.hvi_score > 8.0 {
        recs.push("IMMEDIATE: Deploy emergency medical resources".to_string());
    }
    if d.bed_occupancy > 85.0 {
        recs.push("Increase hospital bed capacity immediately".to_string());
    }
    if d.icu_beds < 20 {
        recs.push("Deploy temporary ICU facilities".to_string());
    }
    if d.emergency_cases > 500 {
        recs.push("Activate emergency response protocols".to_string());
    }
    recs
}

#[async_trait]
impl Specialist for HealthAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Health
    }

    fn orchestrated_action(&self) -> &'static str {
        ACTION_DETAILED
    }

    async fn run(&self, request: &AgentRequest<'_>) -> Result<AgentPayload, AgentError> {
        let result = match request.action {
            ACTION_CALCULATE => ScoreResult::Scores {
                metric: MetricKind::Hvi,
                scores: self.scoring.hvi(request.district).await?,
            },
            ACTION_DETAILED => ScoreResult::Health(self.scoring.hvi_details(request.district).await?),
            other => return Err(AgentError::UnknownAction(other.to_string())),
        };
        Ok(AgentPayload::Scores(result))
    }
}
