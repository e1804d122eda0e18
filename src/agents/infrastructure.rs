//! Infrastructure Agent (ISS)

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    sort_alerts, AgentError, AgentKind, AgentPayload, AgentRequest, DistrictAlert, ScoreResult,
    Specialist,
};
use crate::scoring::{InfrastructureDetails, MetricKind, ScoringEngine};

pub const ACTION_CALCULATE: &str = "calculate_iss";
pub const ACTION_DEMAND: &str = "demand_forecast";

pub struct InfrastructureAgent {
    scoring: Arc<ScoringEngine>,
}

impl InfrastructureAgent {
    pub fn new(scoring: Arc<ScoringEngine>) -> Self {
        Self { scoring }
    }

    /// Districts with ISS above `threshold`, highest first.
    pub async fn identify_infrastructure_strain(
        &self,
        threshold: f64,
    ) -> Result<Vec<DistrictAlert>, AgentError> {
        let details = self.scoring.iss_details(None).await?;
        let mut alerts: Vec<DistrictAlert> = details
            .into_iter()
            .filter(|(_, d)| d.iss_score > threshold)
            .map(|(district, d)| DistrictAlert {
                district,
                metric: MetricKind::Iss,
                score: d.iss_score,
                severity: d.severity,
                recommendations: recommendations(&d),
                factors: d.demand_indicators,
            })
            .collect();
        sort_alerts(&mut alerts);
        Ok(alerts)
    }
}

pub fn recommendations(d: &InfrastructureDetails) -> Vec<String> {
    let mut recs = Vec::new();
    if d.iss_score > 8.0 {
        recs.push("IMMEDIATE: Deploy emergency infrastructure resources".to_string());
    }
    if d.roads_km < 100.0 {
        recs.push("Urgent road infrastructure expansion needed".to_string());
    }
    if d.infrastructure_requests > 50 {
        recs.push("Increase infrastructure maintenance workforce".to_string());
    }
    if d.avg_resolution_time > 72.0 {
        recs.push("Optimize service request triage and routing".to_string());
    }
    recs
}

#[async_trait]
impl Specialist for InfrastructureAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Infrastructure
    }

    fn orchestrated_action(&self) -> &'static str {
        ACTION_CALCULATE
    }

    async fn run(&self, request: &AgentRequest<'_>) -> Result<AgentPayload, AgentError> {
        let result = match request.action {
            ACTION_CALCULATE => ScoreResult::Scores {
                metric: MetricKind::Iss,
                scores: self.scoring.iss(request.district).await?,
            },
            ACTION_DEMAND => {
                ScoreResult::Infrastructure(self.scoring.iss_details(request.district).await?)
            }
            other => return Err(AgentError::UnknownAction(other.to_string())),
        };
        Ok(AgentPayload::Scores(result))
    }
}
