//! Resource Agent (RCS)

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    sort_alerts, AgentError, AgentKind, AgentPayload, AgentRequest, DistrictAlert, ScoreResult,
    Specialist,
};
use crate::scoring::{MetricKind, ResourceDetails, ScoringEngine};

pub const ACTION_CALCULATE: &str = "calculate_rcs";
pub const ACTION_UTILIZATION: &str = "utilization_metrics";

pub struct ResourceAgent {
    scoring: Arc<ScoringEngine>,
}

impl ResourceAgent {
    pub fn new(scoring: Arc<ScoringEngine>) -> Self {
        Self { scoring }
    }

    /// Districts with RCS above `threshold`, highest first.
    pub async fn identify_resource_contention(
        &self,
        threshold: f64,
    ) -> Result<Vec<DistrictAlert>, AgentError> {
        let details = self.scoring.rcs_details(None).await?;
        let mut alerts: Vec<DistrictAlert> = details
            .into_iter()
            .filter(|(_, d)| d.rcs_score > threshold)
            .map(|(district, d)| DistrictAlert {
                district,
                metric: MetricKind::Rcs,
                score: d.rcs_score,
                severity: d.severity,
                recommendations: recommendations(&d),
                factors: d.issues,
            })
            .collect();
        sort_alerts(&mut alerts);
        Ok(alerts)
    }
}

pub fn recommendations(d: &ResourceDetails) -> Vec<String> {
    let mut recs = Vec::new();
    if d.rcs_score > 8.0 {
        recs.push(
            "IMMEDIATE: Deploy additional workers or reassign from other districts".to_string(),
        );
    }
    if d.utilization_rate > 90.0 {
        recs.push("Reduce worker workload to prevent burnout".to_string());
    }
    if (d.available_workers as f64) < d.total_workers as f64 * 0.15 {
        recs.push("Activate reserve worker pool or hire temporary staff".to_string());
    }
    let escalated = d.escalated_requests.unwrap_or(0) as f64;
    let total = d.total_requests.unwrap_or(1) as f64;
    if escalated > total * 0.2 {
        recs.push("Improve worker assignment based on experience and workload".to_string());
    }
    recs
}

#[async_trait]
impl Specialist for ResourceAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Resource
    }

    fn orchestrated_action(&self) -> &'static str {
        ACTION_UTILIZATION
    }

    async fn run(&self, request: &AgentRequest<'_>) -> Result<AgentPayload, AgentError> {
        let result = match request.action {
            ACTION_CALCULATE => ScoreResult::Scores {
                metric: MetricKind::Rcs,
                scores: self.scoring.rcs(request.district).await?,
            },
            ACTION_UTILIZATION => {
                ScoreResult::Resource(self.scoring.rcs_details(request.district).await?)
            }
            other => return Err(AgentError::UnknownAction(other.to_string())),
        };
        Ok(AgentPayload::Scores(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Severity;

    fn details() -> ResourceDetails {
        ResourceDetails {
            rcs_score: 8.6,
            total_workers: 200,
            available_workers: 20,
            on_duty: 170,
            utilization_rate: 94.0,
            avg_experience_years: 6.0,
            avg_response_time_minutes: 40.0,
            worker_types: 3,
            total_requests: Some(100),
            escalated_requests: Some(30),
            avg_resolution_time_hours: Some(50.0),
            issues: Vec::new(),
            severity: Severity::Critical,
        }
    }

    #[test]
    fn test_all_rules_fire() {
        assert_eq!(
            recommendations(&details()),
            vec![
                "IMMEDIATE: Deploy additional workers or reassign from other districts",
                "Reduce worker workload to prevent burnout",
                "Activate reserve worker pool or hire temporary staff",
                "Improve worker assignment based on experience and workload",
            ]
        );
    }

    #[test]
    fn test_reserve_pool_threshold_is_fifteen_percent() {
        let d = ResourceDetails {
            rcs_score: 5.0,
            utilization_rate: 70.0,
            available_workers: 30,
            escalated_requests: Some(5),
            ..details()
        };
        assert!(recommendations(&d).is_empty());

        let short = ResourceDetails {
            available_workers: 29,
            ..d
        };
        assert_eq!(
            recommendations(&short),
            vec!["Activate reserve worker pool or hire temporary staff"]
        );
    }

    #[test]
    fn test_missing_ticket_data_skips_escalation_rule() {
        let d = ResourceDetails {
            total_requests: None,
            escalated_requests: None,
            ..details()
        };
        assert!(!recommendations(&d)
            .iter()
            .any(|r| r.starts_with("Improve worker assignment")));
    }
}
