//! Scoring Engine
//!
//! Four independent district scorers plus the composite:
//!
//! | Metric | Input view | Range |
//! |--------|------------|-------|
//! | HVI (Health Vulnerability Index) | health infrastructure + population | 0-10 |
//! | ISS (Infrastructure Strain Score) | demographics + request counts | 0-10 |
//! | RCS (Resource Contention Score) | aggregated worker rows + escalations | 0-10 |
//! | SEL (Service Equity Lag) | closed tickets + literacy/income | ratio, >1.2 = gap |
//! | P-Score | weighted HVI/ISS/RCS with health-worker amplifier | 0-10 |
//!
//! Every scorer is a pure function of the current source data: each call
//! re-reads its view, nothing is cached, so two calls over unchanged data
//! return identical maps. Each module splits into a synchronous formula over
//! one typed view (unit-testable without a data source) and an async
//! function that fetches the view through [`DataAccess`].

pub mod hvi;
pub mod iss;
pub mod p_score;
pub mod rcs;
pub mod sel;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ScoringConfig;
use crate::data::{DataAccess, DataError};

pub use hvi::HealthDetails;
pub use iss::InfrastructureDetails;
pub use p_score::{ComprehensiveScore, ComponentDetails};
pub use rcs::ResourceDetails;
pub use sel::EquityDetails;

/// Scores keyed by district name, sorted.
pub type DistrictScores = BTreeMap<String, f64>;

/// Upper bound of the 0-10 indices.
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Clamp into [0, 10]. NaN maps to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_SCORE)
    }
}

// ============================================================================
// Metric kinds & tiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricKind {
    Hvi,
    Iss,
    Rcs,
    Sel,
    #[serde(rename = "P")]
    P,
}

impl MetricKind {
    pub fn full_name(self) -> &'static str {
        match self {
            MetricKind::Hvi => "Health Vulnerability Index",
            MetricKind::Iss => "Infrastructure Strain Score",
            MetricKind::Rcs => "Resource Contention Score",
            MetricKind::Sel => "Service Equity Lag Index",
            MetricKind::P => "Priority Score",
        }
    }

    /// Severity tier for a value of this metric.
    pub fn severity(self, value: f64) -> Severity {
        match self {
            MetricKind::Sel => Severity::from_ratio(value),
            _ => Severity::from_score(value),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            MetricKind::Hvi => "HVI",
            MetricKind::Iss => "ISS",
            MetricKind::Rcs => "RCS",
            MetricKind::Sel => "SEL",
            MetricKind::P => "P-Score",
        };
        f.write_str(tag)
    }
}

/// Tier for HVI/ISS/RCS (>7 / >5) and SEL (>1.5 / >1.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score > 7.0 {
            Severity::Critical
        } else if score > 5.0 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }

    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 1.5 {
            Severity::Critical
        } else if ratio > 1.2 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        })
    }
}

/// P-Score tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(p: f64) -> Self {
        if p > 8.0 {
            PriorityLevel::Critical
        } else if p > 6.0 {
            PriorityLevel::High
        } else if p > 4.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    pub fn narrative(self) -> &'static str {
        match self {
            PriorityLevel::Critical => "Immediate cross-sectoral intervention required",
            PriorityLevel::High => "Significant multi-sector attention needed",
            PriorityLevel::Medium => "Monitor closely and plan interventions",
            PriorityLevel::Low => "Stable conditions",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriorityLevel::Low => "LOW",
            PriorityLevel::Medium => "MEDIUM",
            PriorityLevel::High => "HIGH",
            PriorityLevel::Critical => "CRITICAL",
        })
    }
}

/// One metric value for one district with its tier and contributing factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub district: String,
    pub kind: MetricKind,
    pub value: f64,
    pub severity: Severity,
    pub factors: Vec<String>,
}

impl MetricScore {
    pub fn new(district: impl Into<String>, kind: MetricKind, value: f64, factors: Vec<String>) -> Self {
        Self {
            district: district.into(),
            kind,
            value,
            severity: kind.severity(value),
            factors,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Scorers bound to one data source and one scoring config.
#[derive(Clone)]
pub struct ScoringEngine {
    data: Arc<dyn DataAccess>,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(data: Arc<dyn DataAccess>, config: ScoringConfig) -> Self {
        Self { data, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn data(&self) -> &dyn DataAccess {
        self.data.as_ref()
    }

    pub async fn hvi(&self, district: Option<&str>) -> Result<DistrictScores, ScoreError> {
        let scores = hvi::calculate(self.data(), district, &self.config.heuristics).await?;
        debug!(districts = scores.len(), "HVI calculated");
        Ok(scores)
    }

    pub async fn hvi_details(
        &self,
        district: Option<&str>,
    ) -> Result<BTreeMap<String, HealthDetails>, ScoreError> {
        hvi::details(self.data(), district, &self.config.heuristics).await
    }

    pub async fn iss(&self, district: Option<&str>) -> Result<DistrictScores, ScoreError> {
        let scores = iss::calculate(self.data(), district, &self.config.heuristics).await?;
        debug!(districts = scores.len(), "ISS calculated");
        Ok(scores)
    }

    pub async fn iss_details(
        &self,
        district: Option<&str>,
    ) -> Result<BTreeMap<String, InfrastructureDetails>, ScoreError> {
        iss::details(self.data(), district, &self.config.heuristics).await
    }

    pub async fn rcs(&self, district: Option<&str>) -> Result<DistrictScores, ScoreError> {
        let scores = rcs::calculate(self.data(), district, &self.config.heuristics).await?;
        debug!(districts = scores.len(), "RCS calculated");
        Ok(scores)
    }

    pub async fn rcs_details(
        &self,
        district: Option<&str>,
    ) -> Result<BTreeMap<String, ResourceDetails>, ScoreError> {
        rcs::details(self.data(), district, &self.config.heuristics).await
    }

    pub async fn sel(&self, district: Option<&str>) -> Result<DistrictScores, ScoreError> {
        let scores = sel::calculate(self.data(), district).await?;
        debug!(districts = scores.len(), "SEL calculated");
        Ok(scores)
    }

    pub async fn sel_details(
        &self,
        district: Option<&str>,
    ) -> Result<BTreeMap<String, EquityDetails>, ScoreError> {
        sel::details(self.data(), district).await
    }

    /// Composite P-Score. A failing component is logged and treated as empty.
    pub async fn p_score(&self, district: Option<&str>) -> DistrictScores {
        let hvi = or_empty(MetricKind::Hvi, self.hvi(district).await);
        let iss = or_empty(MetricKind::Iss, self.iss(district).await);
        let rcs = or_empty(MetricKind::Rcs, self.rcs(district).await);
        p_score::combine(&hvi, &iss, &rcs, &self.config.weights)
    }

    /// P-Score with component details, gap, issues and recommendations.
    pub async fn comprehensive(&self, district: Option<&str>) -> BTreeMap<String, ComprehensiveScore> {
        let p_scores = self.p_score(district).await;
        if p_scores.is_empty() {
            return BTreeMap::new();
        }

        let health = or_empty(MetricKind::Hvi, self.hvi_details(district).await);
        let infrastructure = or_empty(MetricKind::Iss, self.iss_details(district).await);
        let resource = or_empty(MetricKind::Rcs, self.rcs_details(district).await);
        let equity = or_empty(MetricKind::Sel, self.sel_details(district).await);

        p_scores
            .into_iter()
            .map(|(d, p)| {
                let components = ComponentDetails {
                    health: health.get(&d).cloned(),
                    infrastructure: infrastructure.get(&d).cloned(),
                    resource: resource.get(&d).cloned(),
                    equity: equity.get(&d).cloned(),
                };
                let score = p_score::assemble(&d, p, components, &self.config.weights);
                (d, score)
            })
            .collect()
    }

}

fn or_empty<T: Default>(kind: MetricKind, result: Result<T, ScoreError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(metric = %kind, error = %e, "Component scorer failed, treating as empty");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score_bounds() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(124.2), 10.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 10.0);
        assert_eq!(clamp_score(4.2), 4.2);
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_score(7.01), Severity::Critical);
        assert_eq!(Severity::from_score(7.0), Severity::Warning);
        assert_eq!(Severity::from_score(5.0), Severity::Info);
        assert_eq!(MetricKind::Sel.severity(1.51), Severity::Critical);
        assert_eq!(MetricKind::Sel.severity(1.3), Severity::Warning);
        assert_eq!(MetricKind::Sel.severity(1.2), Severity::Info);
    }

    #[test]
    fn test_priority_tiers() {
        assert_eq!(PriorityLevel::from_score(8.5), PriorityLevel::Critical);
        assert_eq!(PriorityLevel::from_score(8.0), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(4.5), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(4.0), PriorityLevel::Low);
    }

    #[test]
    fn test_metric_display_and_serde() {
        assert_eq!(MetricKind::P.to_string(), "P-Score");
        assert_eq!(serde_json::to_string(&MetricKind::Hvi).expect("serializes"), "\"HVI\"");
        assert_eq!(serde_json::to_string(&Severity::Critical).expect("serializes"), "\"CRITICAL\"");
    }
}
