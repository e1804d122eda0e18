//! Health Vulnerability Index (HVI)
//!
//! ```text
//! predicted  = emergency_cases * uplift     if occupancy > trigger
//! raw        = predicted / max(icu_beds, 1) * occupancy / 100
//! HVI        = clamp(raw) + 2.0             if icu_beds < 10 and population > 100k
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{clamp_score, DistrictScores, MetricKind, ScoreError, Severity};
use crate::config::Heuristics;
use crate::data::{DataAccess, HealthView};

const CAPACITY_SHORTFALL_PENALTY: f64 = 2.0;
const SHORTFALL_ICU_BEDS: f64 = 10.0;
const SHORTFALL_POPULATION: i64 = 100_000;

/// Per-district health detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub hvi_score: f64,
    pub icu_beds: i64,
    pub emergency_cases: i64,
    pub bed_occupancy: f64,
    pub doctors: i64,
    pub nurses: i64,
    pub ambulances: i64,
    pub risk_factors: Vec<String>,
    pub severity: Severity,
}

/// HVI for one district view.
pub fn score(view: &HealthView, heuristics: &Heuristics) -> f64 {
    let icu_beds = view.icu_beds.unwrap_or(1).max(1) as f64;
    let emergency_cases = view.emergency_cases_per_month.unwrap_or(0) as f64;
    let occupancy = view.bed_occupancy_rate.unwrap_or(0.0);
    let population = view.population.unwrap_or(1);

    let predicted_emergency = if occupancy > heuristics.hvi_uplift_occupancy_trigger {
        emergency_cases * heuristics.hvi_occupancy_uplift
    } else {
        emergency_cases
    };

    let emergency_ratio = predicted_emergency / icu_beds;
    let occupancy_ratio = occupancy / 100.0;
    let mut hvi = clamp_score(emergency_ratio * occupancy_ratio);

    if icu_beds < SHORTFALL_ICU_BEDS && population > SHORTFALL_POPULATION {
        hvi += CAPACITY_SHORTFALL_PENALTY;
    }

    clamp_score(hvi)
}

/// Qualitative risk factors, in fixed order.
pub fn risk_factors(view: &HealthView) -> Vec<String> {
    let mut risks = Vec::new();
    if view.bed_occupancy_rate.unwrap_or(0.0) > 85.0 {
        risks.push("High bed occupancy (>85%)".to_string());
    }
    if view.icu_beds.unwrap_or(0) < 20 {
        risks.push("Low ICU bed capacity".to_string());
    }
    if view.emergency_cases_per_month.unwrap_or(0) > 500 {
        risks.push("High emergency case volume".to_string());
    }
    risks
}

pub fn details_for(view: &HealthView, heuristics: &Heuristics) -> HealthDetails {
    let hvi = score(view, heuristics);
    HealthDetails {
        hvi_score: hvi,
        icu_beds: view.icu_beds.unwrap_or(0),
        emergency_cases: view.emergency_cases_per_month.unwrap_or(0),
        bed_occupancy: view.bed_occupancy_rate.unwrap_or(0.0),
        doctors: view.doctors.unwrap_or(0),
        nurses: view.nurses.unwrap_or(0),
        ambulances: view.ambulances.unwrap_or(0),
        risk_factors: risk_factors(view),
        severity: MetricKind::Hvi.severity(hvi),
    }
}

pub async fn calculate(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<DistrictScores, ScoreError> {
    let views = data.health_views(district).await?;
    Ok(views
        .iter()
        .map(|v| (v.district.clone(), score(v, heuristics)))
        .collect())
}

pub async fn details(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<BTreeMap<String, HealthDetails>, ScoreError> {
    let views = data.health_views(district).await?;
    Ok(views
        .iter()
        .map(|v| (v.district.clone(), details_for(v, heuristics)))
        .collect())
}
