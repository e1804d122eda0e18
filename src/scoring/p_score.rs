//! Cross-Sectoral Priority Score (P-Score)
//!
//! Normalized weighted mean of HVI, ISS and RCS, amplified by 1.2 when the
//! health-worker capacity gap (`HVI * RCS / 10`) exceeds 5.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{
    clamp_score, DistrictScores, EquityDetails, HealthDetails, InfrastructureDetails,
    PriorityLevel, ResourceDetails,
};
use crate::config::PScoreWeights;

const GAP_AMPLIFIER_TRIGGER: f64 = 5.0;
const GAP_AMPLIFIER: f64 = 1.2;

/// Health-worker capacity gap
pub fn health_worker_gap(hvi: f64, rcs: f64) -> f64 {
    hvi * rcs / 10.0
}

/// P-Score for one district's component values.
pub fn score(hvi: f64, iss: f64, rcs: f64, weights: &PScoreWeights) -> f64 {
    let total = weights.total();
    let mut p = if total > 0.0 {
        (hvi * weights.hvi + iss * weights.iss + rcs * weights.rcs) / total
    } else {
        0.0
    };
    if health_worker_gap(hvi, rcs) > GAP_AMPLIFIER_TRIGGER {
        p *= GAP_AMPLIFIER;
    }
    clamp_score(p)
}

/// Combine component maps over the union of their districts.
///
/// A district missing from one component counts as 0.0 for it. When all three
/// maps are empty there is nothing to rank and the result is empty.
pub fn combine(
    hvi: &DistrictScores,
    iss: &DistrictScores,
    rcs: &DistrictScores,
    weights: &PScoreWeights,
) -> DistrictScores {
    let districts: BTreeSet<&String> = hvi.keys().chain(iss.keys()).chain(rcs.keys()).collect();
    districts
        .into_iter()
        .map(|d| {
            let h = hvi.get(d).copied().unwrap_or(0.0);
            let i = iss.get(d).copied().unwrap_or(0.0);
            let r = rcs.get(d).copied().unwrap_or(0.0);
            (d.clone(), score(h, i, r, weights))
        })
        .collect()
}

/// Per-component details behind one comprehensive score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentDetails {
    pub health: Option<HealthDetails>,
    pub infrastructure: Option<InfrastructureDetails>,
    pub resource: Option<ResourceDetails>,
    pub equity: Option<EquityDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveScore {
    pub district: String,
    pub p_score: f64,
    pub hvi_score: f64,
    pub iss_score: f64,
    pub rcs_score: f64,
    pub sel_index: f64,
    pub health_worker_capacity_gap: f64,
    pub priority_level: PriorityLevel,
    pub all_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub component_details: ComponentDetails,
    pub explanation: String,
}

/// Build the comprehensive view for one district from its P-Score and details.
pub fn assemble(
    district: &str,
    p_score: f64,
    components: ComponentDetails,
    weights: &PScoreWeights,
) -> ComprehensiveScore {
    let hvi = components.health.as_ref().map_or(0.0, |h| h.hvi_score);
    let iss = components.infrastructure.as_ref().map_or(0.0, |i| i.iss_score);
    let rcs = components.resource.as_ref().map_or(0.0, |r| r.rcs_score);
    let sel = components.equity.as_ref().map_or(1.0, |e| e.sel_index);
    let gap = health_worker_gap(hvi, rcs);

    let mut all_issues = Vec::new();
    if let Some(h) = &components.health {
        all_issues.extend(h.risk_factors.iter().cloned());
    }
    if let Some(i) = &components.infrastructure {
        all_issues.extend(i.demand_indicators.iter().cloned());
    }
    if let Some(r) = &components.resource {
        all_issues.extend(r.issues.iter().cloned());
    }
    if let Some(e) = components.equity.as_ref().filter(|e| e.has_equity_gap) {
        all_issues.extend(e.equity_issues.iter().cloned());
    }

    ComprehensiveScore {
        district: district.to_string(),
        p_score,
        hvi_score: hvi,
        iss_score: iss,
        rcs_score: rcs,
        sel_index: sel,
        health_worker_capacity_gap: gap,
        priority_level: PriorityLevel::from_score(p_score),
        all_issues,
        recommendations: recommendations(district, p_score, gap, sel, hvi, iss, rcs),
        explanation: explain(p_score, hvi, iss, rcs, weights),
        component_details: components,
    }
}

fn recommendations(
    district: &str,
    p: f64,
    gap: f64,
    sel: f64,
    hvi: f64,
    iss: f64,
    rcs: f64,
) -> Vec<String> {
    let mut recs = Vec::new();
    if p > 8.0 {
        recs.push("IMMEDIATE ACTION REQUIRED: Cross-sectoral intervention needed".to_string());
    }
    if gap > 6.0 {
        recs.push("Health-Worker Capacity Gap: Consider resource reallocation".to_string());
    }
    if sel > 1.3 {
        recs.push("Equity Intervention: Address service delivery disparities".to_string());
    }
    if hvi > 7.0 {
        recs.push(format!(
            "Health Vulnerability: {district} needs health infrastructure support"
        ));
    }
    if iss > 7.0 {
        recs.push("Infrastructure Strain: Increase infrastructure capacity".to_string());
    }
    if rcs > 7.0 {
        recs.push(
            "Resource Contention: Deploy additional workers or optimize allocation".to_string(),
        );
    }
    recs
}

/// Human-readable breakdown of a P-Score. Weights are shown normalized.
pub fn explain(p: f64, hvi: f64, iss: f64, rcs: f64, weights: &PScoreWeights) -> String {
    let total = weights.total();
    let norm = |w: f64| if total > 0.0 { w / total } else { 0.0 };

    let mut lines = vec![format!("P-Score: {p:.2}/10")];
    for (tag, value, weight) in [
        ("HVI", hvi, norm(weights.hvi)),
        ("ISS", iss, norm(weights.iss)),
        ("RCS", rcs, norm(weights.rcs)),
    ] {
        lines.push(format!(
            "{tag}: {value:.2} (weight: {:.1}%, contribution: {:.2})",
            weight * 100.0,
            value * weight
        ));
    }
    let level = PriorityLevel::from_score(p);
    lines.push(format!("Priority Level: {level} - {}", level.narrative()));
    lines.join("\n")
}
