//! Infrastructure Strain Score (ISS)
//!
//! Request density against road and water capacity, scaled x2. A district
//! with no service requests sits at a 0.5 floor rather than zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{clamp_score, DistrictScores, MetricKind, ScoreError, Severity};
use crate::config::Heuristics;
use crate::data::{DataAccess, InfrastructureView};

const ROAD_CAPACITY_WEIGHT: f64 = 0.6;
const WATER_CAPACITY_WEIGHT: f64 = 0.4;
const MIN_CAPACITY: f64 = 0.1;
const SCALE: f64 = 2.0;

/// Score of a district with zero requests
pub const NO_REQUEST_FLOOR: f64 = 0.5;

const HIGH_DEMAND_REQUESTS: i64 = 100;
const LOW_ROADS_KM: f64 = 100.0;
const HIGH_DEMAND_PENALTY: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureDetails {
    pub iss_score: f64,
    pub roads_km: f64,
    pub water_plants: i64,
    pub total_requests: i64,
    pub infrastructure_requests: i64,
    pub avg_resolution_time: f64,
    pub demand_indicators: Vec<String>,
    pub severity: Severity,
}

/// ISS for one district view.
pub fn score(view: &InfrastructureView, heuristics: &Heuristics) -> f64 {
    let service_count = view.total_requests;
    let roads_km = view.roads_km.unwrap_or(0.0);
    let water_plants = match view.water_treatment_plants {
        Some(n) if n != 0 => n as f64,
        _ => 1.0,
    };
    let population = match view.population {
        Some(p) if p != 0 => p as f64,
        _ => 1.0,
    };

    let per_thousand = (population / 1_000.0).max(1.0);
    let road_capacity = roads_km / per_thousand;
    let water_capacity = (water_plants * 1_000.0) / (population / 10_000.0).max(1.0);
    let total_capacity =
        road_capacity * ROAD_CAPACITY_WEIGHT + water_capacity * WATER_CAPACITY_WEIGHT;
    let capacity_factor = 1.0 / total_capacity.max(MIN_CAPACITY);

    let request_density = service_count as f64 / per_thousand;

    let infrastructure_share_high = view.infrastructure_requests as f64
        > service_count as f64 * heuristics.iss_infrastructure_share_trigger;
    let forecast_multiplier = if infrastructure_share_high {
        heuristics.iss_forecast_multiplier
    } else {
        1.0
    };

    let mut iss = clamp_score(request_density * capacity_factor * forecast_multiplier * SCALE);

    if service_count == 0 {
        iss = NO_REQUEST_FLOOR;
    }

    if service_count > HIGH_DEMAND_REQUESTS && roads_km < LOW_ROADS_KM {
        iss += HIGH_DEMAND_PENALTY;
    }

    clamp_score(iss)
}

/// Demand indicators, in fixed order.
pub fn demand_indicators(view: &InfrastructureView) -> Vec<String> {
    let mut indicators = Vec::new();
    if view.infrastructure_requests > 50 {
        indicators.push("High infrastructure request volume".to_string());
    }
    if view.avg_resolution_time_hours.unwrap_or(0.0) > 72.0 {
        indicators.push("Slow resolution times (>72 hours)".to_string());
    }
    if view.roads_km.unwrap_or(0.0) < LOW_ROADS_KM && view.infrastructure_requests > 20 {
        indicators.push("Insufficient road infrastructure".to_string());
    }
    indicators
}

pub fn details_for(view: &InfrastructureView, heuristics: &Heuristics) -> InfrastructureDetails {
    let iss = score(view, heuristics);
    InfrastructureDetails {
        iss_score: iss,
        roads_km: view.roads_km.unwrap_or(0.0),
        water_plants: view.water_treatment_plants.unwrap_or(0),
        total_requests: view.total_requests,
        infrastructure_requests: view.infrastructure_requests,
        avg_resolution_time: view.avg_resolution_time_hours.unwrap_or(0.0),
        demand_indicators: demand_indicators(view),
        severity: MetricKind::Iss.severity(iss),
    }
}

pub async fn calculate(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<DistrictScores, ScoreError> {
    let views = data.infrastructure_views(district).await?;
    Ok(views
        .iter()
        .map(|v| (v.district.clone(), score(v, heuristics)))
        .collect())
}

pub async fn details(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<BTreeMap<String, InfrastructureDetails>, ScoreError> {
    let views = data.infrastructure_views(district).await?;
    Ok(views
        .iter()
        .map(|v| (v.district.clone(), details_for(v, heuristics)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SnapshotDataAccess, Tables};

    fn view(roads: f64, plants: i64, population: i64, total: i64, infra: i64) -> InfrastructureView {
        InfrastructureView {
            district: "Nagpur".to_string(),
            roads_km: Some(roads),
            water_treatment_plants: Some(plants),
            population: Some(population),
            total_requests: total,
            infrastructure_requests: infra,
            avg_resolution_time_hours: Some(48.0),
        }
    }

    #[test]
    fn test_zero_requests_floor() {
        let s = score(&view(500.0, 4, 1_000_000, 0, 0), &Heuristics::default());
        assert_eq!(s, 0.5);
    }

    #[test]
    fn test_zero_requests_floor_even_with_no_capacity() {
        let v = InfrastructureView {
            district: "Latur".to_string(),
            roads_km: None,
            water_treatment_plants: None,
            population: None,
            total_requests: 0,
            infrastructure_requests: 0,
            avg_resolution_time_hours: None,
        };
        assert_eq!(score(&v, &Heuristics::default()), 0.5);
    }

    #[test]
    fn test_formula_with_forecast_multiplier() {
        // population 1M -> per_thousand 1000; road_cap 0.5; water_cap 4000/100 = 40
        // capacity 0.3 + 16 = 16.3; density 2000/1000 = 2
        // infra 1000 > 600 -> x1.2; raw = 2/16.3*1.2 = 0.14724; score = 0.29448
        let s = score(&view(500.0, 4, 1_000_000, 2_000, 1_000), &Heuristics::default());
        let expected = 2.0 / 16.3 * 1.2 * 2.0;
        assert!((s - expected).abs() < 1e-9, "{s} vs {expected}");

        let s_low_share = score(&view(500.0, 4, 1_000_000, 2_000, 600), &Heuristics::default());
        assert!((s_low_share - 2.0 / 16.3 * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_demand_low_roads_penalty() {
        let h = Heuristics::default();
        let with_roads = score(&view(100.0, 4, 1_000_000, 150, 0), &h);
        let without = score(&view(99.0, 4, 1_000_000, 150, 0), &h);
        assert!(without > with_roads + 1.4);
    }

    #[test]
    fn test_bounds_over_input_grid() {
        let h = Heuristics::default();
        for roads in [0.0, 10.0, 99.0, 5_000.0] {
            for plants in [0, 1, 30] {
                for population in [0, 1, 999, 2_000_000] {
                    for total in [0, 1, 101, 1_000_000] {
                        let s = score(&view(roads, plants, population, total, total / 2), &h);
                        assert!((0.0..=10.0).contains(&s), "out of range: {s}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_demand_indicators() {
        let mut v = view(80.0, 2, 300_000, 200, 60);
        v.avg_resolution_time_hours = Some(96.0);
        assert_eq!(
            demand_indicators(&v),
            vec![
                "High infrastructure request volume",
                "Slow resolution times (>72 hours)",
                "Insufficient road infrastructure"
            ]
        );
    }

    #[tokio::test]
    async fn test_district_without_requests_scores_floor() {
        let tables: Tables = serde_json::from_value(serde_json::json!({
            "area_wise_demographics_infrastructure": [
                {"District": "Latur", "Population": 90000, "Roads_Km": 400.0, "Water_Treatment_Plants": 2}
            ]
        }))
        .expect("fixture parses");
        let source = SnapshotDataAccess::new(tables);
        let scores = calculate(&source, None, &Heuristics::default()).await.expect("scores");
        assert_eq!(scores.get("Latur"), Some(&0.5));
    }

    #[tokio::test]
    async fn test_calculate_is_idempotent() {
        let tables: Tables = serde_json::from_value(serde_json::json!({
            "service_request_details": [
                {"Request_ID": "SR-1", "Service_Category": "Infrastructure", "Status": "Open", "District": "Nagpur", "Resolution_Time_Hours": 96.0, "Escalated": "true"},
                {"Request_ID": "SR-2", "Service_Category": "Water", "Status": "Resolved", "District": "Nagpur", "Resolution_Time_Hours": 30.0, "Escalated": "false"}
            ],
            "area_wise_demographics_infrastructure": [
                {"District": "Nagpur", "Population": 300000, "Roads_Km": 150.0, "Water_Treatment_Plants": 1},
                {"District": "Latur", "Population": 90000, "Roads_Km": 400.0, "Water_Treatment_Plants": 2}
            ]
        }))
        .expect("fixture parses");
        let source = SnapshotDataAccess::new(tables);
        let h = Heuristics::default();

        let first = calculate(&source, None, &h).await.expect("scores");
        let second = calculate(&source, None, &h).await.expect("scores");
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.values().all(|s| (0.0..=10.0).contains(s)));
    }
}
