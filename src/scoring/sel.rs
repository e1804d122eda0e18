//! Service Equity Lag (SEL)
//!
//! Ratio of mean resolution time in low-equity tickets to high-equity
//! tickets of the same district. Thresholds are the district medians of
//! literacy and income. A ticket is low-equity when either value is below
//! its threshold, high-equity when both are at or above it. A missing income
//! satisfies neither comparison.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

use super::{DistrictScores, MetricKind, ScoreError, Severity};
use crate::config::defaults::{SEL_FALLBACK_INCOME_THRESHOLD, SEL_FALLBACK_LITERACY_THRESHOLD};
use crate::data::{DataAccess, EquitySample};

/// SEL returned when the two cohorts cannot be compared
pub const NEUTRAL_SEL: f64 = 1.0;

/// SEL above which a district has an equity gap
pub const EQUITY_GAP_THRESHOLD: f64 = 1.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityDetails {
    pub sel_index: f64,
    pub avg_resolution_low_equity_hours: f64,
    pub avg_resolution_high_equity_hours: f64,
    pub low_equity_sample_size: usize,
    pub high_equity_sample_size: usize,
    pub literacy_threshold: f64,
    pub income_threshold: f64,
    pub equity_issues: Vec<String>,
    pub has_equity_gap: bool,
    pub severity: Severity,
}

/// Resolution times of one district split by equity cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohorts {
    pub literacy_threshold: f64,
    pub income_threshold: f64,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

fn median_or(values: Vec<f64>, fallback: f64) -> f64 {
    if values.is_empty() {
        return fallback;
    }
    let m = Data::new(values).median();
    if m.is_finite() && m != 0.0 {
        m
    } else {
        fallback
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().mean()
    }
}

/// Split one district's samples into cohorts.
pub fn split(samples: &[&EquitySample]) -> Cohorts {
    let literacy_threshold = median_or(
        samples.iter().map(|s| s.literacy_rate).collect(),
        SEL_FALLBACK_LITERACY_THRESHOLD,
    );
    let income_threshold = median_or(
        samples.iter().filter_map(|s| s.avg_income_inr).collect(),
        SEL_FALLBACK_INCOME_THRESHOLD,
    );

    let mut low = Vec::new();
    let mut high = Vec::new();
    for s in samples {
        let literacy_low = s.literacy_rate < literacy_threshold;
        let income_low = s.avg_income_inr.is_some_and(|i| i < income_threshold);
        let income_high = s.avg_income_inr.is_some_and(|i| i >= income_threshold);

        if literacy_low || income_low {
            low.push(s.resolution_time_hours);
        } else if !literacy_low && income_high {
            high.push(s.resolution_time_hours);
        }
    }

    Cohorts {
        literacy_threshold,
        income_threshold,
        low,
        high,
    }
}

/// SEL for a pair of cohorts. Never negative.
pub fn index(cohorts: &Cohorts) -> f64 {
    if cohorts.low.is_empty() || cohorts.high.is_empty() {
        return NEUTRAL_SEL;
    }
    let mean_high = mean_or_zero(&cohorts.high);
    if mean_high == 0.0 || !mean_high.is_finite() {
        return NEUTRAL_SEL;
    }
    let ratio = mean_or_zero(&cohorts.low) / mean_high;
    if ratio.is_finite() {
        ratio.max(0.0)
    } else {
        NEUTRAL_SEL
    }
}

pub fn equity_issues(sel: f64, cohorts: &Cohorts) -> Vec<String> {
    let mut issues = Vec::new();
    let mean_low = mean_or_zero(&cohorts.low);
    let mean_high = mean_or_zero(&cohorts.high);

    if sel > EQUITY_GAP_THRESHOLD {
        issues.push(format!("Significant equity gap detected (SEL: {sel:.2})"));
    }
    if mean_low > mean_high * 1.5 {
        issues.push("Resolution time is >50% longer in underserved areas".to_string());
    }
    if !cohorts.low.is_empty() && !cohorts.high.is_empty() {
        let median_low = Data::new(cohorts.low.clone()).median();
        let median_high = Data::new(cohorts.high.clone()).median();
        if median_low > median_high * 1.3 {
            issues.push("Median resolution time gap exceeds 30%".to_string());
        }
    }
    issues
}

pub fn details_for(cohorts: &Cohorts) -> EquityDetails {
    let sel = index(cohorts);
    EquityDetails {
        sel_index: sel,
        avg_resolution_low_equity_hours: mean_or_zero(&cohorts.low),
        avg_resolution_high_equity_hours: mean_or_zero(&cohorts.high),
        low_equity_sample_size: cohorts.low.len(),
        high_equity_sample_size: cohorts.high.len(),
        literacy_threshold: cohorts.literacy_threshold,
        income_threshold: cohorts.income_threshold,
        equity_issues: equity_issues(sel, cohorts),
        has_equity_gap: sel > EQUITY_GAP_THRESHOLD,
        severity: MetricKind::Sel.severity(sel),
    }
}

fn group(samples: &[EquitySample]) -> BTreeMap<&str, Vec<&EquitySample>> {
    let mut grouped: BTreeMap<&str, Vec<&EquitySample>> = BTreeMap::new();
    for s in samples {
        grouped.entry(s.district.as_str()).or_default().push(s);
    }
    grouped
}

pub async fn calculate(
    data: &dyn DataAccess,
    district: Option<&str>,
) -> Result<DistrictScores, ScoreError> {
    let samples = data.equity_samples(district).await?;
    Ok(group(&samples)
        .into_iter()
        .map(|(d, s)| (d.to_string(), index(&split(&s))))
        .collect())
}

pub async fn details(
    data: &dyn DataAccess,
    district: Option<&str>,
) -> Result<BTreeMap<String, EquityDetails>, ScoreError> {
    let samples = data.equity_samples(district).await?;
    Ok(group(&samples)
        .into_iter()
        .map(|(d, s)| (d.to_string(), details_for(&split(&s))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SnapshotDataAccess, Tables};

    fn sample(hours: f64, literacy: f64, income: Option<f64>) -> EquitySample {
        EquitySample {
            district: "Nashik".to_string(),
            resolution_time_hours: hours,
            literacy_rate: literacy,
            avg_income_inr: income,
        }
    }

    #[test]
    fn test_gap_between_cohorts() {
        let samples = vec![
            sample(60.0, 60.0, Some(30_000.0)),
            sample(40.0, 70.0, Some(40_000.0)),
            sample(20.0, 80.0, Some(60_000.0)),
            sample(20.0, 90.0, Some(70_000.0)),
        ];
        let refs: Vec<&EquitySample> = samples.iter().collect();
        let cohorts = split(&refs);
        // medians: literacy 75, income 50k
        assert_eq!(cohorts.literacy_threshold, 75.0);
        assert_eq!(cohorts.income_threshold, 50_000.0);
        assert_eq!(cohorts.low, vec![60.0, 40.0]);
        assert_eq!(cohorts.high, vec![20.0, 20.0]);

        let d = details_for(&cohorts);
        assert!((d.sel_index - 2.5).abs() < 1e-9);
        assert!(d.has_equity_gap);
        assert_eq!(d.severity, Severity::Critical);
        assert_eq!(d.equity_issues.len(), 3, "{:?}", d.equity_issues);
    }

    #[test]
    fn test_single_demographic_row_is_neutral() {
        // All tickets share one demographics row: every value equals its median,
        // so nothing is low-equity.
        let samples = vec![sample(10.0, 82.0, Some(90_000.0)), sample(50.0, 82.0, Some(90_000.0))];
        let refs: Vec<&EquitySample> = samples.iter().collect();
        let cohorts = split(&refs);
        assert!(cohorts.low.is_empty());
        assert_eq!(index(&cohorts), 1.0);
    }

    #[test]
    fn test_missing_income_is_in_neither_high_nor_income_low() {
        let samples = vec![
            sample(10.0, 80.0, None),
            sample(30.0, 70.0, Some(40_000.0)),
            sample(10.0, 90.0, Some(60_000.0)),
        ];
        let refs: Vec<&EquitySample> = samples.iter().collect();
        let cohorts = split(&refs);
        // literacy median 80, income median 50k
        assert_eq!(cohorts.low, vec![30.0]);
        assert_eq!(cohorts.high, vec![10.0]);
    }

    #[test]
    fn test_zero_high_mean_is_neutral() {
        let cohorts = Cohorts {
            literacy_threshold: 75.0,
            income_threshold: 50_000.0,
            low: vec![12.0],
            high: vec![0.0, 0.0],
        };
        assert_eq!(index(&cohorts), 1.0);
    }

    #[test]
    fn test_never_negative() {
        let cohorts = Cohorts {
            literacy_threshold: 75.0,
            income_threshold: 50_000.0,
            low: vec![-5.0],
            high: vec![10.0],
        };
        assert!(index(&cohorts) >= 0.0);
    }

    #[test]
    fn test_zero_median_falls_back() {
        let samples = vec![sample(10.0, 0.0, Some(0.0)), sample(12.0, 0.0, Some(0.0))];
        let refs: Vec<&EquitySample> = samples.iter().collect();
        let cohorts = split(&refs);
        assert_eq!(cohorts.literacy_threshold, SEL_FALLBACK_LITERACY_THRESHOLD);
        assert_eq!(cohorts.income_threshold, SEL_FALLBACK_INCOME_THRESHOLD);
    }

    #[tokio::test]
    async fn test_calculate_is_idempotent() {
        let tables: Tables = serde_json::from_value(serde_json::json!({
            "service_request_details": [
                {"Request_ID": "SR-1", "Service_Category": "Water", "Status": "Resolved", "District": "Nashik", "Resolution_Time_Hours": 20.0, "Escalated": "false"},
                {"Request_ID": "SR-2", "Service_Category": "Water", "Status": "Closed", "District": "Nashik", "Resolution_Time_Hours": 60.0, "Escalated": "false"},
                {"Request_ID": "SR-3", "Service_Category": "Health", "Status": "Open", "District": "Nashik", "Resolution_Time_Hours": 90.0, "Escalated": "true"}
            ],
            "area_wise_demographics_infrastructure": [
                {"District": "Nashik", "Population": 150000, "Literacy_Rate": 82.0, "Avg_Income_INR": 25000.0},
                {"District": "Nashik", "Population": 60000, "Literacy_Rate": 61.0, "Avg_Income_INR": 9000.0}
            ]
        }))
        .expect("fixture parses");
        let source = SnapshotDataAccess::new(tables);

        let first = calculate(&source, None).await.expect("scores");
        let second = calculate(&source, None).await.expect("scores");
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert!(first["Nashik"] >= 0.0);
    }
}
