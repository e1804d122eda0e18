//! Resource Contention Score (RCS)
//!
//! Worker rows are one per worker type, so they are aggregated per district
//! (counts summed, rates averaged over rows) before any ratio is taken.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{clamp_score, DistrictScores, MetricKind, ScoreError, Severity};
use crate::config::Heuristics;
use crate::data::{DataAccess, TicketStats, WorkerRow};

const STRAINED_UTILIZATION: f64 = 50.0;
const STRAINED_AVAILABLE_SHARE: f64 = 0.5;
const STRAINED_FLOOR: f64 = 1.0;
const CRITICAL_UTILIZATION: f64 = 90.0;
const CRITICAL_AVAILABLE_SHARE: f64 = 0.1;
const CRITICAL_PENALTY: f64 = 2.0;

/// Worker capacity of one district, summed over worker types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerAggregate {
    pub total_workers: i64,
    pub available_workers: i64,
    pub on_duty: i64,
    /// Mean over worker-type rows
    pub utilization_rate: f64,
    pub avg_experience_years: f64,
    pub avg_response_time_minutes: f64,
    pub worker_types: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDetails {
    pub rcs_score: f64,
    pub total_workers: i64,
    pub available_workers: i64,
    pub on_duty: i64,
    pub utilization_rate: f64,
    pub avg_experience_years: f64,
    pub avg_response_time_minutes: f64,
    pub worker_types: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_requests: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_resolution_time_hours: Option<f64>,
    pub issues: Vec<String>,
    pub severity: Severity,
}

/// Group worker rows by district.
pub fn aggregate(rows: &[WorkerRow]) -> BTreeMap<String, WorkerAggregate> {
    #[derive(Default)]
    struct Acc<'a> {
        agg: WorkerAggregate,
        utilization_sum: f64,
        experience_sum: f64,
        response_sum: f64,
        rows: usize,
        types: BTreeSet<&'a str>,
    }

    let mut grouped: BTreeMap<&str, Acc> = BTreeMap::new();
    for row in rows {
        let acc = grouped.entry(row.district.as_str()).or_default();
        acc.agg.total_workers += row.total_workers.unwrap_or(0);
        acc.agg.available_workers += row.available_workers.unwrap_or(0);
        acc.agg.on_duty += row.on_duty.unwrap_or(0);
        acc.utilization_sum += row.utilization_rate_percentage.unwrap_or(0.0);
        acc.experience_sum += row.avg_experience_years.unwrap_or(0.0);
        acc.response_sum += row.avg_response_time_minutes.unwrap_or(0.0);
        acc.rows += 1;
        if let Some(t) = row.worker_type.as_deref() {
            acc.types.insert(t);
        }
    }

    grouped
        .into_iter()
        .map(|(district, acc)| {
            let n = acc.rows.max(1) as f64;
            let agg = WorkerAggregate {
                utilization_rate: acc.utilization_sum / n,
                avg_experience_years: acc.experience_sum / n,
                avg_response_time_minutes: acc.response_sum / n,
                worker_types: acc.types.len(),
                ..acc.agg
            };
            (district.to_string(), agg)
        })
        .collect()
}

/// Escalated share of a district's tickets, or the configured default when
/// the district has workers but no ticket data.
pub fn escalation_ratio(tickets: Option<&TicketStats>, heuristics: &Heuristics) -> f64 {
    match tickets {
        Some(t) => t.escalated_requests as f64 / t.total_requests.max(1) as f64,
        None => heuristics.rcs_default_escalation_ratio,
    }
}

/// RCS for one aggregated district.
pub fn score(agg: &WorkerAggregate, tickets: Option<&TicketStats>, heuristics: &Heuristics) -> f64 {
    let utilization = agg.utilization_rate;
    let available = agg.available_workers as f64;
    let total = agg.total_workers.max(1) as f64;

    let utilization_factor = utilization / 100.0;
    let availability_ratio = 1.0 - available / total;
    let escalation = escalation_ratio(tickets, heuristics);

    let mut rcs = clamp_score(utilization_factor * availability_ratio * (1.0 + escalation) * 10.0);

    if utilization > STRAINED_UTILIZATION && available < total * STRAINED_AVAILABLE_SHARE {
        rcs = rcs.max(STRAINED_FLOOR);
    }
    if utilization > CRITICAL_UTILIZATION && available < total * CRITICAL_AVAILABLE_SHARE {
        rcs += CRITICAL_PENALTY;
    }

    clamp_score(rcs)
}

/// Contention issues, in fixed order.
pub fn issues(agg: &WorkerAggregate, tickets: Option<&TicketStats>) -> Vec<String> {
    let mut found = Vec::new();
    if agg.utilization_rate > 90.0 {
        found.push("Very high worker utilization (>90%)".to_string());
    }
    if (agg.available_workers as f64) < agg.total_workers as f64 * 0.15 {
        found.push("Low worker availability (<15%)".to_string());
    }
    if let Some(t) = tickets {
        if t.escalated_requests as f64 / t.total_requests.max(1) as f64 > 0.2 {
            found.push("High escalation rate (>20%)".to_string());
        }
    }
    found
}

pub fn details_for(
    agg: &WorkerAggregate,
    tickets: Option<&TicketStats>,
    heuristics: &Heuristics,
) -> ResourceDetails {
    let rcs = score(agg, tickets, heuristics);
    ResourceDetails {
        rcs_score: rcs,
        total_workers: agg.total_workers,
        available_workers: agg.available_workers,
        on_duty: agg.on_duty,
        utilization_rate: agg.utilization_rate,
        avg_experience_years: agg.avg_experience_years,
        avg_response_time_minutes: agg.avg_response_time_minutes,
        worker_types: agg.worker_types,
        total_requests: tickets.map(|t| t.total_requests),
        escalated_requests: tickets.map(|t| t.escalated_requests),
        avg_resolution_time_hours: tickets.map(|t| t.avg_resolution_time_hours.unwrap_or(0.0)),
        issues: issues(agg, tickets),
        severity: MetricKind::Rcs.severity(rcs),
    }
}

async fn load(
    data: &dyn DataAccess,
    district: Option<&str>,
) -> Result<(BTreeMap<String, WorkerAggregate>, BTreeMap<String, TicketStats>), ScoreError> {
    let rows = data.worker_rows(district).await?;
    let aggregates = aggregate(&rows);
    if aggregates.is_empty() {
        return Ok((aggregates, BTreeMap::new()));
    }
    let tickets = data
        .ticket_stats(district)
        .await?
        .into_iter()
        .map(|t| (t.district.clone(), t))
        .collect();
    Ok((aggregates, tickets))
}

pub async fn calculate(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<DistrictScores, ScoreError> {
    let (aggregates, tickets) = load(data, district).await?;
    Ok(aggregates
        .iter()
        .map(|(d, agg)| (d.clone(), score(agg, tickets.get(d), heuristics)))
        .collect())
}

pub async fn details(
    data: &dyn DataAccess,
    district: Option<&str>,
    heuristics: &Heuristics,
) -> Result<BTreeMap<String, ResourceDetails>, ScoreError> {
    let (aggregates, tickets) = load(data, district).await?;
    Ok(aggregates
        .iter()
        .map(|(d, agg)| (d.clone(), details_for(agg, tickets.get(d), heuristics)))
        .collect())
}
