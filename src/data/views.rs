//! Joined / aggregated per-district views consumed by the scorers.
//!
//! Nullable source columns stay `Option` here; each scorer applies its own
//! defaults so the guard rules live next to the formula that needs them.

use serde::{Deserialize, Serialize};

/// `health_infrastructure_data` LEFT JOIN `area_wise_demographics_infrastructure`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HealthView {
    pub district: String,
    pub icu_beds: Option<i64>,
    pub bed_occupancy_rate: Option<f64>,
    pub emergency_cases_per_month: Option<i64>,
    pub total_beds: Option<i64>,
    pub population: Option<i64>,
    pub doctors: Option<i64>,
    pub nurses: Option<i64>,
    pub ambulances: Option<i64>,
}

/// `area_wise_demographics_infrastructure` LEFT JOIN `service_request_details`,
/// grouped by district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InfrastructureView {
    pub district: String,
    pub roads_km: Option<f64>,
    pub water_treatment_plants: Option<i64>,
    pub population: Option<i64>,
    /// Distinct request ids
    pub total_requests: i64,
    /// Distinct request ids in the `Infrastructure` category
    pub infrastructure_requests: i64,
    /// Mean over all joined requests; `None` when the district has none
    pub avg_resolution_time_hours: Option<f64>,
}

/// One `public_workers_data` row (one worker type in one district)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkerRow {
    pub district: String,
    pub worker_type: Option<String>,
    pub total_workers: Option<i64>,
    pub available_workers: Option<i64>,
    pub on_duty: Option<i64>,
    pub utilization_rate_percentage: Option<f64>,
    pub avg_experience_years: Option<f64>,
    pub avg_response_time_minutes: Option<f64>,
}

/// `service_request_details` grouped by district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketStats {
    pub district: String,
    pub total_requests: i64,
    pub escalated_requests: i64,
    pub avg_resolution_time_hours: Option<f64>,
}

/// One resolved/closed ticket with the demographics of its district
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EquitySample {
    pub district: String,
    pub resolution_time_hours: f64,
    pub literacy_rate: f64,
    pub avg_income_inr: Option<f64>,
}
