//! Typed rows of the four source relations.
//!
//! Field names serialize to the original (case-sensitive) column names so a
//! snapshot JSON file can be produced with a plain `SELECT *` export.

use serde::{Deserialize, Serialize};

/// `Escalated` is stored as text upstream; exports carry bools, strings or 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EscalationFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl EscalationFlag {
    /// Same truthiness rule as `LOWER(TRIM("Escalated"::text)) IN ('true','t','1','yes')`
    pub fn is_escalated(&self) -> bool {
        match self {
            EscalationFlag::Bool(b) => *b,
            EscalationFlag::Number(n) => *n == 1,
            EscalationFlag::Text(s) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "t" | "1" | "yes")
            }
        }
    }
}

/// `service_request_details`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    #[serde(rename = "Request_ID")]
    pub request_id: String,
    #[serde(rename = "Created_Timestamp", default)]
    pub created_timestamp: Option<String>,
    #[serde(rename = "Service_Category", default)]
    pub service_category: Option<String>,
    #[serde(rename = "Sub_Category", default)]
    pub sub_category: Option<String>,
    #[serde(rename = "Priority", default)]
    pub priority: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "District", default)]
    pub district: Option<String>,
    #[serde(rename = "Area", default)]
    pub area: Option<String>,
    #[serde(rename = "Channel", default)]
    pub channel: Option<String>,
    #[serde(rename = "Resolution_Time_Hours", default)]
    pub resolution_time_hours: Option<f64>,
    #[serde(rename = "Escalated", default)]
    pub escalated: Option<EscalationFlag>,
    #[serde(rename = "Satisfaction_Rating", default)]
    pub satisfaction_rating: Option<f64>,
    #[serde(rename = "Assigned_Department", default)]
    pub assigned_department: Option<String>,
    #[serde(rename = "Worker_Assigned", default)]
    pub worker_assigned: Option<String>,
}

impl ServiceRequest {
    pub fn is_escalated(&self) -> bool {
        self.escalated.as_ref().is_some_and(EscalationFlag::is_escalated)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status.as_deref(), Some("Resolved" | "Closed"))
    }

    pub fn is_infrastructure(&self) -> bool {
        self.service_category.as_deref() == Some("Infrastructure")
    }
}

/// `public_workers_data` (primary key is `Worker_Type_District`, not `District`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicWorkerRecord {
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Worker_Type", default)]
    pub worker_type: Option<String>,
    #[serde(rename = "Worker_Type_District", default)]
    pub worker_type_district: Option<String>,
    #[serde(rename = "Total_Workers", default)]
    pub total_workers: Option<i64>,
    #[serde(rename = "Available_Workers", default)]
    pub available_workers: Option<i64>,
    #[serde(rename = "On_Duty", default)]
    pub on_duty: Option<i64>,
    #[serde(rename = "Avg_Experience_Years", default)]
    pub avg_experience_years: Option<f64>,
    #[serde(rename = "Avg_Monthly_Salary_INR", default)]
    pub avg_monthly_salary_inr: Option<f64>,
    #[serde(rename = "Training_Status", default)]
    pub training_status: Option<String>,
    #[serde(rename = "Utilization_Rate_Percentage", default)]
    pub utilization_rate_percentage: Option<f64>,
    #[serde(rename = "Avg_Response_Time_Minutes", default)]
    pub avg_response_time_minutes: Option<f64>,
}

/// `area_wise_demographics_infrastructure`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaProfile {
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Population", default)]
    pub population: Option<i64>,
    #[serde(rename = "Urban_Population_Percentage", default)]
    pub urban_population_percentage: Option<f64>,
    #[serde(rename = "Area_Sq_Km", default)]
    pub area_sq_km: Option<f64>,
    #[serde(rename = "Hospitals", default)]
    pub hospitals: Option<i64>,
    #[serde(rename = "Primary_Health_Centers", default)]
    pub primary_health_centers: Option<i64>,
    #[serde(rename = "Schools", default)]
    pub schools: Option<i64>,
    #[serde(rename = "Police_Stations", default)]
    pub police_stations: Option<i64>,
    #[serde(rename = "Fire_Stations", default)]
    pub fire_stations: Option<i64>,
    #[serde(rename = "Roads_Km", default)]
    pub roads_km: Option<f64>,
    #[serde(rename = "Water_Treatment_Plants", default)]
    pub water_treatment_plants: Option<i64>,
    #[serde(rename = "Electricity_Substations", default)]
    pub electricity_substations: Option<i64>,
    #[serde(rename = "Literacy_Rate", default)]
    pub literacy_rate: Option<f64>,
    #[serde(rename = "Internet_Penetration_Percentage", default)]
    pub internet_penetration_percentage: Option<f64>,
    #[serde(rename = "Avg_Income_INR", default)]
    pub avg_income_inr: Option<f64>,
}

/// `health_infrastructure_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthFacilityRecord {
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Total_Beds", default)]
    pub total_beds: Option<i64>,
    #[serde(rename = "ICU_Beds", default)]
    pub icu_beds: Option<i64>,
    #[serde(rename = "Ventilators", default)]
    pub ventilators: Option<i64>,
    #[serde(rename = "Doctors", default)]
    pub doctors: Option<i64>,
    #[serde(rename = "Nurses", default)]
    pub nurses: Option<i64>,
    #[serde(rename = "Ambulances", default)]
    pub ambulances: Option<i64>,
    #[serde(rename = "Avg_Bed_Occupancy_Rate", default)]
    pub avg_bed_occupancy_rate: Option<f64>,
    #[serde(rename = "Emergency_Cases_Per_Month", default)]
    pub emergency_cases_per_month: Option<i64>,
    #[serde(rename = "Maternal_Health_Centers", default)]
    pub maternal_health_centers: Option<i64>,
}
