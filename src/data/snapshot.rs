//! In-memory snapshot data source
//!
//! Holds the four relations as typed records and computes the scorer views
//! in Rust with the same join/grouping rules as the Postgres statements.
//! Raw queries are limited to `SELECT * FROM <table> [WHERE "District" = '<d>']`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::guard::check_sql;
use super::records::{AreaProfile, HealthFacilityRecord, PublicWorkerRecord, ServiceRequest};
use super::schema::{AREA_PROFILES, HEALTH_INFRASTRUCTURE, PUBLIC_WORKERS, SERVICE_REQUESTS};
use super::views::{EquitySample, HealthView, InfrastructureView, TicketStats, WorkerRow};
use super::{DataAccess, DataError, Row};

const RAW_SELECT_PATTERN: &str =
    r#"(?i)^select\s+\*\s+from\s+"?(\w+)"?(?:\s+where\s+"?district"?\s*=\s*'([^']*)')?\s*;?$"#;

/// The four source relations. Serialized with the relation names as keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(rename = "service_request_details", default)]
    pub service_requests: Vec<ServiceRequest>,
    #[serde(rename = "public_workers_data", default)]
    pub public_workers: Vec<PublicWorkerRecord>,
    #[serde(rename = "area_wise_demographics_infrastructure", default)]
    pub area_profiles: Vec<AreaProfile>,
    #[serde(rename = "health_infrastructure_data", default)]
    pub health_infrastructure: Vec<HealthFacilityRecord>,
}

impl Tables {
    /// Load a JSON snapshot file.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let snapshot_err = |message: String| DataError::Snapshot {
            path: path.display().to_string(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| snapshot_err(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| snapshot_err(e.to_string()))
    }

    fn table_rows(&self, table: &str, district: Option<&str>) -> Result<Vec<Row>, DataError> {
        fn to_rows<T: Serialize>(
            records: &[T],
            district_of: impl Fn(&T) -> Option<&str>,
            district: Option<&str>,
        ) -> Result<Vec<Row>, DataError> {
            records
                .iter()
                .filter(|r| district.map_or(true, |d| district_of(*r) == Some(d)))
                .map(|r| match serde_json::to_value(r) {
                    Ok(serde_json::Value::Object(map)) => Ok(map),
                    Ok(_) => Err(DataError::Execution("record is not an object".to_string())),
                    Err(e) => Err(DataError::Execution(e.to_string())),
                })
                .collect()
        }

        match table.to_ascii_lowercase().as_str() {
            SERVICE_REQUESTS => to_rows(&self.service_requests, |r| r.district.as_deref(), district),
            PUBLIC_WORKERS => to_rows(&self.public_workers, |r| Some(r.district.as_str()), district),
            AREA_PROFILES => to_rows(&self.area_profiles, |r| Some(r.district.as_str()), district),
            HEALTH_INFRASTRUCTURE => {
                to_rows(&self.health_infrastructure, |r| Some(r.district.as_str()), district)
            }
            other => Err(DataError::Execution(format!(
                "relation \"{other}\" does not exist"
            ))),
        }
    }

    fn area_profile(&self, district: &str) -> Option<&AreaProfile> {
        self.area_profiles.iter().find(|a| a.district == district)
    }

    fn requests_in<'a>(&'a self, district: &'a str) -> impl Iterator<Item = &'a ServiceRequest> {
        self.service_requests
            .iter()
            .filter(move |r| r.district.as_deref() == Some(district))
    }
}

fn matches_district(candidate: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |d| candidate == d)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Snapshot-backed [`DataAccess`]
#[derive(Debug, Clone, Default)]
pub struct SnapshotDataAccess {
    tables: Tables,
}

impl SnapshotDataAccess {
    pub fn new(tables: Tables) -> Self {
        Self { tables }
    }

    /// Read a JSON snapshot from disk.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let tables = Tables::load(path)?;
        info!(
            path = %path.display(),
            service_requests = tables.service_requests.len(),
            worker_rows = tables.public_workers.len(),
            area_profiles = tables.area_profiles.len(),
            health_rows = tables.health_infrastructure.len(),
            "Loaded data snapshot"
        );
        Ok(Self::new(tables))
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }
}

#[async_trait]
impl DataAccess for SnapshotDataAccess {
    fn source_name(&self) -> &'static str {
        "snapshot"
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<Row>, DataError> {
        check_sql(sql)?;
        let pattern =
            Regex::new(RAW_SELECT_PATTERN).map_err(|e| DataError::Execution(e.to_string()))?;
        let caps = pattern
            .captures(sql.trim())
            .ok_or_else(|| DataError::Unsupported {
                source_name: self.source_name(),
                sql: sql.trim().to_string(),
            })?;

        let table = caps.get(1).map_or("", |m| m.as_str());
        let district = caps.get(2).map(|m| m.as_str());
        let rows = self.tables.table_rows(table, district)?;
        debug!(table, rows = rows.len(), "Snapshot query executed");
        Ok(rows)
    }

    async fn list_districts(&self) -> Result<Vec<String>, DataError> {
        let t = &self.tables;
        let names: BTreeSet<&str> = t
            .service_requests
            .iter()
            .filter_map(|r| r.district.as_deref())
            .chain(t.public_workers.iter().map(|r| r.district.as_str()))
            .chain(t.area_profiles.iter().map(|r| r.district.as_str()))
            .chain(t.health_infrastructure.iter().map(|r| r.district.as_str()))
            .collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    async fn health_views(&self, district: Option<&str>) -> Result<Vec<HealthView>, DataError> {
        let mut views: Vec<HealthView> = self
            .tables
            .health_infrastructure
            .iter()
            .filter(|h| matches_district(&h.district, district))
            .map(|h| HealthView {
                district: h.district.clone(),
                icu_beds: h.icu_beds,
                bed_occupancy_rate: h.avg_bed_occupancy_rate,
                emergency_cases_per_month: h.emergency_cases_per_month,
                total_beds: h.total_beds,
                population: self
                    .tables
                    .area_profile(&h.district)
                    .and_then(|a| a.population),
                doctors: h.doctors,
                nurses: h.nurses,
                ambulances: h.ambulances,
            })
            .collect();
        views.sort_by(|a, b| a.district.cmp(&b.district));
        Ok(views)
    }

    async fn infrastructure_views(
        &self,
        district: Option<&str>,
    ) -> Result<Vec<InfrastructureView>, DataError> {
        let mut views: Vec<InfrastructureView> = self
            .tables
            .area_profiles
            .iter()
            .filter(|a| matches_district(&a.district, district))
            .map(|a| {
                let requests: Vec<&ServiceRequest> =
                    self.tables.requests_in(&a.district).collect();
                let total: BTreeSet<&str> =
                    requests.iter().map(|r| r.request_id.as_str()).collect();
                let infra: BTreeSet<&str> = requests
                    .iter()
                    .filter(|r| r.is_infrastructure())
                    .map(|r| r.request_id.as_str())
                    .collect();
                InfrastructureView {
                    district: a.district.clone(),
                    roads_km: a.roads_km,
                    water_treatment_plants: a.water_treatment_plants,
                    population: a.population,
                    total_requests: total.len() as i64,
                    infrastructure_requests: infra.len() as i64,
                    avg_resolution_time_hours: mean(
                        requests.iter().filter_map(|r| r.resolution_time_hours),
                    ),
                }
            })
            .collect();
        views.sort_by(|a, b| a.district.cmp(&b.district));
        Ok(views)
    }

    async fn worker_rows(&self, district: Option<&str>) -> Result<Vec<WorkerRow>, DataError> {
        let mut rows: Vec<WorkerRow> = self
            .tables
            .public_workers
            .iter()
            .filter(|w| matches_district(&w.district, district))
            .map(|w| WorkerRow {
                district: w.district.clone(),
                worker_type: w.worker_type.clone(),
                total_workers: w.total_workers,
                available_workers: w.available_workers,
                on_duty: w.on_duty,
                utilization_rate_percentage: w.utilization_rate_percentage,
                avg_experience_years: w.avg_experience_years,
                avg_response_time_minutes: w.avg_response_time_minutes,
            })
            .collect();
        rows.sort_by(|a, b| {
            a.district
                .cmp(&b.district)
                .then_with(|| a.worker_type.cmp(&b.worker_type))
        });
        Ok(rows)
    }

    async fn ticket_stats(&self, district: Option<&str>) -> Result<Vec<TicketStats>, DataError> {
        let mut grouped: BTreeMap<&str, Vec<&ServiceRequest>> = BTreeMap::new();
        for request in &self.tables.service_requests {
            if let Some(d) = request.district.as_deref() {
                if matches_district(d, district) {
                    grouped.entry(d).or_default().push(request);
                }
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(d, requests)| TicketStats {
                district: d.to_string(),
                total_requests: requests.len() as i64,
                escalated_requests: requests.iter().filter(|r| r.is_escalated()).count() as i64,
                avg_resolution_time_hours: mean(
                    requests.iter().filter_map(|r| r.resolution_time_hours),
                ),
            })
            .collect())
    }

    async fn equity_samples(
        &self,
        district: Option<&str>,
    ) -> Result<Vec<EquitySample>, DataError> {
        let mut samples = Vec::new();
        for request in &self.tables.service_requests {
            let (Some(d), Some(hours)) = (request.district.as_deref(), request.resolution_time_hours)
            else {
                continue;
            };
            if !request.is_closed() || !matches_district(d, district) {
                continue;
            }
            for area in self.tables.area_profiles.iter().filter(|a| a.district == d) {
                if let Some(literacy) = area.literacy_rate {
                    samples.push((
                        request.request_id.as_str(),
                        EquitySample {
                            district: d.to_string(),
                            resolution_time_hours: hours,
                            literacy_rate: literacy,
                            avg_income_inr: area.avg_income_inr,
                        },
                    ));
                }
            }
        }
        samples.sort_by(|(ida, a), (idb, b)| a.district.cmp(&b.district).then_with(|| ida.cmp(idb)));
        Ok(samples.into_iter().map(|(_, s)| s).collect())
    }
}
