//! PostgreSQL data source
//!
//! View queries are fixed statements with the district bound as `$1`
//! (`NULL` = all districts). Raw queries go through the guard, are wrapped in
//! `row_to_json` so arbitrary column sets decode without a schema, and run in
//! a `READ ONLY` transaction that is always rolled back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};

use super::guard::check_sql;
use super::views::{EquitySample, HealthView, InfrastructureView, TicketStats, WorkerRow};
use super::{DataAccess, DataError, Row};
use crate::config::DatabaseConfig;

const LIST_DISTRICTS_SQL: &str = r#"
SELECT DISTINCT u."District"::text
FROM (
    SELECT "District" FROM service_request_details
    UNION SELECT "District" FROM public_workers_data
    UNION SELECT "District" FROM area_wise_demographics_infrastructure
    UNION SELECT "District" FROM health_infrastructure_data
) u
WHERE u."District" IS NOT NULL
ORDER BY 1
"#;

const HEALTH_VIEW_SQL: &str = r#"
SELECT
    h."District"::text                            AS district,
    h."ICU_Beds"::bigint                          AS icu_beds,
    h."Avg_Bed_Occupancy_Rate"::double precision  AS bed_occupancy_rate,
    h."Emergency_Cases_Per_Month"::bigint         AS emergency_cases_per_month,
    h."Total_Beds"::bigint                        AS total_beds,
    a."Population"::bigint                        AS population,
    h."Doctors"::bigint                           AS doctors,
    h."Nurses"::bigint                            AS nurses,
    h."Ambulances"::bigint                        AS ambulances
FROM health_infrastructure_data h
LEFT JOIN area_wise_demographics_infrastructure a ON h."District" = a."District"
WHERE h."District" IS NOT NULL
  AND ($1::text IS NULL OR h."District" = $1)
ORDER BY h."District"
"#;

const INFRASTRUCTURE_VIEW_SQL: &str = r#"
SELECT
    d."District"::text                          AS district,
    d."Roads_Km"::double precision              AS roads_km,
    d."Water_Treatment_Plants"::bigint          AS water_treatment_plants,
    d."Population"::bigint                      AS population,
    COUNT(DISTINCT s."Request_ID")::bigint      AS total_requests,
    COUNT(DISTINCT s."Request_ID")
        FILTER (WHERE s."Service_Category" = 'Infrastructure')::bigint AS infrastructure_requests,
    AVG(s."Resolution_Time_Hours")::double precision AS avg_resolution_time_hours
FROM area_wise_demographics_infrastructure d
LEFT JOIN service_request_details s ON d."District" = s."District"
WHERE d."District" IS NOT NULL
  AND ($1::text IS NULL OR d."District" = $1)
GROUP BY d."District", d."Roads_Km", d."Water_Treatment_Plants", d."Population"
ORDER BY d."District"
"#;

const WORKER_ROWS_SQL: &str = r#"
SELECT
    w."District"::text                                   AS district,
    w."Worker_Type"::text                                AS worker_type,
    w."Total_Workers"::bigint                            AS total_workers,
    w."Available_Workers"::bigint                        AS available_workers,
    w."On_Duty"::bigint                                  AS on_duty,
    w."Utilization_Rate_Percentage"::double precision    AS utilization_rate_percentage,
    w."Avg_Experience_Years"::double precision           AS avg_experience_years,
    w."Avg_Response_Time_Minutes"::double precision      AS avg_response_time_minutes
FROM public_workers_data w
WHERE w."District" IS NOT NULL
  AND ($1::text IS NULL OR w."District" = $1)
ORDER BY w."District", w."Worker_Type"
"#;

const TICKET_STATS_SQL: &str = r#"
SELECT
    "District"::text        AS district,
    COUNT(*)::bigint        AS total_requests,
    COUNT(*) FILTER (
        WHERE LOWER(TRIM("Escalated"::text)) IN ('true', 't', '1', 'yes')
    )::bigint               AS escalated_requests,
    AVG("Resolution_Time_Hours")::double precision AS avg_resolution_time_hours
FROM service_request_details
WHERE "District" IS NOT NULL
  AND ($1::text IS NULL OR "District" = $1)
GROUP BY "District"
ORDER BY "District"
"#;

const EQUITY_SAMPLES_SQL: &str = r#"
SELECT
    s."District"::text                          AS district,
    s."Resolution_Time_Hours"::double precision AS resolution_time_hours,
    d."Literacy_Rate"::double precision         AS literacy_rate,
    d."Avg_Income_INR"::double precision        AS avg_income_inr
FROM service_request_details s
JOIN area_wise_demographics_infrastructure d ON s."District" = d."District"
WHERE s."Resolution_Time_Hours" IS NOT NULL
  AND s."Status" IN ('Resolved', 'Closed')
  AND d."Literacy_Rate" IS NOT NULL
  AND ($1::text IS NULL OR s."District" = $1)
ORDER BY s."District", s."Request_ID"
"#;

/// Pooled Postgres reader
pub struct PgDataAccess {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgDataAccess {
    /// Open a bounded pool from the `[database]` config section.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataError> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                DataError::Execution("DATABASE_URL is not set (config [database].url)".to_string())
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(url)
            .await?;

        info!(
            max_connections = config.max_connections,
            query_timeout_secs = config.query_timeout_secs,
            "Connected to PostgreSQL"
        );
        Ok(Self::from_pool(pool, config.query_timeout_secs))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(DataError::from),
            Err(_) => Err(DataError::Timeout(self.query_timeout.as_secs())),
        }
    }

    async fn read_only_rows(&self, sql: &str) -> Result<Vec<Row>, sqlx::Error> {
        let wrapped = format!("SELECT row_to_json(q)::jsonb FROM ({sql}) q");
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;
        let rows: Vec<Json<Row>> = sqlx::query_scalar(&wrapped).fetch_all(&mut *tx).await?;
        tx.rollback().await?;
        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }
}

#[async_trait]
impl DataAccess for PgDataAccess {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn run_query(&self, sql: &str) -> Result<Vec<Row>, DataError> {
        check_sql(sql)?;
        let body = sql.trim().trim_end_matches(';');
        let rows = self.bounded(self.read_only_rows(body)).await?;
        debug!(rows = rows.len(), "Raw query executed");
        Ok(rows)
    }

    async fn list_districts(&self) -> Result<Vec<String>, DataError> {
        self.bounded(sqlx::query_scalar(LIST_DISTRICTS_SQL).fetch_all(&self.pool))
            .await
    }

    async fn health_views(&self, district: Option<&str>) -> Result<Vec<HealthView>, DataError> {
        self.bounded(
            sqlx::query_as(HEALTH_VIEW_SQL)
                .bind(district)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn infrastructure_views(
        &self,
        district: Option<&str>,
    ) -> Result<Vec<InfrastructureView>, DataError> {
        self.bounded(
            sqlx::query_as(INFRASTRUCTURE_VIEW_SQL)
                .bind(district)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn worker_rows(&self, district: Option<&str>) -> Result<Vec<WorkerRow>, DataError> {
        self.bounded(
            sqlx::query_as(WORKER_ROWS_SQL)
                .bind(district)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn ticket_stats(&self, district: Option<&str>) -> Result<Vec<TicketStats>, DataError> {
        self.bounded(
            sqlx::query_as(TICKET_STATS_SQL)
                .bind(district)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn equity_samples(
        &self,
        district: Option<&str>,
    ) -> Result<Vec<EquitySample>, DataError> {
        self.bounded(
            sqlx::query_as(EQUITY_SAMPLES_SQL)
                .bind(district)
                .fetch_all(&self.pool),
        )
        .await
    }
}
