//! Data Access Capability
//!
//! Read-only access to the four district relations:
//!
//! - `service_request_details` - citizen tickets (many per district)
//! - `public_workers_data` - worker capacity, one row per worker type per district
//! - `area_wise_demographics_infrastructure` - demographics (district unique)
//! - `health_infrastructure_data` - health capacity (district unique)
//!
//! Two implementations share the [`DataAccess`] trait:
//!
//! - [`PgDataAccess`]: sqlx Postgres pool, fixed parameter-bound view queries,
//!   raw queries executed inside a `READ ONLY` transaction
//! - [`SnapshotDataAccess`]: in-memory copy of the four tables (JSON file or
//!   built in code), computing the same views in Rust
//!
//! Scorers never see SQL. They consume the typed views in [`views`], which
//! both implementations produce with identical semantics.

pub mod guard;
pub mod postgres;
pub mod records;
pub mod schema;
pub mod snapshot;
pub mod views;

pub use guard::{check_sql, validate_sql, GuardViolation};
pub use postgres::PgDataAccess;
pub use snapshot::{SnapshotDataAccess, Tables};
pub use views::{EquitySample, HealthView, InfrastructureView, TicketStats, WorkerRow};

use async_trait::async_trait;
use thiserror::Error;

/// One result row of a raw query, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors from the data access layer
#[derive(Debug, Error)]
pub enum DataError {
    /// Statement rejected by the syntactic safety guard before execution
    #[error("Query rejected by safety guard: {0}")]
    Rejected(#[from] GuardViolation),

    /// Any failure reported by the underlying store
    #[error("Database query execution failed: {0}")]
    Execution(String),

    /// Query exceeded the configured timeout
    #[error("Database query execution failed: timed out after {0}s")]
    Timeout(u64),

    /// The data source cannot answer this kind of query
    #[error("Query not supported by {source_name} data source: {sql}")]
    Unsupported { source_name: &'static str, sql: String },

    /// Snapshot file could not be read or parsed
    #[error("Failed to load snapshot from {path}: {message}")]
    Snapshot { path: String, message: String },
}

impl From<sqlx::Error> for DataError {
    fn from(e: sqlx::Error) -> Self {
        DataError::Execution(e.to_string())
    }
}

/// Read-only district data source.
///
/// Every method is a pure read of current state; nothing is cached between
/// calls. `district = None` means "all districts".
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Backend name for logging
    fn source_name(&self) -> &'static str;

    /// Validate and execute a raw read-only statement.
    async fn run_query(&self, sql: &str) -> Result<Vec<Row>, DataError>;

    /// Distinct, sorted district names across all four relations.
    async fn list_districts(&self) -> Result<Vec<String>, DataError>;

    /// Health infrastructure joined with population (HVI input).
    async fn health_views(&self, district: Option<&str>) -> Result<Vec<HealthView>, DataError>;

    /// Demographics/infrastructure joined with request counts (ISS input).
    async fn infrastructure_views(
        &self,
        district: Option<&str>,
    ) -> Result<Vec<InfrastructureView>, DataError>;

    /// Raw worker rows. Not unique per district.
    async fn worker_rows(&self, district: Option<&str>) -> Result<Vec<WorkerRow>, DataError>;

    /// Per-district ticket totals, escalations and mean resolution time.
    async fn ticket_stats(&self, district: Option<&str>) -> Result<Vec<TicketStats>, DataError>;

    /// Resolved/closed tickets joined with district literacy and income (SEL input).
    async fn equity_samples(&self, district: Option<&str>)
        -> Result<Vec<EquitySample>, DataError>;
}
