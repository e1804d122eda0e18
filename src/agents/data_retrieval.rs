//! Data Retrieval Agent
//!
//! Natural language → SQL → guard → execute. Districts named in the question
//! are reported alongside the rows so that an empty result for a named
//! district reads as "found nothing", not as a failure.

use std::sync::Arc;

use async_trait::async_trait;

use super::{district_match, AgentError, AgentKind, AgentPayload, AgentRequest, QueryRows, Specialist};
use crate::data::schema::{table_schema, TableSchema};
use crate::data::{check_sql, DataAccess};
use crate::llm::SqlGenerator;

pub const ACTION_QUERY: &str = "query";

pub struct DataRetrievalAgent {
    data: Arc<dyn DataAccess>,
    sql: Arc<dyn SqlGenerator>,
}

impl DataRetrievalAgent {
    pub fn new(data: Arc<dyn DataAccess>, sql: Arc<dyn SqlGenerator>) -> Self {
        Self { data, sql }
    }

    pub fn get_table_schema(&self, table_name: &str) -> Option<&'static TableSchema> {
        table_schema(table_name)
    }

    async fn retrieve(&self, query: &str, table_hint: Option<&str>) -> Result<QueryRows, AgentError> {
        let districts = match self.data.list_districts().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "District list unavailable, skipping mention detection");
                Vec::new()
            }
        };
        let mentioned = district_match::mentioned_districts(query, &districts);

        let sql = self.sql.generate(query, table_hint).await?;
        if let Err(violation) = check_sql(&sql) {
            return Err(AgentError::Rejected { sql, violation });
        }

        let rows = self.data.run_query(&sql).await?;
        let row_count = rows.len();
        tracing::info!(rows = row_count, mentioned = ?mentioned, "Data retrieval query executed");

        let note = (row_count == 0 && !mentioned.is_empty()).then(|| {
            format!(
                "Query executed but returned no results for districts: {}",
                mentioned.join(", ")
            )
        });

        Ok(QueryRows {
            sql_query: sql,
            rows,
            row_count,
            mentioned_districts: mentioned,
            note,
        })
    }
}

#[async_trait]
impl Specialist for DataRetrievalAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::DataRetrieval
    }

    fn orchestrated_action(&self) -> &'static str {
        ACTION_QUERY
    }

    async fn run(&self, request: &AgentRequest<'_>) -> Result<AgentPayload, AgentError> {
        if request.action != ACTION_QUERY {
            return Err(AgentError::UnknownAction(request.action.to_string()));
        }
        self.retrieve(request.query, request.table_hint)
            .await
            .map(AgentPayload::Rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SnapshotDataAccess, Tables};
    use crate::llm::LlmError;

    struct FixedSql(&'static str);

    #[async_trait]
    impl SqlGenerator for FixedSql {
        async fn generate(&self, _q: &str, _hint: Option<&str>) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn source() -> Arc<dyn DataAccess> {
        let tables: Tables = serde_json::from_value(serde_json::json!({
            "area_wise_demographics_infrastructure": [
                {"District": "Pune", "Population": 900000, "Roads_Km": 1200.0},
                {"District": "Latur", "Population": 300000, "Roads_Km": 400.0}
            ]
        }))
        .expect("fixture parses");
        Arc::new(SnapshotDataAccess::new(tables))
    }

    fn agent(sql: &'static str) -> DataRetrievalAgent {
        DataRetrievalAgent::new(source(), Arc::new(FixedSql(sql)))
    }

    #[tokio::test]
    async fn test_rows_and_mentions() {
        let a = agent("SELECT * FROM area_wise_demographics_infrastructure WHERE \"District\" = 'Pune'");
        let r = a
            .execute(&AgentRequest::new("population of pune", None, ACTION_QUERY))
            .await;
        assert!(r.success, "{:?}", r.error);
        let rows = r.rows().expect("rows payload");
        assert_eq!(rows.row_count, 1);
        assert_eq!(rows.mentioned_districts, vec!["Pune"]);
        assert!(rows.note.is_none());
    }

    #[tokio::test]
    async fn test_empty_result_for_named_district_is_success_with_note() {
        let a = agent("SELECT * FROM health_infrastructure_data WHERE \"District\" = 'Latur'");
        let r = a
            .execute(&AgentRequest::new("hospital beds in Latur", None, ACTION_QUERY))
            .await;
        assert!(r.success);
        let rows = r.rows().expect("rows payload");
        assert_eq!(rows.row_count, 0);
        assert_eq!(
            rows.note.as_deref(),
            Some("Query executed but returned no results for districts: Latur")
        );
    }

    #[tokio::test]
    async fn test_unsafe_sql_is_rejected_before_execution() {
        let a = agent("DELETE FROM public_workers_data");
        let r = a
            .execute(&AgentRequest::new("remove workers", None, ACTION_QUERY))
            .await;
        assert!(!r.success);
        let error = r.error.expect("error text");
        assert!(error.contains("failed validation"), "{error}");
        assert!(error.contains("DELETE FROM public_workers_data"));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let r = agent("SELECT 1")
            .execute(&AgentRequest::new("x", None, "forecast"))
            .await;
        assert_eq!(r.error.as_deref(), Some("Unknown action: forecast"));
    }

    #[test]
    fn test_schema_lookup() {
        let a = agent("SELECT 1");
        assert!(a.get_table_schema("public_workers_data").is_some());
        assert!(a.get_table_schema("nope").is_none());
    }
}
