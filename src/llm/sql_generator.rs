//! Natural language → SQL generation.
//!
//! The generated statement is not trusted: callers pass it through the data
//! layer's guard before execution.

use std::sync::Arc;

use async_trait::async_trait;

use super::json::strip_code_fences;
use super::{LlmBackend, LlmError};
use crate::data::schema::schema_context;

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Turn a question into one PostgreSQL statement.
    async fn generate(&self, question: &str, table_hint: Option<&str>) -> Result<String, LlmError>;
}

const SQL_RULES: &str = r#"CRITICAL DATABASE RULES:
1. All column names are case-sensitive and MUST be quoted with double quotes (e.g., "District", "Escalated").
2. Columns living in different tables require a JOIN on "District". Use aliases h, a, w, s.
3. "Escalated" in service_request_details is TEXT. Compare with
   CASE WHEN LOWER(TRIM("Escalated"::text)) IN ('true', 't', '1', 'yes') THEN 1 ELSE 0 END
4. "District" is NOT unique in public_workers_data. Aggregate it first:
   SELECT "District", SUM("Total_Workers") AS total_workers, AVG("Utilization_Rate_Percentage") AS avg_utilization
   FROM public_workers_data GROUP BY "District"
   and JOIN that subquery to other tables.
5. For "all districts", "across districts", "which district" questions, do not filter by a single district; GROUP BY "District" and ORDER BY to rank.
6. For "compare X and Y", use WHERE "District" IN ('X', 'Y') and group by district.
7. Only a single SELECT statement. No comments, no semicolon-chained statements.
8. Return only the SQL query, no explanations."#;

/// Prompt for one question.
pub fn build_prompt(question: &str, table_hint: Option<&str>) -> String {
    let focus = table_hint
        .map(|t| format!("Focus on table: {t}\n"))
        .unwrap_or_default();
    format!(
        "You are a SQL expert. Convert the following natural language query into a PostgreSQL query.\n\n\
         {schema}\n\
         Natural Language Query: {question}\n\
         {focus}\n\
         {SQL_RULES}\n\n\
         SQL Query:",
        schema = schema_context(),
    )
}

/// Strip fences, a leading "SQL:" label and trailing whitespace.
pub fn clean_sql(raw: &str) -> String {
    let body = strip_code_fences(raw);
    let body = body
        .strip_prefix("SQL Query:")
        .or_else(|| body.strip_prefix("SQL:"))
        .unwrap_or(body);
    body.trim().trim_matches('`').trim().to_string()
}

/// SQL generator backed by the configured SQL model.
#[derive(Clone)]
pub struct LlmSqlGenerator {
    backend: Arc<dyn LlmBackend>,
}

impl LlmSqlGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, question: &str, table_hint: Option<&str>) -> Result<String, LlmError> {
        let raw = self.backend.generate(&build_prompt(question, table_hint)).await?;
        let sql = clean_sql(&raw);
        if sql.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        tracing::debug!(backend = self.backend.backend_name(), sql = %sql, "SQL generated");
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmBackend for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }

        fn backend_name(&self) -> &'static str {
            "canned"
        }
    }

    #[test]
    fn test_clean_sql() {
        assert_eq!(
            clean_sql("```sql\nSELECT * FROM health_infrastructure_data\n```"),
            "SELECT * FROM health_infrastructure_data"
        );
        assert_eq!(clean_sql("SQL: SELECT 1"), "SELECT 1");
        assert_eq!(clean_sql("   "), "");
    }

    #[test]
    fn test_prompt_carries_schema_and_hint() {
        let p = build_prompt("beds in Pune", Some("health_infrastructure_data"));
        assert!(p.contains("Table: health_infrastructure_data"));
        assert!(p.contains("Focus on table: health_infrastructure_data"));
        assert!(p.contains("Natural Language Query: beds in Pune"));
        assert!(!build_prompt("x", None).contains("Focus on table"));
    }

    #[tokio::test]
    async fn test_generate_cleans_output() {
        let generator = LlmSqlGenerator::new(Arc::new(Canned("```\nSELECT \"District\" FROM public_workers_data\n```")));
        let sql = generator.generate("districts", None).await.expect("sql");
        assert_eq!(sql, "SELECT \"District\" FROM public_workers_data");
    }

    #[tokio::test]
    async fn test_blank_output_is_an_error() {
        let generator = LlmSqlGenerator::new(Arc::new(Canned("```\n```")));
        assert!(matches!(
            generator.generate("x", None).await,
            Err(LlmError::EmptyResponse)
        ));
    }
}
