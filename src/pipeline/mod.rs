//! Sequential execution of catalog statement groups
//!
//! The runner takes statements from a [`QueryCatalog`] in group order and
//! sends them one at a time to a [`WarehouseBackend`]. It stops at the first
//! statement that fails; nothing is retried and nothing is rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{QueryCatalog, Statement, StatementKind, Table};
use crate::warehouse::{QueryResult, WarehouseBackend, WarehouseError, WarehouseResult};

/// Outcome of one executed statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementOutcome {
    /// Logical statement name, e.g. `songplay_table_insert`
    pub name: String,
    /// Table the statement targets
    pub table: String,
    /// Statement group
    pub kind: String,
    /// Rows reported by the warehouse, 0 for DDL
    pub rows_affected: u64,
    /// Execution time in milliseconds
    pub duration_ms: u64,
}

/// Report of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier of this run, used to correlate log lines
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Executed statements, in order
    pub statements: Vec<StatementOutcome>,
    /// Duration of the whole run in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            statements: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Number of executed statements
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    /// Total rows reported across all statements
    pub fn total_rows(&self) -> u64 {
        self.statements.iter().map(|s| s.rows_affected).sum()
    }

    /// Statement names in execution order
    pub fn statement_names(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Row count of one warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub count: i64,
}

/// Shape table counts as a result set for [`crate::warehouse::format_query_result`]
pub fn counts_to_result(counts: &[TableCount]) -> QueryResult {
    let rows = counts
        .iter()
        .map(|c| serde_json::json!({ "table": c.table, "count": c.count }))
        .collect();
    QueryResult::new(vec!["table".to_string(), "count".to_string()], rows)
}

/// Runs catalog groups against a warehouse
pub struct PipelineRunner<'a, B: WarehouseBackend> {
    catalog: &'a QueryCatalog,
    backend: B,
}

impl<'a, B: WarehouseBackend> PipelineRunner<'a, B> {
    pub fn new(catalog: &'a QueryCatalog, backend: B) -> Self {
        Self { catalog, backend }
    }

    pub fn catalog(&self) -> &QueryCatalog {
        self.catalog
    }

    /// Get reference to the warehouse backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Drop every table, then create every table
    pub async fn create_tables(&self) -> WarehouseResult<RunReport> {
        self.run_groups(&[StatementKind::Drop, StatementKind::Create]).await
    }

    /// Bulk-load the staging tables
    pub async fn load_staging(&self) -> WarehouseResult<RunReport> {
        self.run_groups(&[StatementKind::Copy]).await
    }

    /// Populate the star schema from the staging tables
    pub async fn insert_tables(&self) -> WarehouseResult<RunReport> {
        self.run_groups(&[StatementKind::Insert]).await
    }

    /// Load staging, then insert
    pub async fn run_etl(&self) -> WarehouseResult<RunReport> {
        self.run_groups(&[StatementKind::Copy, StatementKind::Insert]).await
    }

    /// Count the rows of every table
    pub async fn verify(&self) -> WarehouseResult<Vec<TableCount>> {
        let mut counts = Vec::with_capacity(Table::ALL.len());

        for statement in self.catalog.count_statements() {
            tracing::debug!("{}: {}", statement.name(), statement.sql());
            let result = self
                .backend
                .query(statement.sql())
                .await
                .map_err(|e| statement_failed(statement, e))?;

            let count = result.scalar_i64().ok_or_else(|| WarehouseError::StatementFailed {
                statement: statement.name().to_string(),
                message: "count query returned no integer".to_string(),
            })?;

            tracing::info!(table = %statement.table(), count, "Verified table");
            counts.push(TableCount {
                table: statement.table().name().to_string(),
                count,
            });
        }

        Ok(counts)
    }

    async fn run_groups(&self, kinds: &[StatementKind]) -> WarehouseResult<RunReport> {
        let start = std::time::Instant::now();
        let mut report = RunReport::new();

        tracing::info!(
            run_id = %report.run_id,
            backend = self.backend.backend_type(),
            "Starting run: {}",
            kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        );

        for kind in kinds {
            for statement in self.catalog.group(*kind) {
                let outcome = self.execute(statement).await.inspect_err(|e| {
                    tracing::warn!(run_id = %report.run_id, "Run stopped: {}", e);
                })?;
                report.statements.push(outcome);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %report.run_id,
            statements = report.statement_count(),
            duration_ms = report.duration_ms,
            "Run complete"
        );

        Ok(report)
    }

    async fn execute(&self, statement: &Statement) -> WarehouseResult<StatementOutcome> {
        let start = std::time::Instant::now();
        tracing::debug!("{}: {}", statement.name(), statement.sql());

        let rows_affected = self
            .backend
            .execute(statement.sql())
            .await
            .map_err(|e| statement_failed(statement, e))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            statement = statement.name(),
            rows_affected,
            duration_ms,
            "Executed statement"
        );

        Ok(StatementOutcome {
            name: statement.name().to_string(),
            table: statement.table().name().to_string(),
            kind: statement.kind().as_str().to_string(),
            rows_affected,
            duration_ms,
        })
    }
}

fn statement_failed(statement: &Statement, err: WarehouseError) -> WarehouseError {
    match err {
        WarehouseError::QueryFailed(message) => WarehouseError::StatementFailed {
            statement: statement.name().to_string(),
            message,
        },
        other => other,
    }
}
