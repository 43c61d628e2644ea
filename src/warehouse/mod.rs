//! Warehouse backend abstraction
//!
//! The catalog only produces text. Running it needs a connection to the
//! warehouse, which is provided by a [`WarehouseBackend`]:
//! - PostgreSQL wire protocol (Redshift) via `tokio-postgres`
//! - in-memory doubles in tests
//!
//! Backends execute one statement at a time and never retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "postgres-backend")]
pub mod postgres;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresBackend;

use crate::config::ConfigError;

/// Error type for warehouse operations
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Failed to connect to the warehouse
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A catalog statement failed to execute
    #[error("Statement '{statement}' failed: {message}")]
    StatementFailed { statement: String, message: String },

    /// An ad hoc query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for warehouse operations
pub type WarehouseResult<T> = Result<T, WarehouseError>;

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/COPY/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row as an integer, as returned by `COUNT(*)`
    pub fn scalar_i64(&self) -> Option<i64> {
        let column = self.columns.first()?;
        let value = self.rows.first()?.get(column)?;
        match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Warehouse backend trait
///
/// All operations are async; implementations hold a single connection.
#[async_trait(?Send)]
pub trait WarehouseBackend {
    /// Execute a statement that returns no rows (DDL, COPY, INSERT)
    ///
    /// # Returns
    /// Number of rows affected, 0 when the warehouse does not report one
    async fn execute(&self, sql: &str) -> WarehouseResult<u64>;

    /// Execute a query and return its rows
    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult>;

    /// Check if the warehouse is reachable
    async fn health_check(&self) -> WarehouseResult<bool> {
        let result = self.query("SELECT 1 AS healthy").await?;
        Ok(!result.is_empty())
    }

    /// Backend type name
    fn backend_type(&self) -> &'static str;

    /// Close the connection
    async fn close(&self) -> WarehouseResult<()>;
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// RFC 4180 quoting; NULL is an empty field
fn csv_field(value: &serde_json::Value) -> String {
    if value.is_null() {
        return String::new();
    }
    let text = cell_text(value);
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let header = result.columns.join(",");
    let lines = result.rows.iter().map(|row| {
        result
            .columns
            .iter()
            .map(|col| csv_field(row.get(col).unwrap_or(&serde_json::Value::Null)))
            .collect::<Vec<_>>()
            .join(",")
    });

    std::iter::once(header)
        .chain(lines)
        .map(|line| line + "\n")
        .collect()
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| cell_text(row.get(col).unwrap_or(&serde_json::Value::Null)))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |values: &[String]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", v, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut output = String::new();
    output.push_str(&render(&result.columns));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &cells {
        output.push_str(&render(row));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(OutputFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty();
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
        assert_eq!(result.scalar_i64(), None);
    }

    #[test]
    fn test_scalar_i64() {
        let result = QueryResult::new(
            vec!["count".to_string()],
            vec![serde_json::json!({"count": 8056})],
        );
        assert_eq!(result.scalar_i64(), Some(8056));

        let result = QueryResult::new(
            vec!["count".to_string()],
            vec![serde_json::json!({"count": "42"})],
        );
        assert_eq!(result.scalar_i64(), Some(42));
    }

    #[test]
    fn test_format_as_table() {
        let result = QueryResult::new(
            vec!["table".to_string(), "count".to_string()],
            vec![
                serde_json::json!({"table": "songplays", "count": 333}),
                serde_json::json!({"table": "users", "count": 104}),
            ],
        );

        let output = format_as_table(&result);
        assert!(output.starts_with("table     | count"));
        assert!(output.contains("songplays | 333"));
        assert!(output.contains("(2 rows)"));
    }

    #[test]
    fn test_format_as_csv() {
        let result = QueryResult::new(
            vec!["name".to_string(), "location".to_string()],
            vec![
                serde_json::json!({"name": "Casual", "location": null}),
                serde_json::json!({"name": "Blue Rodeo", "location": "Toronto, Canada"}),
            ],
        );

        let output = format_as_csv(&result);
        assert!(output.contains("name,location"));
        assert!(output.contains("Casual,\n"));
        assert!(output.contains("\"Toronto, Canada\""));
    }

    #[test]
    fn test_csv_field_quotes_embedded_quotes() {
        assert_eq!(csv_field(&serde_json::json!("say \"hi\"")), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field(&serde_json::json!(8056)), "8056");
        assert_eq!(csv_field(&serde_json::Value::Null), "");
    }
}
