//! SQL command: prints rendered catalog statements
//!
//! Needs only the source values from the configuration; no warehouse
//! connection is made.

use std::path::PathBuf;

use crate::catalog::{QueryCatalog, Statement, StatementKind};
use crate::cli::error::CliError;
use crate::config::DwhConfig;

/// Which statements to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlGroup {
    Drop,
    Create,
    Copy,
    Insert,
    Count,
    /// Execution plan followed by the count queries
    All,
}

impl SqlGroup {
    fn kinds(&self) -> Vec<StatementKind> {
        match self {
            SqlGroup::Drop => vec![StatementKind::Drop],
            SqlGroup::Create => vec![StatementKind::Create],
            SqlGroup::Copy => vec![StatementKind::Copy],
            SqlGroup::Insert => vec![StatementKind::Insert],
            SqlGroup::Count => vec![StatementKind::Count],
            SqlGroup::All => {
                let mut kinds = StatementKind::EXECUTION_ORDER.to_vec();
                kinds.push(StatementKind::Count);
                kinds
            }
        }
    }
}

/// Output format for printed statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlFormat {
    /// `-- name` header followed by the statement
    #[default]
    Text,
    /// JSON array of statement objects
    Json,
}

/// SQL command arguments
#[derive(Debug, Clone)]
pub struct SqlArgs {
    pub config: PathBuf,
    pub group: SqlGroup,
    pub format: SqlFormat,
}

/// Render the selected statements of a catalog
pub fn render_statements(
    catalog: &QueryCatalog,
    group: SqlGroup,
    format: SqlFormat,
) -> Result<String, CliError> {
    let statements: Vec<&Statement> = group
        .kinds()
        .into_iter()
        .flat_map(|kind| catalog.group(kind).iter())
        .collect();

    match format {
        SqlFormat::Text => Ok(statements
            .iter()
            .map(|s| format!("-- {}\n{}\n", s.name(), s.sql()))
            .collect::<Vec<_>>()
            .join("\n")),
        SqlFormat::Json => serde_json::to_string_pretty(&statements)
            .map_err(|e| CliError::IoError(format!("Failed to serialize statements: {}", e))),
    }
}

/// Print the selected statements
pub fn handle_sql(args: &SqlArgs) -> Result<(), CliError> {
    let config = DwhConfig::load(&args.config)?;
    let catalog = QueryCatalog::new(&config)?;

    let output = render_statements(&catalog, args.group, args.format)?;
    println!("{}", output);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> QueryCatalog {
        QueryCatalog::new(&DwhConfig::with_sources(
            "s3://bucket/logs",
            "s3://bucket/songs",
            "arn:aws:iam::1:role/x",
        ))
        .unwrap()
    }

    #[test]
    fn test_render_text() {
        let output = render_statements(&catalog(), SqlGroup::Copy, SqlFormat::Text).unwrap();
        assert!(output.starts_with("-- staging_events_copy\nCOPY staging_events"));
        assert!(output.contains("-- staging_songs_copy\nCOPY staging_songs"));
        assert!(output.contains("'s3://bucket/songs'"));
    }

    #[test]
    fn test_render_all_includes_counts_last() {
        let output = render_statements(&catalog(), SqlGroup::All, SqlFormat::Text).unwrap();
        let drop = output.find("-- staging_events_table_drop").unwrap();
        let insert = output.find("-- time_table_insert").unwrap();
        let count = output.find("-- get_number_staging_events").unwrap();
        assert!(drop < insert && insert < count);
    }

    #[test]
    fn test_render_json() {
        let output = render_statements(&catalog(), SqlGroup::Insert, SqlFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0]["name"], "songplay_table_insert");
        assert_eq!(items[0]["kind"], "insert");
        assert_eq!(items[0]["table"], "songplays");
    }
}
