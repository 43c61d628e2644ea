//! Warehouse commands: create-tables, etl and verify
//!
//! Each command builds the catalog first, so configuration problems are
//! reported before any connection is attempted.

use std::path::PathBuf;

use crate::catalog::QueryCatalog;
use crate::cli::error::CliError;
use crate::config::DwhConfig;
use crate::pipeline::{PipelineRunner, RunReport, counts_to_result};
use crate::warehouse::{OutputFormat, PostgresBackend, WarehouseBackend, format_query_result};

/// Which group sequence to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTarget {
    /// Drop, then create
    CreateTables,
    /// Copy, then insert
    Etl,
}

/// create-tables / etl arguments
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: PathBuf,
    pub target: RunTarget,
    /// Print the run report as JSON
    pub json: bool,
}

/// verify arguments
#[derive(Debug, Clone)]
pub struct VerifyArgs {
    pub config: PathBuf,
    /// Output format (table, json, csv)
    pub format: String,
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

async fn connect(config: &DwhConfig) -> Result<PostgresBackend, CliError> {
    let settings = config.cluster_settings()?;
    Ok(PostgresBackend::connect(&settings).await?)
}

/// Summarize a run report for the terminal
pub fn format_report(report: &RunReport) -> String {
    let mut output = String::new();
    for outcome in &report.statements {
        output.push_str(&format!(
            "{:<28} {:>10} rows {:>8}ms\n",
            outcome.name, outcome.rows_affected, outcome.duration_ms
        ));
    }
    output.push_str(&format!(
        "Run {} complete: {} statements in {}ms",
        report.run_id,
        report.statement_count(),
        report.duration_ms
    ));
    output
}

/// Run a group sequence with an already loaded configuration
pub fn run_target(config: &DwhConfig, target: RunTarget) -> Result<RunReport, CliError> {
    let catalog = QueryCatalog::new(config)?;

    let rt = runtime()?;
    rt.block_on(async {
        let backend = connect(config).await?;
        let runner = PipelineRunner::new(&catalog, backend);

        let report = match target {
            RunTarget::CreateTables => runner.create_tables().await,
            RunTarget::Etl => runner.run_etl().await,
        };
        runner.backend().close().await?;

        Ok::<_, CliError>(report?)
    })
}

/// Run create-tables or etl against the configured cluster
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    let config = DwhConfig::load(&args.config)?;
    let report = run_target(&config, args.target)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::IoError(format!("Failed to serialize report: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", format_report(&report));
    }

    Ok(())
}

/// Print row counts of every table
pub fn handle_verify(args: &VerifyArgs) -> Result<(), CliError> {
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let config = DwhConfig::load(&args.config)?;
    let catalog = QueryCatalog::new(&config)?;

    let rt = runtime()?;
    let counts = rt.block_on(async {
        let backend = connect(&config).await?;
        let runner = PipelineRunner::new(&catalog, backend);

        let counts = runner.verify().await;
        runner.backend().close().await?;

        Ok::<_, CliError>(counts?)
    })?;

    println!("{}", format_query_result(&counts_to_result(&counts), output_format));

    Ok(())
}
