//! Songplay DWH - query catalog and runner for a Redshift star schema
//!
//! Provides:
//! - The statement catalog (drop, create, copy, insert and count groups)
//! - Configuration loading with environment overrides
//! - Validation of the values interpolated into COPY statements
//! - A warehouse backend seam and a sequential pipeline runner
//!
//! Building the catalog performs no I/O. Executing it needs a
//! [`WarehouseBackend`], normally [`warehouse::PostgresBackend`].

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod validation;
pub mod warehouse;

// Re-export commonly used types
pub use catalog::{QueryCatalog, Statement, StatementGroup, StatementKind, Table, TableKind};
pub use config::{ConfigError, ConfigResult, CopySources, DwhConfig};
pub use pipeline::{PipelineRunner, RunReport, StatementOutcome, TableCount};
pub use validation::{ValidationError, ValidationResult};
pub use warehouse::{
    OutputFormat, QueryResult, WarehouseBackend, WarehouseError, WarehouseResult,
    format_query_result,
};

#[cfg(feature = "postgres-backend")]
pub use warehouse::PostgresBackend;
