//! CLI binary entry point for songplay-dwh

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use songplay_dwh::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use songplay_dwh::cli::commands::run::{RunArgs, RunTarget, VerifyArgs, handle_run, handle_verify};
#[cfg(feature = "cli")]
use songplay_dwh::cli::commands::sql::{SqlArgs, SqlFormat, SqlGroup, handle_sql};
#[cfg(feature = "cli")]
use songplay_dwh::config::CONFIG_FILENAME;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "songplay-dwh")]
#[command(about = "Stage song play logs into a Redshift star schema")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print rendered SQL statements without connecting
    Sql {
        /// Statement group to print
        #[arg(value_enum, default_value = "all")]
        group: SqlGroupArg,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: SqlFormatArg,
    },

    /// Drop and recreate every table
    CreateTables {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the staging tables and populate the star schema
    Etl {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the row count of every table
    Verify {
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Debug)]
enum SqlGroupArg {
    Drop,
    Create,
    Copy,
    Insert,
    Count,
    All,
}

#[cfg(feature = "cli")]
#[derive(clap::ValueEnum, Clone, Debug)]
enum SqlFormatArg {
    Text,
    Json,
}

#[cfg(feature = "cli")]
fn convert_sql_group(group: SqlGroupArg) -> SqlGroup {
    match group {
        SqlGroupArg::Drop => SqlGroup::Drop,
        SqlGroupArg::Create => SqlGroup::Create,
        SqlGroupArg::Copy => SqlGroup::Copy,
        SqlGroupArg::Insert => SqlGroup::Insert,
        SqlGroupArg::Count => SqlGroup::Count,
        SqlGroupArg::All => SqlGroup::All,
    }
}

#[cfg(feature = "cli")]
fn convert_sql_format(format: SqlFormatArg) -> SqlFormat {
    match format {
        SqlFormatArg::Text => SqlFormat::Text,
        SqlFormatArg::Json => SqlFormat::Json,
    }
}

#[cfg(feature = "cli")]
fn main() {
    // Logs go to stderr so `sql` output can be piped
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init { force } => handle_init(&InitArgs { config, force }),
        Commands::Sql { group, format } => handle_sql(&SqlArgs {
            config,
            group: convert_sql_group(group),
            format: convert_sql_format(format),
        }),
        Commands::CreateTables { json } => handle_run(&RunArgs {
            config,
            target: RunTarget::CreateTables,
            json,
        }),
        Commands::Etl { json } => handle_run(&RunArgs {
            config,
            target: RunTarget::Etl,
            json,
        }),
        Commands::Verify { format } => handle_verify(&VerifyArgs { config, format }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
