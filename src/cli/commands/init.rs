//! Init command: writes a sample `dwh.toml`

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::sample_config;

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Where to write the configuration
    pub config: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
}

/// Write the sample configuration file
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    if args.config.exists() && !args.force {
        return Err(CliError::ConfigExists(args.config.clone()));
    }

    if let Some(parent) = args.config.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::IoError(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    std::fs::write(&args.config, sample_config()).map_err(|e| {
        CliError::IoError(format!("Failed to write {}: {}", args.config.display(), e))
    })?;

    tracing::info!("Wrote sample configuration to {}", args.config.display());
    println!("Created {}", args.config.display());
    println!("Fill in [cluster], [iam_role] and [s3] before running create-tables or etl.");

    Ok(())
}
