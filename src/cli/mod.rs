//! Command line interface for the `songplay-dwh` binary

pub mod commands;
pub mod error;

pub use error::CliError;
