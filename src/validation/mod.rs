//! Validation functionality
//!
//! Provides validation and quoting for configuration values that are
//! embedded into warehouse statements.

pub mod input;

pub use input::{
    ValidationError, ValidationResult, quote_literal, unwrap_quoted, validate_iam_role_arn,
    validate_region, validate_s3_uri,
};
