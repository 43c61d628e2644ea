//! Input validation and quoting utilities.
//!
//! Configuration values end up inside COPY statements, which the warehouse
//! cannot parameterize. Every value is therefore checked against a strict
//! format here and then rendered as an escaped string literal.
//!
//! # Security
//!
//! Input validation prevents:
//! - SQL injection via crafted S3 locations or role identifiers
//! - Statement smuggling via quotes, separators or comment markers
//! - Excessively long inputs

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length for an S3 location
pub const MAX_LOCATION_LENGTH: usize = 1024;

/// Maximum length for an IAM role ARN
pub const MAX_ARN_LENGTH: usize = 2048;

static S3_BUCKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("valid regex"));

static IAM_ROLE_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws(-[a-z]+)*:iam::[0-9]+:role/[A-Za-z0-9+=,.@_/\-]+$").expect("valid regex")
});

static REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]$").expect("valid regex"));

/// Errors that can occur during input validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an S3 location such as `s3://udacity-dend/log_data`.
///
/// # Rules
///
/// - Must use the `s3://` scheme
/// - Bucket name: 3-63 characters of lowercase letters, digits, dots and hyphens
/// - Key prefix (optional): no whitespace, quotes, backslashes, braces or control characters
///
/// # Examples
///
/// ```
/// use songplay_dwh::validation::input::validate_s3_uri;
///
/// assert!(validate_s3_uri("s3://udacity-dend/log_data").is_ok());
/// assert!(validate_s3_uri("s3://bucket").is_ok());
/// assert!(validate_s3_uri("https://bucket/logs").is_err());
/// assert!(validate_s3_uri("s3://bucket/x' iam_role 'y").is_err());
/// ```
pub fn validate_s3_uri(uri: &str) -> ValidationResult<()> {
    if uri.is_empty() {
        return Err(ValidationError::Empty("S3 location"));
    }

    if uri.len() > MAX_LOCATION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "S3 location",
            max: MAX_LOCATION_LENGTH,
            actual: uri.len(),
        });
    }

    let rest = uri.strip_prefix("s3://").ok_or_else(|| {
        ValidationError::InvalidFormat("S3 location", "must start with 's3://'".to_string())
    })?;

    let (bucket, key) = match rest.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (rest, ""),
    };

    if !S3_BUCKET.is_match(bucket) {
        return Err(ValidationError::InvalidFormat(
            "S3 location",
            format!("invalid bucket name: '{}'", bucket),
        ));
    }

    if let Some(c) = key.chars().find(|c| {
        c.is_whitespace() || c.is_control() || matches!(c, '\'' | '"' | '\\' | ';' | '{' | '}')
    }) {
        return Err(ValidationError::InvalidCharacters {
            field: "S3 location",
            reason: format!("invalid character: {:?}", c),
        });
    }

    Ok(())
}

/// Validate an IAM role ARN such as `arn:aws:iam::123456789012:role/dwhRole`.
///
/// ```
/// use songplay_dwh::validation::input::validate_iam_role_arn;
///
/// assert!(validate_iam_role_arn("arn:aws:iam::123456789012:role/dwhRole").is_ok());
/// assert!(validate_iam_role_arn("arn:aws:s3:::bucket").is_err());
/// ```
pub fn validate_iam_role_arn(arn: &str) -> ValidationResult<()> {
    if arn.is_empty() {
        return Err(ValidationError::Empty("IAM role ARN"));
    }

    if arn.len() > MAX_ARN_LENGTH {
        return Err(ValidationError::TooLong {
            field: "IAM role ARN",
            max: MAX_ARN_LENGTH,
            actual: arn.len(),
        });
    }

    if !IAM_ROLE_ARN.is_match(arn) {
        return Err(ValidationError::InvalidFormat(
            "IAM role ARN",
            "expected arn:aws:iam::<account>:role/<name>".to_string(),
        ));
    }

    Ok(())
}

/// Validate an AWS region name such as `us-west-2`.
pub fn validate_region(region: &str) -> ValidationResult<()> {
    if region.is_empty() {
        return Err(ValidationError::Empty("region"));
    }

    if !REGION.is_match(region) {
        return Err(ValidationError::InvalidFormat(
            "region",
            format!("'{}' is not an AWS region name", region),
        ));
    }

    Ok(())
}

/// Render a value as a single-quoted SQL string literal.
///
/// Redshift treats a backslash inside a literal as an escape character, so
/// backslashes are doubled before quote characters are.
///
/// ```
/// use songplay_dwh::validation::input::quote_literal;
///
/// assert_eq!(quote_literal("auto"), "'auto'");
/// assert_eq!(quote_literal("it's"), "'it''s'");
/// assert_eq!(quote_literal(r"a\"), r"'a\\'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Strip one pair of surrounding single quotes, if present.
///
/// Older `dwh.cfg` files store locations pre-quoted for direct string
/// formatting (`LOG_DATA='s3://udacity-dend/log_data'`).
pub fn unwrap_quoted(value: &str) -> &str {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s3_uri_accepts_bucket_and_prefix() {
        assert!(validate_s3_uri("s3://bucket/logs").is_ok());
        assert!(validate_s3_uri("s3://udacity-dend/song_data/A/B").is_ok());
        assert!(validate_s3_uri("s3://my.bucket-01").is_ok());
    }

    #[test]
    fn test_s3_uri_rejects_bad_input() {
        assert_eq!(
            validate_s3_uri(""),
            Err(ValidationError::Empty("S3 location"))
        );
        assert!(validate_s3_uri("bucket/logs").is_err());
        assert!(validate_s3_uri("s3://UPPER/logs").is_err());
        assert!(validate_s3_uri("s3://ab").is_err());
        assert!(validate_s3_uri("s3://bucket/with space").is_err());
        assert!(validate_s3_uri("s3://bucket/a';DROP TABLE users;--").is_err());
        assert!(validate_s3_uri("s3://bucket/{song_data}").is_err());
    }

    #[test]
    fn test_s3_uri_too_long() {
        let uri = format!("s3://bucket/{}", "a".repeat(MAX_LOCATION_LENGTH));
        assert!(matches!(
            validate_s3_uri(&uri),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_iam_role_arn() {
        assert!(validate_iam_role_arn("arn:aws:iam::1:role/x").is_ok());
        assert!(validate_iam_role_arn("arn:aws-us-gov:iam::123456789012:role/path/dwh").is_ok());
        assert!(validate_iam_role_arn("").is_err());
        assert!(validate_iam_role_arn("arn:aws:iam::abc:role/x").is_err());
        assert!(validate_iam_role_arn("arn:aws:iam::1:user/x").is_err());
        assert!(validate_iam_role_arn("arn:aws:iam::1:role/x' region 'eu").is_err());
    }

    #[test]
    fn test_region() {
        assert!(validate_region("us-west-2").is_ok());
        assert!(validate_region("us-gov-west-1").is_ok());
        assert!(validate_region("west").is_err());
        assert!(validate_region("").is_err());
    }

    #[test]
    fn test_quote_literal_escapes_quotes() {
        assert_eq!(quote_literal("s3://bucket/logs"), "'s3://bucket/logs'");
        assert_eq!(quote_literal("a'b"), "'a''b'");
    }

    #[test]
    fn test_quote_literal_escapes_backslashes() {
        // A trailing backslash must not escape the closing quote
        assert_eq!(quote_literal(r"a\"), r"'a\\'");
        assert_eq!(quote_literal(r"x\'y"), r"'x\\''y'");
    }

    #[test]
    fn test_unwrap_quoted() {
        assert_eq!(unwrap_quoted("'s3://bucket/logs'"), "s3://bucket/logs");
        assert_eq!(unwrap_quoted("  s3://bucket/logs "), "s3://bucket/logs");
        assert_eq!(unwrap_quoted("'"), "'");
    }
}
