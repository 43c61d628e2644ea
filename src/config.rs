//! Warehouse configuration file support
//!
//! Handles parsing of `dwh.toml` configuration files and environment
//! variable overrides. The configuration is loaded once at start-up and is
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::TemplateError;
use crate::validation::{
    ValidationError, unwrap_quoted, validate_iam_role_arn, validate_region, validate_s3_uri,
};

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "dwh.toml";

/// Default AWS region of the source buckets
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default Redshift port
pub const DEFAULT_PORT: u16 = 5439;

/// Environment variable for the event log location
pub const ENV_LOG_DATA: &str = "DWH_LOG_DATA";

/// Environment variable for the song metadata location
pub const ENV_SONG_DATA: &str = "DWH_SONG_DATA";

/// Environment variable for the event log JSONPaths file
pub const ENV_LOG_JSONPATH: &str = "DWH_LOG_JSONPATH";

/// Environment variable for the bucket region
pub const ENV_REGION: &str = "DWH_REGION";

/// Environment variable for the IAM role ARN
pub const ENV_IAM_ROLE_ARN: &str = "DWH_IAM_ROLE_ARN";

/// Environment variable for the cluster endpoint
pub const ENV_HOST: &str = "DWH_HOST";

/// Environment variable for the cluster port
pub const ENV_PORT: &str = "DWH_PORT";

/// Environment variable for the database name
pub const ENV_DB_NAME: &str = "DWH_DB_NAME";

/// Environment variable for the database user
pub const ENV_DB_USER: &str = "DWH_DB_USER";

/// Environment variable for the database password
pub const ENV_DB_PASSWORD: &str = "DWH_DB_PASSWORD";

/// Error type for configuration loading and validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required field is absent or blank
    #[error("Missing configuration field: [{section}] {key}")]
    MissingField {
        section: &'static str,
        key: &'static str,
    },

    /// A field is present but its value is not acceptable
    #[error("Invalid configuration field [{section}] {key}: {reason}")]
    InvalidField {
        section: &'static str,
        key: &'static str,
        reason: String,
    },

    /// The configuration file could not be read or written
    #[error("IO error: {0}")]
    Io(String),

    /// The configuration file is not valid TOML
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A statement template needs a value the configuration does not supply
    #[error("Statement template error: {0}")]
    Template(#[from] TemplateError),
}

impl ConfigError {
    fn invalid(section: &'static str, key: &'static str, err: ValidationError) -> Self {
        ConfigError::InvalidField {
            section,
            key,
            reason: err.to_string(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Cluster connection section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Cluster endpoint
    #[serde(default)]
    pub host: Option<String>,

    /// Cluster port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(default)]
    pub db_name: Option<String>,

    /// Database user
    #[serde(default)]
    pub db_user: Option<String>,

    /// Database password
    #[serde(default)]
    pub db_password: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            db_name: None,
            db_user: None,
            db_password: None,
        }
    }
}

/// IAM role section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IamRoleSection {
    /// Role the warehouse assumes to read the source buckets
    #[serde(default)]
    pub arn: Option<String>,
}

/// S3 source section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Section {
    /// Event log location
    #[serde(default)]
    pub log_data: Option<String>,

    /// Song metadata location
    #[serde(default)]
    pub song_data: Option<String>,

    /// JSONPaths file describing the event log layout; `auto` when absent
    #[serde(default)]
    pub log_jsonpath: Option<String>,

    /// Region of the source buckets
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for S3Section {
    fn default() -> Self {
        Self {
            log_data: None,
            song_data: None,
            log_jsonpath: None,
            region: default_region(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `dwh.toml` configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DwhConfig {
    /// Cluster connection settings
    #[serde(default)]
    pub cluster: ClusterSection,

    /// IAM role settings
    #[serde(default)]
    pub iam_role: IamRoleSection,

    /// S3 source settings
    #[serde(default)]
    pub s3: S3Section,
}

/// Validated values needed to render the COPY statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySources {
    pub log_data: String,
    pub song_data: String,
    pub log_jsonpath: Option<String>,
    pub iam_role_arn: String,
    pub region: String,
}

/// Validated connection settings for the warehouse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
}

impl ClusterSettings {
    /// Connection description for logs; the password is never included
    pub fn connection_string_masked(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=****",
            self.host, self.port, self.db_name, self.db_user
        )
    }
}

fn required(
    value: &Option<String>,
    section: &'static str,
    key: &'static str,
) -> ConfigResult<String> {
    match value.as_deref().map(unwrap_quoted) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::MissingField { section, key }),
    }
}

impl DwhConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with the three required source values
    pub fn with_sources(
        log_data: impl Into<String>,
        song_data: impl Into<String>,
        iam_role_arn: impl Into<String>,
    ) -> Self {
        Self {
            iam_role: IamRoleSection {
                arn: Some(iam_role_arn.into()),
            },
            s3: S3Section {
                log_data: Some(log_data.into()),
                song_data: Some(song_data.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from a file
    ///
    /// A missing file is not an error: defaults are used and environment
    /// overrides still apply. Required fields are checked later, when the
    /// catalog is built.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read a configuration file without environment overrides
    pub fn read(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Io(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_LOG_DATA) {
            self.s3.log_data = Some(v);
        }
        if let Some(v) = lookup(ENV_SONG_DATA) {
            self.s3.song_data = Some(v);
        }
        if let Some(v) = lookup(ENV_LOG_JSONPATH) {
            self.s3.log_jsonpath = Some(v);
        }
        if let Some(v) = lookup(ENV_REGION) {
            self.s3.region = v;
        }
        if let Some(v) = lookup(ENV_IAM_ROLE_ARN) {
            self.iam_role.arn = Some(v);
        }
        if let Some(v) = lookup(ENV_HOST) {
            self.cluster.host = Some(v);
        }
        if let Some(port) = lookup(ENV_PORT)
            && let Ok(port) = port.parse()
        {
            self.cluster.port = port;
        }
        if let Some(v) = lookup(ENV_DB_NAME) {
            self.cluster.db_name = Some(v);
        }
        if let Some(v) = lookup(ENV_DB_USER) {
            self.cluster.db_user = Some(v);
        }
        if let Some(v) = lookup(ENV_DB_PASSWORD) {
            self.cluster.db_password = Some(v);
        }
    }

    /// Validate and extract the values the COPY statements need
    pub fn copy_sources(&self) -> ConfigResult<CopySources> {
        let log_data = required(&self.s3.log_data, "s3", "log_data")?;
        let song_data = required(&self.s3.song_data, "s3", "song_data")?;
        let iam_role_arn = required(&self.iam_role.arn, "iam_role", "arn")?;

        validate_s3_uri(&log_data).map_err(|e| ConfigError::invalid("s3", "log_data", e))?;
        validate_s3_uri(&song_data).map_err(|e| ConfigError::invalid("s3", "song_data", e))?;
        validate_iam_role_arn(&iam_role_arn)
            .map_err(|e| ConfigError::invalid("iam_role", "arn", e))?;

        let log_jsonpath = match self.s3.log_jsonpath.as_deref().map(unwrap_quoted) {
            Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("auto") => {
                validate_s3_uri(v).map_err(|e| ConfigError::invalid("s3", "log_jsonpath", e))?;
                Some(v.to_string())
            }
            _ => None,
        };

        let region = unwrap_quoted(&self.s3.region).to_string();
        validate_region(&region).map_err(|e| ConfigError::invalid("s3", "region", e))?;

        Ok(CopySources {
            log_data,
            song_data,
            log_jsonpath,
            iam_role_arn,
            region,
        })
    }

    /// Validate and extract the cluster connection settings
    pub fn cluster_settings(&self) -> ConfigResult<ClusterSettings> {
        Ok(ClusterSettings {
            host: required(&self.cluster.host, "cluster", "host")?,
            port: self.cluster.port,
            db_name: required(&self.cluster.db_name, "cluster", "db_name")?,
            db_user: required(&self.cluster.db_user, "cluster", "db_user")?,
            db_password: required(&self.cluster.db_password, "cluster", "db_password")?,
        })
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# songplay-dwh configuration

[cluster]
# Redshift cluster endpoint
# host = "dwhcluster.abc123.us-west-2.redshift.amazonaws.com"
port = 5439
# db_name = "dev"
# db_user = "awsuser"
# db_password = ""

[iam_role]
# Role the cluster assumes to read the source buckets
# arn = "arn:aws:iam::123456789012:role/dwhRole"

[s3]
# log_data = "s3://udacity-dend/log_data"
# song_data = "s3://udacity-dend/song_data"
# JSONPaths file for the event logs ("auto" when omitted)
# log_jsonpath = "s3://udacity-dend/log_json_path.json"
region = "us-west-2"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn full_config() -> DwhConfig {
        DwhConfig::parse(
            r#"
[cluster]
host = "localhost"
db_name = "dev"
db_user = "awsuser"
db_password = "secret"

[iam_role]
arn = "arn:aws:iam::123456789012:role/dwhRole"

[s3]
log_data = "s3://udacity-dend/log_data"
song_data = "s3://udacity-dend/song_data"
log_jsonpath = "s3://udacity-dend/log_json_path.json"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = DwhConfig::new();
        assert_eq!(config.cluster.port, DEFAULT_PORT);
        assert_eq!(config.s3.region, DEFAULT_REGION);
        assert!(config.s3.log_data.is_none());
        assert!(config.iam_role.arn.is_none());
    }

    #[test]
    fn test_parse_config() {
        let config = full_config();
        assert_eq!(config.cluster.host.as_deref(), Some("localhost"));
        assert_eq!(config.cluster.port, 5439);
        assert_eq!(
            config.s3.log_data.as_deref(),
            Some("s3://udacity-dend/log_data")
        );
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = DwhConfig::parse("[s3\nlog_data = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_copy_sources() {
        let sources = full_config().copy_sources().unwrap();
        assert_eq!(sources.log_data, "s3://udacity-dend/log_data");
        assert_eq!(sources.song_data, "s3://udacity-dend/song_data");
        assert_eq!(
            sources.log_jsonpath.as_deref(),
            Some("s3://udacity-dend/log_json_path.json")
        );
        assert_eq!(sources.region, "us-west-2");
    }

    #[test]
    fn test_copy_sources_missing_field() {
        let mut config = full_config();
        config.s3.song_data = None;
        assert_eq!(
            config.copy_sources().unwrap_err(),
            ConfigError::MissingField {
                section: "s3",
                key: "song_data"
            }
        );

        let mut config = full_config();
        config.iam_role.arn = Some("   ".to_string());
        assert_eq!(
            config.copy_sources().unwrap_err(),
            ConfigError::MissingField {
                section: "iam_role",
                key: "arn"
            }
        );
    }

    #[test]
    fn test_copy_sources_unwraps_quoted_values() {
        let config = DwhConfig::with_sources(
            "'s3://udacity-dend/log_data'",
            "'s3://udacity-dend/song_data'",
            "'arn:aws:iam::123456789012:role/dwhRole'",
        );
        let sources = config.copy_sources().unwrap();
        assert_eq!(sources.log_data, "s3://udacity-dend/log_data");
        assert_eq!(sources.iam_role_arn, "arn:aws:iam::123456789012:role/dwhRole");
    }

    #[test]
    fn test_copy_sources_jsonpath_auto() {
        let mut config = full_config();
        config.s3.log_jsonpath = Some("auto".to_string());
        assert!(config.copy_sources().unwrap().log_jsonpath.is_none());
    }

    #[test]
    fn test_copy_sources_invalid_region() {
        let mut config = full_config();
        config.s3.region = "mars".to_string();
        assert!(matches!(
            config.copy_sources().unwrap_err(),
            ConfigError::InvalidField {
                section: "s3",
                key: "region",
                ..
            }
        ));
    }

    #[test]
    fn test_apply_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_LOG_DATA, "s3://other-bucket/logs"),
            (ENV_PORT, "5440"),
            (ENV_DB_PASSWORD, "override"),
        ]
        .into_iter()
        .collect();

        let mut config = full_config();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.s3.log_data.as_deref(), Some("s3://other-bucket/logs"));
        assert_eq!(config.cluster.port, 5440);
        assert_eq!(config.cluster.db_password.as_deref(), Some("override"));
        assert_eq!(
            config.s3.song_data.as_deref(),
            Some("s3://udacity-dend/song_data")
        );
    }

    #[test]
    fn test_apply_overrides_ignores_bad_port() {
        let mut config = full_config();
        config.apply_overrides(|key| (key == ENV_PORT).then(|| "not-a-port".to_string()));
        assert_eq!(config.cluster.port, DEFAULT_PORT);
    }

    #[test]
    fn test_cluster_settings() {
        let settings = full_config().cluster_settings().unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.db_password, "secret");
        assert_eq!(
            settings.connection_string_masked(),
            "host=localhost port=5439 dbname=dev user=awsuser password=****"
        );

        let mut config = full_config();
        config.cluster.host = None;
        assert_eq!(
            config.cluster_settings().unwrap_err(),
            ConfigError::MissingField {
                section: "cluster",
                key: "host"
            }
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let config = DwhConfig::with_sources(
            "s3://bucket/logs",
            "s3://bucket/songs",
            "arn:aws:iam::1:role/x",
        );

        config.save(&path).unwrap();
        assert!(path.exists());

        let loaded = DwhConfig::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.s3.log_data.as_deref(), Some("s3://bucket/logs"));
        assert_eq!(loaded.iam_role.arn.as_deref(), Some("arn:aws:iam::1:role/x"));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = DwhConfig::parse(sample_config()).unwrap();
        assert_eq!(config.cluster.port, DEFAULT_PORT);
        assert_eq!(config.s3.region, DEFAULT_REGION);
    }
}
