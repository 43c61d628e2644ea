//! Tests for configuration loading

use songplay_dwh::catalog::QueryCatalog;
use songplay_dwh::config::{
    CONFIG_FILENAME, ConfigError, DEFAULT_PORT, DwhConfig, ENV_IAM_ROLE_ARN, ENV_SONG_DATA,
    sample_config,
};
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"
[cluster]
host = "dwhcluster.abc123.us-west-2.redshift.amazonaws.com"
port = 5439
db_name = "dev"
db_user = "awsuser"
db_password = "Passw0rd"

[iam_role]
arn = "arn:aws:iam::123456789012:role/dwhRole"

[s3]
log_data = "s3://udacity-dend/log_data"
song_data = "s3://udacity-dend/song_data"
log_jsonpath = "s3://udacity-dend/log_json_path.json"
region = "us-west-2"
"#;

#[test]
fn test_read_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = DwhConfig::read(&path).unwrap();
    let settings = config.cluster_settings().unwrap();
    assert_eq!(settings.port, 5439);
    assert_eq!(settings.db_name, "dev");

    let sources = config.copy_sources().unwrap();
    assert_eq!(sources.iam_role_arn, "arn:aws:iam::123456789012:role/dwhRole");
}

#[test]
fn test_read_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let config = DwhConfig::read(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.cluster.port, DEFAULT_PORT);
}

#[test]
fn test_load_invalid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);
    std::fs::write(&path, "[s3\nlog_data = ").unwrap();

    assert!(matches!(DwhConfig::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_overrides_fill_missing_fields() {
    let mut config = DwhConfig::parse(
        r#"
[s3]
log_data = "s3://udacity-dend/log_data"
"#,
    )
    .unwrap();
    assert!(QueryCatalog::new(&config).is_err());

    config.apply_overrides(|key| match key {
        ENV_SONG_DATA => Some("s3://udacity-dend/song_data".to_string()),
        ENV_IAM_ROLE_ARN => Some("arn:aws:iam::123456789012:role/dwhRole".to_string()),
        _ => None,
    });

    let catalog = QueryCatalog::new(&config).unwrap();
    assert!(catalog.copy_statements().sql()[1].contains("'s3://udacity-dend/song_data'"));
}

#[test]
fn test_missing_field_message_names_field() {
    let config = DwhConfig::parse("[s3]\nlog_data = \"s3://bucket/logs\"\n").unwrap();
    let err = config.copy_sources().unwrap_err();
    assert_eq!(err.to_string(), "Missing configuration field: [s3] song_data");
}

#[test]
fn test_save_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(CONFIG_FILENAME);

    let config = DwhConfig::parse(FULL_CONFIG).unwrap();
    config.save(&path).unwrap();

    let reloaded = DwhConfig::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        reloaded.copy_sources().unwrap(),
        config.copy_sources().unwrap()
    );
    assert_eq!(
        reloaded.cluster_settings().unwrap(),
        config.cluster_settings().unwrap()
    );
}

#[test]
fn test_sample_config_needs_filling_in() {
    let config = DwhConfig::parse(sample_config()).unwrap();
    assert!(matches!(
        config.copy_sources(),
        Err(ConfigError::MissingField { .. })
    ));
}
