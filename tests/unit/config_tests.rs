use std::time::Duration;

use rowstream::producer::Buffering;
use rowstream::{config::StreamConfig, AppError, StreamOptions};

fn sample_toml() -> String {
    r#"
database_url = "sqlite://rows.db"
timeout_seconds = 30
buffered = true

[output]
prefix = "["
suffix = "]"
default_output = ""
"#
    .to_owned()
}

#[test]
fn parses_full_config() {
    let config = StreamConfig::from_toml_str(&sample_toml()).expect("valid config");
    assert_eq!(config.database_url, "sqlite://rows.db");
    assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.buffering(), Buffering::Buffered);
    assert_eq!(
        config.stream_options(),
        StreamOptions::new().prefix("[").default_output("").suffix("]")
    );
}

#[test]
fn minimal_config_uses_defaults() {
    let config =
        StreamConfig::from_toml_str("database_url = \"sqlite::memory:\"").expect("valid config");
    assert_eq!(config.timeout(), None);
    assert_eq!(config.buffering(), Buffering::Streamed);
}

#[test]
fn missing_output_table_falls_back_to_empty_array() {
    let config =
        StreamConfig::from_toml_str("database_url = \"sqlite::memory:\"").expect("valid config");
    assert_eq!(config.stream_options(), StreamOptions::with_default("[]"));
}

#[test]
fn empty_output_table_leaves_every_field_absent() {
    let raw = "database_url = \"sqlite::memory:\"\n[output]\n";
    let config = StreamConfig::from_toml_str(raw).expect("valid config");
    assert_eq!(config.stream_options(), StreamOptions::new());
}

#[test]
fn zero_timeout_means_no_deadline() {
    let raw = "database_url = \"sqlite::memory:\"\ntimeout_seconds = 0";
    let config = StreamConfig::from_toml_str(raw).expect("valid config");
    assert_eq!(config.timeout(), None);
}

#[test]
fn empty_database_url_is_rejected() {
    let err = StreamConfig::from_toml_str("database_url = \"  \"").expect_err("must fail");
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("database_url")));
}

#[test]
fn missing_database_url_is_rejected() {
    let err = StreamConfig::from_toml_str("buffered = true").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_reads_config_from_disk() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("rowstream.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = StreamConfig::load(&path).expect("load");
    assert_eq!(config.database_url, "sqlite://rows.db");
}

#[test]
fn load_reports_missing_file_as_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = StreamConfig::load(&temp.path().join("absent.toml")).expect_err("must fail");
    assert!(matches!(err, AppError::Config(ref msg) if msg.starts_with("cannot read config")));
}
