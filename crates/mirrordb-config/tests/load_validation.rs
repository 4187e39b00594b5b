//! Config load validation tests for mirrordb-config.
// crates/mirrordb-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use mirrordb_config::ConfigError;
use mirrordb_config::MirrorConfig;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<MirrorConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

fn write_config(content: &str) -> Result<NamedTempFile, String> {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(content.as_bytes()).map_err(|err| err.to_string())?;
    Ok(file)
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    assert_invalid(MirrorConfig::load(Some(Path::new(&long_path))), "config path exceeds max length")
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    assert_invalid(MirrorConfig::load(Some(Path::new(&long_component))), "config path component too long")
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&vec![b'a'; 1_048_577]).map_err(|err| err.to_string())?;
    assert_invalid(MirrorConfig::load(Some(file.path())), "config file exceeds size limit")
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(MirrorConfig::load(Some(file.path())), "config file must be utf-8")
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    match MirrorConfig::load(Some(Path::new("/nonexistent/mirrordb.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(error) => Err(format!("expected io error, got {error}")),
        Ok(_) => Err("expected io error".to_string()),
    }
}

#[test]
fn load_reports_bad_toml_as_parse() -> TestResult {
    let file = write_config("[database\ndurable_path = 1")?;
    match MirrorConfig::load(Some(file.path())) {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(error) => Err(format!("expected parse error, got {error}")),
        Ok(_) => Err("expected parse error".to_string()),
    }
}

#[test]
fn load_applies_defaults() -> TestResult {
    let file = write_config("[database]\ndurable_path = \"data/main.db\"\n")?;
    let config = MirrorConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    if config.database.name != "main" {
        return Err(format!("unexpected name {}", config.database.name));
    }
    if config.database.log_path() != Path::new("data/main.db.log") {
        return Err(format!("unexpected log path {}", config.database.log_path().display()));
    }
    if config.memory.enabled || !config.memory.table_set().is_empty() {
        return Err("memory mirror should default off".to_string());
    }
    if config.limits.long_thresholds().params != 10_000 {
        return Err("unexpected long params default".to_string());
    }
    if config.pipeline.ack_timeout_ms != 30_000 {
        return Err("unexpected ack timeout default".to_string());
    }
    Ok(())
}

#[test]
fn load_reads_every_section() -> TestResult {
    let file = write_config(
        r#"
[database]
name = "orders"
durable_path = "orders.db"
log_path = "orders-pending.db"

[store]
busy_timeout_ms = 250
journal_mode = "delete"
sync_mode = "normal"

[memory]
enabled = true
tables = ["Users", "sessions"]

[limits]
long_text_bytes = 100
long_params = 10
max_script_bytes = 1000
max_params = 100

[pipeline]
queue_capacity = 8
saver_capacity = 4
invalidation_capacity = 2
ack_timeout_ms = 500
"#,
    )?;
    let config = MirrorConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let tables: Vec<String> = config.memory.table_set().into_iter().collect();
    if tables != vec!["sessions".to_string(), "users".to_string()] {
        return Err(format!("unexpected memory tables {}", tables.join(",")));
    }
    if config.store.busy_timeout_ms != 250 || config.store.journal_mode.pragma_value() != "delete" {
        return Err("store section not applied".to_string());
    }
    if config.database.log_path() != Path::new("orders-pending.db") {
        return Err("explicit log path ignored".to_string());
    }
    if config.pipeline.queue_capacity != 8 || config.limits.max_params != 100 {
        return Err("pipeline or limits section not applied".to_string());
    }
    Ok(())
}
