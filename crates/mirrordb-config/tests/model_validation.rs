//! Config model validation tests for mirrordb-config.
// crates/mirrordb-config/tests/model_validation.rs
// =============================================================================
// Module: Config Model Validation Tests
// Description: Validate cross-field rules of the config model.
// Purpose: Ensure inconsistent settings are rejected before startup.
// =============================================================================

use mirrordb_config::ConfigError;
use mirrordb_config::MirrorConfig;

type TestResult = Result<(), String>;

fn assert_invalid(content: &str, needle: &str) -> TestResult {
    match MirrorConfig::from_toml(content) {
        Err(ConfigError::Invalid(message)) if message.contains(needle) => Ok(()),
        Err(error) => Err(format!("error {error} did not contain {needle}")),
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

const DATABASE: &str = "[database]\ndurable_path = \"main.db\"\n";

#[test]
fn empty_durable_path_is_rejected() -> TestResult {
    assert_invalid("[database]\ndurable_path = \"  \"\n", "database.durable_path must be non-empty")
}

#[test]
fn log_path_must_differ_from_durable_path() -> TestResult {
    assert_invalid(
        "[database]\ndurable_path = \"main.db\"\nlog_path = \"main.db\"\n",
        "must differ",
    )
}

#[test]
fn memory_tables_require_enabled_mirror() -> TestResult {
    assert_invalid(&format!("{DATABASE}[memory]\ntables = [\"users\"]\n"), "requires memory.enabled")
}

#[test]
fn reserved_memory_tables_are_rejected() -> TestResult {
    assert_invalid(
        &format!("{DATABASE}[memory]\nenabled = true\ntables = [\"__tables\"]\n"),
        "reserved name",
    )
}

#[test]
fn duplicate_memory_tables_are_rejected() -> TestResult {
    assert_invalid(
        &format!("{DATABASE}[memory]\nenabled = true\ntables = [\"Users\", \"users\"]\n"),
        "listed twice",
    )
}

#[test]
fn long_thresholds_must_not_exceed_caps() -> TestResult {
    assert_invalid(
        &format!("{DATABASE}[limits]\nlong_text_bytes = 10\nmax_script_bytes = 5\n"),
        "long_text_bytes must not exceed",
    )?;
    assert_invalid(
        &format!("{DATABASE}[limits]\nlong_params = 10\nmax_params = 5\n"),
        "long_params must not exceed",
    )
}

#[test]
fn zero_capacities_are_rejected() -> TestResult {
    assert_invalid(&format!("{DATABASE}[pipeline]\nqueue_capacity = 0\n"), "pipeline.queue_capacity")?;
    assert_invalid(&format!("{DATABASE}[pipeline]\nsaver_capacity = 0\n"), "pipeline.saver_capacity")?;
    assert_invalid(
        &format!("{DATABASE}[pipeline]\ninvalidation_capacity = 0\n"),
        "pipeline.invalidation_capacity",
    )?;
    assert_invalid(&format!("{DATABASE}[pipeline]\nack_timeout_ms = 0\n"), "pipeline.ack_timeout_ms")
}

#[test]
fn zero_busy_timeout_is_rejected() -> TestResult {
    assert_invalid(&format!("{DATABASE}[store]\nbusy_timeout_ms = 0\n"), "busy_timeout_ms")
}

#[test]
fn programmatic_config_validates() -> TestResult {
    let mut config = MirrorConfig::with_durable_path("data/main.db");
    config.memory.enabled = true;
    config.memory.tables = vec!["Users".to_string()];
    config.validate().map_err(|err| err.to_string())?;
    if config.memory.tables != vec!["users".to_string()] {
        return Err("memory tables were not normalized".to_string());
    }
    Ok(())
}
