// crates/mirrordb-config/src/config.rs
// ============================================================================
// Module: mirrordb Configuration
// Description: Configuration loading and validation for mirrordb.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: mirrordb-core, mirrordb-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults except `[database]`, which must name the
//! durable database file. Invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use mirrordb_core::LongThresholds;
use mirrordb_core::identifiers::is_reserved_table;
use mirrordb_core::identifiers::normalize;
use mirrordb_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "mirrordb.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "MIRRORDB_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of memory-designated tables.
pub(crate) const MAX_MEMORY_TABLES: usize = 1024;
/// Upper bound for any pipeline channel capacity.
pub(crate) const MAX_CHANNEL_CAPACITY: usize = 1 << 20;
/// Upper bound for the pipeline acknowledgement timeout.
pub(crate) const MAX_ACK_TIMEOUT_MS: u64 = 10 * 60 * 1000;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// mirrordb configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Database files.
    pub database: DatabaseConfig,
    /// `SQLite` connection settings shared by the durable target and the log.
    #[serde(default)]
    pub store: SqliteStoreConfig,
    /// In-memory mirror settings.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Script size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Queue and saver pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl MirrorConfig {
    /// Builds a configuration with defaults for everything but the database
    /// file.
    #[must_use]
    pub fn with_durable_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database: DatabaseConfig {
                name: default_database_name(),
                durable_path: path.into(),
                log_path: None,
            },
            store: SqliteStoreConfig::default(),
            memory: MemoryConfig::default(),
            limits: LimitsConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency and normalizes
    /// memory table names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.memory.validate()?;
        self.limits.validate()?;
        self.pipeline.validate()?;
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store.busy_timeout_ms must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Database file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database name used in log fields.
    #[serde(default = "default_database_name")]
    pub name: String,
    /// Durable target database file.
    pub durable_path: PathBuf,
    /// Pending-commit log file; defaults next to the durable file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Returns the effective pending-log path.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.log_path.clone().unwrap_or_else(|| {
            let mut name = self.durable_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
            name.push(".log");
            self.durable_path.with_file_name(name)
        })
    }

    /// Validates database settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("database.name must be non-empty".to_string()));
        }
        validate_path_string("database.durable_path", &self.durable_path.to_string_lossy())?;
        if let Some(log_path) = &self.log_path {
            validate_path_string("database.log_path", &log_path.to_string_lossy())?;
        }
        if self.log_path() == self.durable_path {
            return Err(ConfigError::Invalid(
                "database.log_path must differ from database.durable_path".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-memory mirror configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    /// Enables the in-memory mirror.
    #[serde(default)]
    pub enabled: bool,
    /// Memory-designated table names.
    #[serde(default)]
    pub tables: Vec<String>,
}

impl MemoryConfig {
    /// Lower-cased set of memory-designated tables; empty when disabled.
    #[must_use]
    pub fn table_set(&self) -> BTreeSet<String> {
        if !self.enabled {
            return BTreeSet::new();
        }
        self.tables.iter().map(|table| normalize(table)).collect()
    }

    /// Validates and normalizes memory settings.
    fn validate(&mut self) -> Result<(), ConfigError> {
        if !self.enabled && !self.tables.is_empty() {
            return Err(ConfigError::Invalid("memory.tables requires memory.enabled".to_string()));
        }
        if self.tables.len() > MAX_MEMORY_TABLES {
            return Err(ConfigError::Invalid("memory.tables exceeds max entries".to_string()));
        }
        let mut seen = BTreeSet::new();
        for table in &mut self.tables {
            let name = normalize(table.trim());
            if name.is_empty() {
                return Err(ConfigError::Invalid("memory.tables entries must be non-empty".to_string()));
            }
            if is_reserved_table(&name) {
                return Err(ConfigError::Invalid(format!("memory table {name} uses a reserved name")));
            }
            if !seen.insert(name.clone()) {
                return Err(ConfigError::Invalid(format!("memory table {name} is listed twice")));
            }
            *table = name;
        }
        Ok(())
    }
}

/// Script size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LimitsConfig {
    /// Script text size above which a commit list becomes long.
    #[serde(default = "default_long_text_bytes")]
    pub long_text_bytes: usize,
    /// Parameter count above which a commit list becomes long.
    #[serde(default = "default_long_params")]
    pub long_params: usize,
    /// Largest accepted script text in bytes.
    #[serde(default = "default_max_script_bytes")]
    pub max_script_bytes: usize,
    /// Largest accepted parameter count.
    #[serde(default = "default_max_params")]
    pub max_params: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            long_text_bytes: default_long_text_bytes(),
            long_params: default_long_params(),
            max_script_bytes: default_max_script_bytes(),
            max_params: default_max_params(),
        }
    }
}

impl LimitsConfig {
    /// Long thresholds for the commit assembler.
    #[must_use]
    pub const fn long_thresholds(&self) -> LongThresholds {
        LongThresholds {
            text_bytes: self.long_text_bytes,
            params: self.long_params,
        }
    }

    /// Validates limit ordering.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_script_bytes == 0 {
            return Err(ConfigError::Invalid("limits.max_script_bytes must be greater than zero".to_string()));
        }
        if self.long_text_bytes > self.max_script_bytes {
            return Err(ConfigError::Invalid(
                "limits.long_text_bytes must not exceed limits.max_script_bytes".to_string(),
            ));
        }
        if self.long_params > self.max_params {
            return Err(ConfigError::Invalid("limits.long_params must not exceed limits.max_params".to_string()));
        }
        Ok(())
    }
}

/// Queue and saver pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Queue request channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub queue_capacity: usize,
    /// Saver request channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub saver_capacity: usize,
    /// Memory-table invalidation broadcast capacity.
    #[serde(default = "default_invalidation_capacity")]
    pub invalidation_capacity: usize,
    /// Wait bound for queue replies and saver acknowledgements.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_channel_capacity(),
            saver_capacity: default_channel_capacity(),
            invalidation_capacity: default_invalidation_capacity(),
            ack_timeout_ms: default_ack_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    /// Acknowledgement timeout as a duration.
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Validates channel sizes and timeouts.
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("pipeline.queue_capacity", self.queue_capacity),
            ("pipeline.saver_capacity", self.saver_capacity),
            ("pipeline.invalidation_capacity", self.invalidation_capacity),
        ] {
            if value == 0 || value > MAX_CHANNEL_CAPACITY {
                return Err(ConfigError::Invalid(format!("{field} must be between 1 and {MAX_CHANNEL_CAPACITY}")));
            }
        }
        if self.ack_timeout_ms == 0 || self.ack_timeout_ms > MAX_ACK_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "pipeline.ack_timeout_ms must be between 1 and {MAX_ACK_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default database name.
fn default_database_name() -> String {
    "main".to_string()
}

/// Default long text threshold.
const fn default_long_text_bytes() -> usize {
    1024 * 1024
}

/// Default long parameter threshold.
const fn default_long_params() -> usize {
    10_000
}

/// Default script size cap.
const fn default_max_script_bytes() -> usize {
    16 * 1024 * 1024
}

/// Default parameter count cap.
const fn default_max_params() -> usize {
    100_000
}

/// Default pipeline channel capacity.
const fn default_channel_capacity() -> usize {
    1024
}

/// Default invalidation broadcast capacity.
const fn default_invalidation_capacity() -> usize {
    64
}

/// Default acknowledgement timeout.
const fn default_ack_timeout_ms() -> u64 {
    30_000
}
