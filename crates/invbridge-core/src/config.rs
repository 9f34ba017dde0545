//! Configuration module for InvBridge.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with environment overrides, validation, defaults, and a builder pattern for
//! programmatic use. The resulting [`Config`] is built once at startup and
//! handed to every component; nothing reads configuration from global state.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for InvBridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub sync: SyncConfig,
    pub http: HttpConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
    pub trigger: TriggerConfig,
}

/// fireTMS (source system) endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; `/invoices` is appended.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
}

/// Optima (destination system) endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Base URL; `/invoices/upsert` is appended.
    pub base_url: String,
    /// Bearer token.
    pub token: String,
}

/// Sync engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum records of a page processed concurrently.
    pub concurrency: usize,
    /// Records requested per source page.
    pub page_size: u32,
    /// Cursor used when none has been persisted yet.
    pub initial_cursor: String,
    /// Seconds between runs in continuous mode.
    pub poll_interval_secs: u64,
    /// Optional upper bound on a single run, in seconds.
    pub run_timeout_secs: Option<u64>,
}

/// HTTP client and retry settings shared by both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Total attempts per call before giving up.
    pub max_retries: u32,
    /// Upper bound on the backoff delay, in seconds.
    pub backoff_cap_secs: u64,
}

/// Persistent state settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Path to the SQLite database holding the cursor and ledger.
    pub db_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
    /// Directory for the daemon's daily-rotated log files; stderr only when unset.
    pub dir: Option<PathBuf>,
}

/// HTTP trigger endpoint of the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub enabled: bool,
    /// Address to bind, e.g. `127.0.0.1:8085`.
    pub listen_addr: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/firetms".to_string(),
            token: "dev-firetms-token".to_string(),
        }
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/optima".to_string(),
            token: "dev-optima-token".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            page_size: 50,
            initial_cursor: "2025-01-01T00:00:00Z".to_string(),
            poll_interval_secs: 300,
            run_timeout_secs: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_retries: 6,
            backoff_cap_secs: 60,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("invbridge")
                .join("sync_state.sqlite"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            dir: None,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:8085".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Duration helpers
// ---------------------------------------------------------------------------

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Environment variable naming an alternate configuration file.
pub const CONFIG_PATH_ENV: &str = "INVBRIDGE_CONFIG";

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/invbridge/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("invbridge")
            .join("config.yaml")
    }

    /// Builds the effective process configuration.
    ///
    /// 1. Loads a `.env` file from the working directory, if present
    /// 2. Reads the YAML file: `explicit`, else `$INVBRIDGE_CONFIG`, else
    ///    [`Config::default_path`]. Only an explicitly named file must exist.
    /// 3. Applies environment overrides (see [`Config::apply_env_overrides`])
    ///
    /// Returns the configuration and the file path that was consulted.
    ///
    /// # Errors
    ///
    /// Fails if the `.env` file is malformed, an explicit config file is
    /// missing or unparseable, or an override variable has an invalid value.
    pub fn load_effective(explicit: Option<&Path>) -> anyhow::Result<(Self, PathBuf)> {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(e) => return Err(e).context("Failed to read .env file"),
        }

        let (path, must_exist) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_PATH_ENV) {
                Some(p) => (PathBuf::from(p), true),
                None => (Self::default_path(), false),
            },
        };

        let mut config = if path.exists() || must_exist {
            Self::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        } else {
            Self::default()
        };

        let errors = config.apply_env_overrides(|key| std::env::var(key).ok());
        if !errors.is_empty() {
            anyhow::bail!("Invalid environment overrides: {}", join_errors(&errors));
        }

        Ok((config, path))
    }

    /// Applies overrides from environment-style variables.
    ///
    /// `lookup` maps a variable name to its value; production passes
    /// `std::env::var`, tests pass a map. Returns one error per variable
    /// whose value could not be parsed; valid variables are still applied.
    ///
    /// | Variable          | Field                        |
    /// |-------------------|------------------------------|
    /// | `FIRETMS_URL`     | `source.base_url`            |
    /// | `FIRETMS_TOKEN`   | `source.token`               |
    /// | `OPTIMA_URL`      | `destination.base_url`       |
    /// | `OPTIMA_TOKEN`    | `destination.token`          |
    /// | `CONCURRENCY`     | `sync.concurrency`           |
    /// | `BATCH_SIZE`      | `sync.page_size`             |
    /// | `SINCE_TS`        | `sync.initial_cursor`        |
    /// | `POLL_INTERVAL`   | `sync.poll_interval_secs`    |
    /// | `RUN_TIMEOUT`     | `sync.run_timeout_secs`      |
    /// | `REQUEST_TIMEOUT` | `http.request_timeout_secs`  |
    /// | `RETRIES`         | `http.max_retries`           |
    /// | `BACKOFF_CAP`     | `http.backoff_cap_secs`      |
    /// | `SYNC_DB`         | `state.db_path`              |
    /// | `LOG_LEVEL`       | `logging.level`              |
    /// | `LOG_FORMAT`      | `logging.format`             |
    /// | `LOG_DIR`         | `logging.dir` (empty unsets) |
    /// | `TRIGGER_ADDR`    | `trigger.listen_addr` (and enables it) |
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Vec<ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();

        if let Some(v) = lookup("FIRETMS_URL") {
            self.source.base_url = v;
        }
        if let Some(v) = lookup("FIRETMS_TOKEN") {
            self.source.token = v;
        }
        if let Some(v) = lookup("OPTIMA_URL") {
            self.destination.base_url = v;
        }
        if let Some(v) = lookup("OPTIMA_TOKEN") {
            self.destination.token = v;
        }

        parse_override(&lookup, "CONCURRENCY", &mut self.sync.concurrency, &mut errors);
        parse_override(&lookup, "BATCH_SIZE", &mut self.sync.page_size, &mut errors);
        if let Some(v) = lookup("SINCE_TS") {
            self.sync.initial_cursor = v;
        }
        parse_override(&lookup, "POLL_INTERVAL", &mut self.sync.poll_interval_secs, &mut errors);
        if lookup("RUN_TIMEOUT").is_some() {
            let mut secs = 0u64;
            if parse_override(&lookup, "RUN_TIMEOUT", &mut secs, &mut errors) {
                self.sync.run_timeout_secs = Some(secs);
            }
        }

        parse_override(&lookup, "REQUEST_TIMEOUT", &mut self.http.request_timeout_secs, &mut errors);
        parse_override(&lookup, "RETRIES", &mut self.http.max_retries, &mut errors);
        parse_override(&lookup, "BACKOFF_CAP", &mut self.http.backoff_cap_secs, &mut errors);

        if let Some(v) = lookup("SYNC_DB") {
            self.state.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.logging.format = v.to_lowercase();
        }
        if let Some(v) = lookup("LOG_DIR") {
            self.logging.dir = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("TRIGGER_ADDR") {
            self.trigger.listen_addr = v;
            self.trigger.enabled = true;
        }

        errors
    }
}

/// Parses `key` into `target` when set. Returns true if a value was applied.
fn parse_override<F, T>(lookup: &F, key: &str, target: &mut T, errors: &mut Vec<ValidationError>) -> bool
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return false;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            *target = value;
            true
        }
        Err(_) => {
            errors.push(ValidationError {
                field: key.to_string(),
                message: format!("cannot parse '{raw}' as a number"),
            });
            false
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- endpoints ---
        for (field, value) in [
            ("source.base_url", &self.source.base_url),
            ("destination.base_url", &self.destination.base_url),
        ] {
            match url::Url::parse(value) {
                Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
                Ok(u) => push(field, format!("unsupported scheme '{}'", u.scheme())),
                Err(e) => push(field, format!("invalid URL '{value}': {e}")),
            }
        }
        if self.source.token.trim().is_empty() {
            push("source.token", "must not be empty".into());
        }
        if self.destination.token.trim().is_empty() {
            push("destination.token", "must not be empty".into());
        }

        // --- sync ---
        if self.sync.concurrency == 0 {
            push("sync.concurrency", "must be greater than 0".into());
        }
        if self.sync.page_size == 0 {
            push("sync.page_size", "must be greater than 0".into());
        }
        if self.sync.initial_cursor.trim().is_empty() {
            push("sync.initial_cursor", "must not be empty".into());
        }
        if self.sync.poll_interval_secs == 0 {
            push("sync.poll_interval_secs", "must be greater than 0".into());
        }
        if self.sync.run_timeout_secs == Some(0) {
            push("sync.run_timeout_secs", "must be greater than 0 when set".into());
        }

        // --- http ---
        if self.http.request_timeout_secs == 0 {
            push("http.request_timeout_secs", "must be greater than 0".into());
        }
        if self.http.max_retries == 0 {
            push("http.max_retries", "must be at least 1".into());
        }
        if self.http.backoff_cap_secs == 0 {
            push("http.backoff_cap_secs", "must be greater than 0".into());
        }

        // --- state ---
        if self.state.db_path.as_os_str().is_empty() {
            push("state.db_path", "must not be empty".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            push(
                "logging.format",
                format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            );
        }

        // --- trigger ---
        if self.trigger.enabled && self.trigger.listen_addr.parse::<SocketAddr>().is_err() {
            push(
                "trigger.listen_addr",
                format!("invalid socket address '{}'", self.trigger.listen_addr),
            );
        }

        errors
    }

    /// Validates and turns any errors into a single `anyhow` error.
    pub fn ensure_valid(&self) -> anyhow::Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Invalid configuration: {}", join_errors(&errors))
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- endpoints ---

    pub fn source(mut self, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.source.base_url = base_url.into();
        self.config.source.token = token.into();
        self
    }

    pub fn destination(mut self, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        self.config.destination.base_url = base_url.into();
        self.config.destination.token = token.into();
        self
    }

    // --- sync ---

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.sync.concurrency = n;
        self
    }

    pub fn page_size(mut self, n: u32) -> Self {
        self.config.sync.page_size = n;
        self
    }

    pub fn initial_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.config.sync.initial_cursor = cursor.into();
        self
    }

    pub fn poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval_secs = seconds;
        self
    }

    pub fn run_timeout_secs(mut self, seconds: Option<u64>) -> Self {
        self.config.sync.run_timeout_secs = seconds;
        self
    }

    // --- http ---

    pub fn request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.http.request_timeout_secs = seconds;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.http.max_retries = n;
        self
    }

    pub fn backoff_cap_secs(mut self, seconds: u64) -> Self {
        self.config.http.backoff_cap_secs = seconds;
        self
    }

    // --- state / logging / trigger ---

    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state.db_path = path.into();
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    pub fn logging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.logging.dir = Some(dir.into());
        self
    }

    pub fn trigger(mut self, listen_addr: impl Into<String>) -> Self {
        self.config.trigger.enabled = true;
        self.config.trigger.listen_addr = listen_addr.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
