//! # vmax2influx - VMAX/PowerMax to InfluxDB Collector
//!
//! A single-pass metrics collector that pulls performance and alert data from
//! a Dell VMAX/PowerMax Unisphere REST API and forwards it to InfluxDB.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       VMAX2INFLUX COLLECTOR                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  UNISPHERE API → NORMALIZE → TAG & TIMESTAMP → INFLUXDB WRITER   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One run is one pass: connect, walk each metric category (array, storage
//! groups, directors, port groups, hosts, SRPs, alert counts), convert each
//! entry into a tagged line-protocol point, write it, exit. Scheduling is
//! external (cron, systemd timer); the next run is the recovery mechanism.
//!
//! ## Author
//!
//! AIOps Team

// ============================================================================
// SECTION 1: IMPORTS & DEPENDENCIES
// ============================================================================

#![allow(dead_code)]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Async & HTTP
// ----------------------------------------------------------------------------
use async_trait::async_trait;

// ----------------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------------
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

// ----------------------------------------------------------------------------
// Time
// ----------------------------------------------------------------------------
use chrono::{NaiveDateTime, TimeZone, Utc};

// ----------------------------------------------------------------------------
// Error Handling
// ----------------------------------------------------------------------------
use anyhow::{Context as AnyhowContext, Result as AnyhowResult};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Logging & Tracing
// ----------------------------------------------------------------------------
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

// ----------------------------------------------------------------------------
// Configuration & CLI
// ----------------------------------------------------------------------------
use clap::{Parser, Subcommand};
use figment::providers::{Env, Format, Toml};
use figment::Figment;

/// Raw JSON object, as returned by the Unisphere API.
pub type JsonMap = serde_json::Map<String, JsonValue>;

// ============================================================================
// SECTION 2: CONSTANTS & VERSION INFORMATION
// ============================================================================

/// Collector version - follows semantic versioning
pub const COLLECTOR_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COLLECTOR_NAME: &str = "vmax2influx";
pub const COLLECTOR_FULL_NAME: &str = "VMAX to InfluxDB Collector";

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

/// Trailing window queried on each run (minutes)
pub const DEFAULT_LOOKBACK_MINUTES: u64 = 15;

/// Default timeout for HTTP requests (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default Unisphere REST port
pub const DEFAULT_UNISPHERE_PORT: u16 = 8443;

/// Default InfluxDB HTTP port
pub const DEFAULT_INFLUX_PORT: u16 = 8086;

/// Unisphere REST API version segment
pub const DEFAULT_API_VERSION: &str = "84";

/// Maximum length of an upstream error body kept in our own errors
pub const MAX_ERROR_BODY_LEN: usize = 256;

// ----------------------------------------------------------------------------
// Wire Format Keys
// ----------------------------------------------------------------------------

/// Timestamp format written to InfluxDB (second precision, UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Epoch-millisecond timestamp key inside each performance entry
pub const TIMESTAMP_KEY: &str = "timestamp";

/// Director type attribute key on director metrics payloads
pub const DIRECTOR_TYPE_KEY: &str = "directorType";

/// SRP descriptor capacity keys
pub const SRP_USABLE_KEY: &str = "total_usable_cap_gb";
pub const SRP_ALLOCATED_KEY: &str = "total_allocated_cap_gb";

// ----------------------------------------------------------------------------
// Measurements & Tags
// ----------------------------------------------------------------------------

pub const MEASUREMENT_ARRAY: &str = "Array";
pub const MEASUREMENT_STORAGE_GROUP: &str = "Storage Group";
pub const MEASUREMENT_DIRECTOR: &str = "Director";
pub const MEASUREMENT_PORT_GROUP: &str = "Port Group";
pub const MEASUREMENT_HOST: &str = "Host";
pub const MEASUREMENT_SRP: &str = "SRP";
pub const MEASUREMENT_ALERTS: &str = "Alerts";

pub const TAG_SERIAL: &str = "S/N";
pub const TAG_LOCATION: &str = "Location";
pub const TAG_STORAGE_GROUP: &str = "Storage Group";
pub const TAG_DIRECTOR_ID: &str = "Director ID";
pub const TAG_DIRECTOR_TYPE: &str = "Director Type";
pub const TAG_PORT_GROUP: &str = "Port Group";
pub const TAG_HOST: &str = "Host";
pub const TAG_SRP: &str = "SRP";

// ----------------------------------------------------------------------------
// Derived Field Names
// ----------------------------------------------------------------------------

pub const FIELD_FREE_CAPACITY: &str = "array_free_capacity";
pub const FIELD_FREE_PERCENT: &str = "array_free_percent";
pub const FIELD_ALERTS_FATAL_CRITICAL: &str = "alerts_fatal_critical";
pub const FIELD_ALERTS_MINOR_WARNING: &str = "alerts_minor_warning";
pub const FIELD_ALERTS_INFORMATION: &str = "alerts_information";

/// Number of collection categories in one pass
pub const CATEGORY_COUNT: usize = 7;

// ============================================================================
// SECTION 3: CORE TYPE SYSTEM
// ============================================================================
// The small set of value types every category flows through: a trailing
// query window, a tagged point, scalar field values, and the normalized
// performance payload shape shared by all per-category fetches.
// ============================================================================

// ----------------------------------------------------------------------------
// 3.1 Time Window
// ----------------------------------------------------------------------------

/// A (start, end) pair of epoch-millisecond timestamps.
///
/// Computed once per run and shared by every category query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Window ending now and starting `lookback_minutes` in the past.
    pub fn trailing(lookback_minutes: u64) -> Self {
        let end_ms = Utc::now().timestamp_millis();
        let start_ms = end_ms - (lookback_minutes as i64) * 60_000;
        Self { start_ms, end_ms }
    }
}

// ----------------------------------------------------------------------------
// 3.2 Timestamp Conversion
// ----------------------------------------------------------------------------

/// Convert an epoch-millisecond timestamp to the InfluxDB point time format.
///
/// Sub-second precision is truncated, not rounded. Returns `None` only for
/// epochs outside chrono's representable range.
pub fn format_epoch_ms(epoch_ms: i64) -> Option<String> {
    let secs = epoch_ms.div_euclid(1000);
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|datetime| datetime.format(TIMESTAMP_FORMAT).to_string())
}

/// Parse a point time string back to epoch seconds (UTC).
pub fn parse_point_time(time: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(time, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc().timestamp())
}

// ----------------------------------------------------------------------------
// 3.3 Field Values
// ----------------------------------------------------------------------------

/// A scalar field value on a time-series point.
///
/// The variants are the only value shapes the write contract accepts, so
/// list- or object-valued entries in a raw payload can never reach a point:
/// `from_json` simply has no conversion for them.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl FieldValue {
    /// Convert a raw JSON value, returning `None` for arrays, objects, and
    /// nulls.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Some(FieldValue::Integer(integer))
                } else {
                    number.as_f64().map(FieldValue::Float)
                }
            }
            JsonValue::String(text) => Some(FieldValue::Text(text.clone())),
            JsonValue::Bool(flag) => Some(FieldValue::Boolean(*flag)),
            JsonValue::Array(_) | JsonValue::Object(_) | JsonValue::Null => None,
        }
    }

    /// Numeric view of the value, when it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(value) => Some(*value),
            FieldValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }
}

/// Filter a raw JSON object down to its scalar members.
pub fn scalar_fields(raw: &JsonMap) -> BTreeMap<String, FieldValue> {
    raw.iter()
        .filter_map(|(key, value)| FieldValue::from_json(value).map(|field| (key.clone(), field)))
        .collect()
}

// ----------------------------------------------------------------------------
// 3.4 Metric Points
// ----------------------------------------------------------------------------

/// A tagged time-series point, one write call each.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    /// Category name (Array, Storage Group, Director, ...)
    pub measurement: String,
    /// Indexed string dimensions; always carries S/N and Location
    pub tags: BTreeMap<String, String>,
    /// Scalar values
    pub fields: BTreeMap<String, FieldValue>,
    /// `YYYY-MM-DDTHH:MM:SS`, UTC
    pub time: String,
}

impl MetricPoint {
    pub fn new(measurement: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time: time.into(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_fields(mut self, fields: BTreeMap<String, FieldValue>) -> Self {
        self.fields.extend(fields);
        self
    }
}

/// Merge caller tags over a base set. Caller tags win on key collision.
pub fn overlay_tags(
    base: &BTreeMap<String, String>,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut tags = base.clone();
    for (key, value) in extra {
        tags.insert(key.clone(), value.clone());
    }
    tags
}

// ----------------------------------------------------------------------------
// 3.5 Performance Responses
// ----------------------------------------------------------------------------

/// Normalized performance payload: an ordered sequence of timestamped entries
/// plus any top-level attributes the category carries (director type, for
/// directors).
#[derive(Debug, Clone, Default)]
pub struct MetricsResponse {
    /// Timestamped metric entries, in API order
    pub perf_data: Vec<JsonMap>,
    /// Top-level payload attributes outside the entry sequence
    pub attributes: JsonMap,
}

impl MetricsResponse {
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(JsonValue::as_str)
    }

    /// Epoch-ms timestamp of the last entry, reused by SRP and alert records.
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.perf_data
            .last()
            .and_then(|entry| entry.get(TIMESTAMP_KEY))
            .and_then(JsonValue::as_i64)
    }
}

// ----------------------------------------------------------------------------
// 3.6 Alert Severities
// ----------------------------------------------------------------------------

/// Unisphere alert severity levels queried per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSeverity {
    Fatal,
    Critical,
    Warning,
    Minor,
    Information,
}

impl AlertSeverity {
    /// Query-parameter form expected by the alert endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Fatal => "FATAL",
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Minor => "MINOR",
            AlertSeverity::Information => "INFORMATION",
        }
    }
}

// ----------------------------------------------------------------------------
// 3.7 Director Classification
// ----------------------------------------------------------------------------

/// Director emulation class, derived from the director id prefix.
///
/// Unisphere exposes one performance category per class, and the class name
/// is also the `Director Type` tag value on director points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorClass {
    FrontEnd,
    BackEnd,
    Rdf,
    Infrastructure,
    Eds,
}

impl DirectorClass {
    /// Classify a director id such as `FA-1D` or `DF-2C`.
    pub fn classify(director_id: &str) -> Option<Self> {
        let prefix = director_id
            .split('-')
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match prefix.as_str() {
            "EF" | "FA" | "FE" | "SE" => Some(DirectorClass::FrontEnd),
            "DF" | "DX" => Some(DirectorClass::BackEnd),
            "RF" | "RE" => Some(DirectorClass::Rdf),
            "IM" => Some(DirectorClass::Infrastructure),
            "ED" | "EDS" => Some(DirectorClass::Eds),
            _ => None,
        }
    }

    /// Tag value written to the point.
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectorClass::FrontEnd => "FE",
            DirectorClass::BackEnd => "BE",
            DirectorClass::Rdf => "RDF",
            DirectorClass::Infrastructure => "IM",
            DirectorClass::Eds => "EDS",
        }
    }

    /// Performance REST category for this class.
    pub fn performance_category(&self) -> &'static str {
        match self {
            DirectorClass::FrontEnd => "FEDirector",
            DirectorClass::BackEnd => "BEDirector",
            DirectorClass::Rdf => "RDFDirector",
            DirectorClass::Infrastructure => "IMDirector",
            DirectorClass::Eds => "EDSDirector",
        }
    }
}

// ============================================================================
// SECTION 4: ERROR HANDLING FRAMEWORK
// ============================================================================
// One subsystem enum per boundary (config, array API, database write) rolled
// into a top-level error, with a category() accessor for structured logging.
// No retries anywhere: a category failure is logged and the pass moves on.
// ============================================================================

/// Convenience alias used throughout the collector.
pub type CollectorResult<T> = Result<T, CollectorError>;

// ----------------------------------------------------------------------------
// 4.1 Top-Level Error
// ----------------------------------------------------------------------------

/// The main error type for the collector.
/// All subsystem errors can be converted to this type.
#[derive(Error, Debug)]
pub enum CollectorError {
    // ---- Configuration Errors ----
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // ---- Unisphere API Errors ----
    #[error("Unisphere API error: {0}")]
    Api(#[from] ApiError),

    // ---- InfluxDB Write Errors ----
    #[error("InfluxDB write error: {0}")]
    Write(#[from] WriteError),

    // ---- Whole-Run Errors ----
    #[error("All {0} collection categories failed")]
    AllCategoriesFailed(usize),
}

impl CollectorError {
    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            CollectorError::Config(_) => "config",
            CollectorError::Api(_) => "api",
            CollectorError::Write(_) => "write",
            CollectorError::AllCategoriesFailed(_) => "run",
        }
    }
}

// ----------------------------------------------------------------------------
// 4.2 Configuration Errors
// ----------------------------------------------------------------------------

/// Errors related to configuration loading and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Failed to write configuration file {path}: {message}")]
    WriteFailed { path: PathBuf, message: String },
}

// ----------------------------------------------------------------------------
// 4.3 Unisphere API Errors
// ----------------------------------------------------------------------------

/// Errors raised while talking to the array management API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request to Unisphere failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unisphere returned HTTP {status} for {path}: {body}")]
    Status { status: u16, path: String, body: String },

    #[error("Missing expected key '{key}' in {context} response")]
    MissingKey { key: &'static str, context: String },

    #[error("Malformed {context} response: {message}")]
    Malformed { context: String, message: String },

    #[error("Entry timestamp {epoch_ms} is outside the representable range")]
    BadTimestamp { epoch_ms: i64 },
}

// ----------------------------------------------------------------------------
// 4.4 InfluxDB Write Errors
// ----------------------------------------------------------------------------

/// Errors raised while writing points to InfluxDB.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("HTTP request to InfluxDB failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("InfluxDB returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Point for measurement '{measurement}' has no scalar fields")]
    EmptyFields { measurement: String },

    #[error("Point time '{0}' is not in YYYY-MM-DDTHH:MM:SS form")]
    InvalidTime(String),
}

/// Keep only a bounded prefix of an upstream error body.
fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_LEN).collect()
}

// ============================================================================
// SECTION 5: CONFIGURATION SYSTEM
// ============================================================================
// TOML file with environment variable overrides (VMAX2INFLUX_ prefix, __ as
// the nesting separator), validated before use. Nothing here is hard-coded
// at the call sites; the whole pass receives one config object.
// ============================================================================

// ----------------------------------------------------------------------------
// 5.1 Root Configuration
// ----------------------------------------------------------------------------

/// Root configuration for one collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// InfluxDB connection settings
    #[serde(default)]
    pub influxdb: InfluxConfig,

    /// Storage array / Unisphere settings
    #[serde(default)]
    pub array: ArrayConfig,

    /// Collection pass settings
    #[serde(default)]
    pub collector: RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            influxdb: InfluxConfig::default(),
            array: ArrayConfig::default(),
            collector: RunConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from file with environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("VMAX2INFLUX_").split("__"));

        let config: Self = figment.extract().map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load from string (for testing).
    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn require(field: &str, value: &str) -> Result<(), ConfigError> {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            Ok(())
        }

        require("array.serial_number", &self.array.serial_number)?;
        require("array.host", &self.array.host)?;
        require("array.api_version", &self.array.api_version)?;
        require("influxdb.host", &self.influxdb.host)?;
        require("influxdb.database", &self.influxdb.database)?;
        require("collector.location", &self.collector.location)?;

        if self.collector.lookback_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collector.lookback_minutes".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let format = self.logging.format.to_ascii_lowercase();
        if format != "text" && format != "json" {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                message: format!("unknown format '{}', expected 'text' or 'json'", self.logging.format),
            });
        }

        Ok(())
    }

    /// Render a starter configuration file.
    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

// ----------------------------------------------------------------------------
// 5.2 InfluxDB Configuration
// ----------------------------------------------------------------------------

/// InfluxDB v1 HTTP API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// InfluxDB host
    #[serde(default = "default_influx_host")]
    pub host: String,

    /// InfluxDB HTTP port
    #[serde(default = "default_influx_port")]
    pub port: u16,

    /// Username, when authentication is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password, when authentication is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Target database name
    #[serde(default = "default_influx_database")]
    pub database: String,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            port: default_influx_port(),
            username: None,
            password: None,
            database: default_influx_database(),
        }
    }
}

// ----------------------------------------------------------------------------
// 5.3 Array Configuration
// ----------------------------------------------------------------------------

/// Unisphere endpoint and target array settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayConfig {
    /// Serial number of the array to collect from
    #[serde(default)]
    pub serial_number: String,

    /// Unisphere host or IP
    #[serde(default)]
    pub host: String,

    /// Unisphere REST port
    #[serde(default = "default_unisphere_port")]
    pub port: u16,

    /// REST username
    #[serde(default = "default_unisphere_user")]
    pub username: String,

    /// REST password
    #[serde(default = "default_unisphere_password")]
    pub password: String,

    /// Verify the Unisphere TLS certificate. Unisphere commonly runs with a
    /// self-signed certificate, so this defaults to off.
    #[serde(default)]
    pub verify_tls: bool,

    /// REST API version path segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            serial_number: String::new(),
            host: String::new(),
            port: default_unisphere_port(),
            username: default_unisphere_user(),
            password: default_unisphere_password(),
            verify_tls: false,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ----------------------------------------------------------------------------
// 5.4 Collection Pass Configuration
// ----------------------------------------------------------------------------

/// Settings for the pass itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Free-text location tag attached to every point
    #[serde(default)]
    pub location: String,

    /// Trailing window length queried per category (minutes)
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            lookback_minutes: default_lookback_minutes(),
        }
    }
}

// ----------------------------------------------------------------------------
// 5.5 Logging Configuration
// ----------------------------------------------------------------------------

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: text or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ----------------------------------------------------------------------------
// 5.6 Serde Default Helpers
// ----------------------------------------------------------------------------

fn default_influx_host() -> String {
    "localhost".to_string()
}

fn default_influx_port() -> u16 {
    DEFAULT_INFLUX_PORT
}

fn default_influx_database() -> String {
    "vmaxdb".to_string()
}

fn default_unisphere_port() -> u16 {
    DEFAULT_UNISPHERE_PORT
}

fn default_unisphere_user() -> String {
    "smc".to_string()
}

fn default_unisphere_password() -> String {
    "smc".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_lookback_minutes() -> u64 {
    DEFAULT_LOOKBACK_MINUTES
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// ============================================================================
// SECTION 6: LOGGING & TRACING INFRASTRUCTURE
// ============================================================================

/// Initialize the logging system based on configuration.
pub fn init_logging(config: &LoggingConfig) -> CollectorResult<()> {
    let level_filter = match config.level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    if config.format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    Ok(())
}

// ============================================================================
// SECTION 7: UNISPHERE REST CLIENT
// ============================================================================
// The array management API behind a trait so the collection pass can be
// exercised against test doubles. The concrete client speaks the Unisphere
// REST dialect: GET listings under sloprovisioning/system, POST performance
// queries with a startDate/endDate body, basic auth on every request.
// ============================================================================

// ----------------------------------------------------------------------------
// 7.1 ArrayApi Trait
// ----------------------------------------------------------------------------

/// Capability set consumed from the storage array management API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArrayApi: Send + Sync {
    /// Array-level performance metrics over the window.
    async fn array_metrics(&self, window: TimeWindow) -> Result<MetricsResponse, ApiError>;

    async fn storage_group_ids(&self) -> Result<Vec<String>, ApiError>;
    async fn storage_group_metrics(
        &self,
        sg_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError>;

    async fn director_ids(&self) -> Result<Vec<String>, ApiError>;
    /// Director metrics; the payload carries a `directorType` attribute.
    async fn director_metrics(
        &self,
        director_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError>;

    async fn port_group_ids(&self) -> Result<Vec<String>, ApiError>;
    async fn port_group_metrics(
        &self,
        pg_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError>;

    async fn host_ids(&self) -> Result<Vec<String>, ApiError>;
    async fn host_metrics(
        &self,
        host_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError>;

    async fn srp_ids(&self) -> Result<Vec<String>, ApiError>;
    /// Raw SRP descriptor object.
    async fn srp(&self, srp_id: &str) -> Result<JsonMap, ApiError>;

    /// Alert ids currently raised at the given severity.
    async fn alert_ids(&self, severity: AlertSeverity) -> Result<Vec<String>, ApiError>;
}

// ----------------------------------------------------------------------------
// 7.2 Unisphere Client
// ----------------------------------------------------------------------------

/// Concrete `ArrayApi` over the Unisphere REST API.
#[derive(Debug)]
pub struct UnisphereClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    serial_number: String,
    username: String,
    password: String,
}

impl UnisphereClient {
    pub fn new(config: &ArrayConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{}:{}/univmax/restapi", config.host, config.port),
            api_version: config.api_version.clone(),
            serial_number: config.serial_number.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn sloprovisioning_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/sloprovisioning/symmetrix/{}/{}",
            self.base_url, self.api_version, self.serial_number, resource
        )
    }

    fn system_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/system/symmetrix/{}/{}",
            self.base_url, self.api_version, self.serial_number, resource
        )
    }

    fn performance_url(&self, category: &str) -> String {
        format!("{}/performance/{}/metrics", self.base_url, category)
    }

    async fn check_and_decode(
        path: &str,
        response: reqwest::Response,
    ) -> Result<JsonValue, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: truncate_body(&body),
            });
        }
        Ok(response.json().await?)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<JsonValue, ApiError> {
        debug!(target: "vmax2influx::api", url, "GET");
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()
            .await?;
        Self::check_and_decode(url, response).await
    }

    async fn id_list(
        &self,
        url: &str,
        key: &'static str,
        context: &str,
    ) -> Result<Vec<String>, ApiError> {
        let body = self.get_json(url, &[]).await?;
        json_string_list(&body, key, context)
    }

    /// POST a performance query and normalize the result list.
    async fn performance_metrics(
        &self,
        category: &str,
        instance: Option<(&str, &str)>,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError> {
        let mut body = json!({
            "symmetrixId": self.serial_number,
            "startDate": window.start_ms,
            "endDate": window.end_ms,
            "dataFormat": "Average",
            "metrics": ["All"],
        });
        if let Some((key, id)) = instance {
            body[key] = JsonValue::String(id.to_string());
        }

        let url = self.performance_url(category);
        debug!(target: "vmax2influx::api", %url, category, "POST performance query");
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        let decoded = Self::check_and_decode(&url, response).await?;
        normalize_performance(&decoded, category)
    }
}

#[async_trait]
impl ArrayApi for UnisphereClient {
    async fn array_metrics(&self, window: TimeWindow) -> Result<MetricsResponse, ApiError> {
        self.performance_metrics("Array", None, window).await
    }

    async fn storage_group_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.sloprovisioning_url("storagegroup");
        self.id_list(&url, "storageGroupId", "storage group list").await
    }

    async fn storage_group_metrics(
        &self,
        sg_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError> {
        self.performance_metrics("StorageGroup", Some(("storageGroupId", sg_id)), window)
            .await
    }

    async fn director_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.sloprovisioning_url("director");
        self.id_list(&url, "directorId", "director list").await
    }

    async fn director_metrics(
        &self,
        director_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError> {
        let class = DirectorClass::classify(director_id).ok_or_else(|| ApiError::Malformed {
            context: "director".to_string(),
            message: format!("unrecognized director id '{director_id}'"),
        })?;
        let mut response = self
            .performance_metrics(
                class.performance_category(),
                Some(("directorId", director_id)),
                window,
            )
            .await?;
        response.attributes.insert(
            DIRECTOR_TYPE_KEY.to_string(),
            JsonValue::String(class.as_str().to_string()),
        );
        Ok(response)
    }

    async fn port_group_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.sloprovisioning_url("portgroup");
        self.id_list(&url, "portGroupId", "port group list").await
    }

    async fn port_group_metrics(
        &self,
        pg_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError> {
        self.performance_metrics("PortGroup", Some(("portGroupId", pg_id)), window)
            .await
    }

    async fn host_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.sloprovisioning_url("host");
        self.id_list(&url, "hostId", "host list").await
    }

    async fn host_metrics(
        &self,
        host_id: &str,
        window: TimeWindow,
    ) -> Result<MetricsResponse, ApiError> {
        self.performance_metrics("Host", Some(("hostId", host_id)), window)
            .await
    }

    async fn srp_ids(&self) -> Result<Vec<String>, ApiError> {
        let url = self.sloprovisioning_url("srp");
        self.id_list(&url, "srpId", "SRP list").await
    }

    async fn srp(&self, srp_id: &str) -> Result<JsonMap, ApiError> {
        let url = self.sloprovisioning_url(&format!("srp/{srp_id}"));
        let body = self.get_json(&url, &[]).await?;
        match body {
            JsonValue::Object(map) => Ok(map),
            other => Err(ApiError::Malformed {
                context: "SRP descriptor".to_string(),
                message: format!("expected an object, got: {other}"),
            }),
        }
    }

    async fn alert_ids(&self, severity: AlertSeverity) -> Result<Vec<String>, ApiError> {
        let url = self.system_url("alert");
        let body = self.get_json(&url, &[("severity", severity.as_str())]).await?;
        match body.get("alertId") {
            // No alerts at this severity.
            None => Ok(Vec::new()),
            Some(value) => value_string_list(value, "alertId", "alert list"),
        }
    }
}

// ----------------------------------------------------------------------------
// 7.3 Response Normalization
// ----------------------------------------------------------------------------

/// Extract the ordered entry sequence from a performance response body.
pub fn normalize_performance(body: &JsonValue, category: &str) -> Result<MetricsResponse, ApiError> {
    let result_list = body.get("resultList").ok_or(ApiError::MissingKey {
        key: "resultList",
        context: category.to_string(),
    })?;
    let result = result_list.get("result").ok_or(ApiError::MissingKey {
        key: "result",
        context: category.to_string(),
    })?;
    let entries = result.as_array().ok_or_else(|| ApiError::Malformed {
        context: category.to_string(),
        message: "'result' is not an array".to_string(),
    })?;

    let mut perf_data = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            JsonValue::Object(map) => perf_data.push(map.clone()),
            other => {
                return Err(ApiError::Malformed {
                    context: category.to_string(),
                    message: format!("non-object entry in result list: {other}"),
                })
            }
        }
    }

    Ok(MetricsResponse {
        perf_data,
        attributes: JsonMap::new(),
    })
}

/// Read a list of strings under `key` from a JSON object.
fn json_string_list(
    body: &JsonValue,
    key: &'static str,
    context: &str,
) -> Result<Vec<String>, ApiError> {
    let value = body.get(key).ok_or(ApiError::MissingKey {
        key,
        context: context.to_string(),
    })?;
    value_string_list(value, key, context)
}

fn value_string_list(
    value: &JsonValue,
    key: &'static str,
    context: &str,
) -> Result<Vec<String>, ApiError> {
    let entries = value.as_array().ok_or_else(|| ApiError::Malformed {
        context: context.to_string(),
        message: format!("'{key}' is not an array"),
    })?;
    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ApiError::Malformed {
                    context: context.to_string(),
                    message: format!("non-string entry under '{key}': {entry}"),
                })
        })
        .collect()
}

// ============================================================================
// SECTION 8: INFLUXDB WRITER
// ============================================================================
// One point per write call against the InfluxDB v1 HTTP API, rendered as
// line protocol with second precision. No batching: the write contract is
// one independent, non-atomic call per record.
// ============================================================================

// ----------------------------------------------------------------------------
// 8.1 PointWriter Trait
// ----------------------------------------------------------------------------

/// Outbound time-series write capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write_point(&self, point: &MetricPoint) -> Result<(), WriteError>;
}

// ----------------------------------------------------------------------------
// 8.2 Line Protocol Rendering
// ----------------------------------------------------------------------------

/// Render one point as an InfluxDB v1 line-protocol line with a trailing
/// unix-seconds timestamp.
///
/// Tags with empty values are dropped (the protocol rejects them), and a
/// point with no scalar fields is an error rather than a malformed line.
pub fn render_line(point: &MetricPoint) -> Result<String, WriteError> {
    if point.fields.is_empty() {
        return Err(WriteError::EmptyFields {
            measurement: point.measurement.clone(),
        });
    }
    let timestamp = parse_point_time(&point.time)
        .ok_or_else(|| WriteError::InvalidTime(point.time.clone()))?;

    let mut line = escape_measurement(&point.measurement);

    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_tag_component(key));
        line.push('=');
        line.push_str(&escape_tag_component(value));
    }

    line.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            line.push(',');
        }
        first = false;
        line.push_str(&escape_tag_component(key));
        line.push('=');
        line.push_str(&render_field_value(value));
    }

    line.push(' ');
    line.push_str(&timestamp.to_string());
    Ok(line)
}

fn escape_measurement(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == ',' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_tag_component(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if c == ',' || c == '=' || c == ' ' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Float(v) => format!("{v}"),
        FieldValue::Integer(v) => format!("{v}i"),
        FieldValue::Boolean(v) => v.to_string(),
        FieldValue::Text(v) => {
            let mut escaped = String::with_capacity(v.len() + 2);
            escaped.push('"');
            for c in v.chars() {
                if c == '"' || c == '\\' {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped.push('"');
            escaped
        }
    }
}

// ----------------------------------------------------------------------------
// 8.3 InfluxDB Client
// ----------------------------------------------------------------------------

/// Concrete `PointWriter` over the InfluxDB v1 `/write` endpoint.
#[derive(Debug)]
pub struct InfluxWriter {
    http: reqwest::Client,
    write_url: String,
    database: String,
    username: Option<String>,
    password: Option<String>,
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> Result<Self, WriteError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            write_url: format!("http://{}:{}/write", config.host, config.port),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write_point(&self, point: &MetricPoint) -> Result<(), WriteError> {
        let line = render_line(point)?;

        let mut query: Vec<(&str, &str)> = vec![("db", self.database.as_str()), ("precision", "s")];
        if let Some(username) = &self.username {
            query.push(("u", username.as_str()));
        }
        if let Some(password) = &self.password {
            query.push(("p", password.as_str()));
        }

        debug!(target: "vmax2influx::influx", measurement = %point.measurement, "writing point");
        let response = self
            .http
            .post(&self.write_url)
            .query(&query)
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION 9: COLLECTION PASS
// ============================================================================
// The single ETL pass. Categories run strictly in sequence and each one is
// isolated: a failure is logged with its category and the remaining
// categories still run. The pass as a whole fails only when every category
// failed. SRP and alert records reuse the timestamp of the last array-level
// entry, so those two are skipped (and counted as failed) when the array
// category produced nothing.
// ============================================================================

// ----------------------------------------------------------------------------
// 9.1 Metric Insertion
// ----------------------------------------------------------------------------

/// Tags attached to every point: serial number and location.
pub fn base_tags(config: &CollectorConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TAG_SERIAL.to_string(), config.array.serial_number.clone()),
        (TAG_LOCATION.to_string(), config.collector.location.clone()),
    ])
}

/// Write one point per entry of a performance response.
///
/// Each entry must carry an epoch-millisecond `timestamp`; the remaining
/// scalar members become the point's fields as-is. Returns the number of
/// points written.
pub async fn insert_metrics(
    writer: &dyn PointWriter,
    response: &MetricsResponse,
    measurement: &str,
    extra_tags: &BTreeMap<String, String>,
    base: &BTreeMap<String, String>,
) -> CollectorResult<usize> {
    let mut written = 0;
    for entry in &response.perf_data {
        let epoch_ms = entry
            .get(TIMESTAMP_KEY)
            .and_then(JsonValue::as_i64)
            .ok_or(ApiError::MissingKey {
                key: TIMESTAMP_KEY,
                context: measurement.to_string(),
            })?;
        let time = format_epoch_ms(epoch_ms).ok_or(ApiError::BadTimestamp { epoch_ms })?;

        let point = MetricPoint {
            measurement: measurement.to_string(),
            tags: overlay_tags(base, extra_tags),
            fields: scalar_fields(entry),
            time,
        };
        writer.write_point(&point).await?;
        written += 1;
    }
    Ok(written)
}

// ----------------------------------------------------------------------------
// 9.2 Per-Category Collection
// ----------------------------------------------------------------------------

/// Array-level metrics. The response is returned alongside the write count
/// because SRP and alert records reuse its final timestamp.
pub async fn collect_array(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    window: TimeWindow,
) -> CollectorResult<(MetricsResponse, usize)> {
    let response = api.array_metrics(window).await?;
    let written = insert_metrics(writer, &response, MEASUREMENT_ARRAY, &BTreeMap::new(), base).await?;
    Ok((response, written))
}

pub async fn collect_storage_groups(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    window: TimeWindow,
) -> CollectorResult<usize> {
    let ids = api.storage_group_ids().await?;
    let mut written = 0;
    for id in &ids {
        let response = api.storage_group_metrics(id, window).await?;
        let extra = BTreeMap::from([(TAG_STORAGE_GROUP.to_string(), id.clone())]);
        written += insert_metrics(writer, &response, MEASUREMENT_STORAGE_GROUP, &extra, base).await?;
    }
    Ok(written)
}

pub async fn collect_directors(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    window: TimeWindow,
) -> CollectorResult<usize> {
    let ids = api.director_ids().await?;
    let mut written = 0;
    for id in &ids {
        let response = api.director_metrics(id, window).await?;
        let director_type = response
            .attribute_str(DIRECTOR_TYPE_KEY)
            .ok_or_else(|| ApiError::MissingKey {
                key: DIRECTOR_TYPE_KEY,
                context: format!("director {id} metrics"),
            })?
            .to_string();
        let extra = BTreeMap::from([
            (TAG_DIRECTOR_ID.to_string(), id.clone()),
            (TAG_DIRECTOR_TYPE.to_string(), director_type),
        ]);
        written += insert_metrics(writer, &response, MEASUREMENT_DIRECTOR, &extra, base).await?;
    }
    Ok(written)
}

pub async fn collect_port_groups(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    window: TimeWindow,
) -> CollectorResult<usize> {
    let ids = api.port_group_ids().await?;
    let mut written = 0;
    for id in &ids {
        let response = api.port_group_metrics(id, window).await?;
        let extra = BTreeMap::from([(TAG_PORT_GROUP.to_string(), id.clone())]);
        written += insert_metrics(writer, &response, MEASUREMENT_PORT_GROUP, &extra, base).await?;
    }
    Ok(written)
}

pub async fn collect_hosts(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    window: TimeWindow,
) -> CollectorResult<usize> {
    let ids = api.host_ids().await?;
    let mut written = 0;
    for id in &ids {
        let response = api.host_metrics(id, window).await?;
        let extra = BTreeMap::from([(TAG_HOST.to_string(), id.clone())]);
        written += insert_metrics(writer, &response, MEASUREMENT_HOST, &extra, base).await?;
    }
    Ok(written)
}

// ----------------------------------------------------------------------------
// 9.3 SRP Capacity Records
// ----------------------------------------------------------------------------

/// Derived capacity fields from an SRP descriptor's scalar fields.
///
/// Returns `Ok(None)` when usable capacity is zero: fabricated percentages
/// would be indistinguishable from real data downstream, so the derived
/// fields are omitted instead. Missing or non-numeric capacity keys are an
/// error, matching the lookup contract of the performance path.
pub fn srp_capacity(fields: &BTreeMap<String, FieldValue>) -> Result<Option<(f64, f64)>, ApiError> {
    fn capacity_value(
        fields: &BTreeMap<String, FieldValue>,
        key: &'static str,
    ) -> Result<f64, ApiError> {
        fields
            .get(key)
            .and_then(FieldValue::as_f64)
            .ok_or(ApiError::MissingKey {
                key,
                context: "SRP descriptor".to_string(),
            })
    }

    let usable = capacity_value(fields, SRP_USABLE_KEY)?;
    let allocated = capacity_value(fields, SRP_ALLOCATED_KEY)?;
    if usable == 0.0 {
        return Ok(None);
    }
    let free = usable - allocated;
    Ok(Some((free, free / usable)))
}

/// One record per SRP: scalar descriptor fields plus derived free capacity,
/// timestamped with the array-level time passed in.
pub async fn collect_srps(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    time: &str,
) -> CollectorResult<usize> {
    let ids = api.srp_ids().await?;
    let mut written = 0;
    for id in &ids {
        let descriptor = api.srp(id).await?;
        let mut fields = scalar_fields(&descriptor);
        match srp_capacity(&fields)? {
            Some((free, percent)) => {
                fields.insert(FIELD_FREE_CAPACITY.to_string(), FieldValue::Float(free));
                fields.insert(FIELD_FREE_PERCENT.to_string(), FieldValue::Float(percent));
            }
            None => {
                warn!(target: "vmax2influx::srp", srp = %id,
                    "usable capacity is zero, omitting derived capacity fields");
            }
        }

        let mut tags = base.clone();
        tags.insert(TAG_SRP.to_string(), id.clone());
        let point = MetricPoint {
            measurement: MEASUREMENT_SRP.to_string(),
            tags,
            fields,
            time: time.to_string(),
        };
        writer.write_point(&point).await?;
        written += 1;
    }
    Ok(written)
}

// ----------------------------------------------------------------------------
// 9.4 Alert Aggregation
// ----------------------------------------------------------------------------

/// Exactly one Alerts record per run, aggregating severity counts into three
/// buckets: fatal+critical, minor+warning, information.
pub async fn collect_alerts(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    base: &BTreeMap<String, String>,
    time: &str,
) -> CollectorResult<usize> {
    let fatal = api.alert_ids(AlertSeverity::Fatal).await?.len();
    let critical = api.alert_ids(AlertSeverity::Critical).await?.len();
    let warning = api.alert_ids(AlertSeverity::Warning).await?.len();
    let minor = api.alert_ids(AlertSeverity::Minor).await?.len();
    let information = api.alert_ids(AlertSeverity::Information).await?.len();

    let point = MetricPoint::new(MEASUREMENT_ALERTS, time)
        .with_tags(base.clone())
        .with_field(
            FIELD_ALERTS_FATAL_CRITICAL,
            FieldValue::Integer((fatal + critical) as i64),
        )
        .with_field(
            FIELD_ALERTS_MINOR_WARNING,
            FieldValue::Integer((warning + minor) as i64),
        )
        .with_field(
            FIELD_ALERTS_INFORMATION,
            FieldValue::Integer(information as i64),
        );
    writer.write_point(&point).await?;
    Ok(1)
}

// ----------------------------------------------------------------------------
// 9.5 Run Orchestration
// ----------------------------------------------------------------------------

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Total points written across all categories
    pub points_written: usize,
    /// Categories that failed or were skipped
    pub failed_categories: Vec<String>,
}

impl RunSummary {
    fn succeed(&mut self, category: &'static str, written: usize) {
        self.points_written += written;
        debug!(target: "vmax2influx::run", category, points = written, "category collected");
    }

    fn fail(&mut self, category: &'static str, error: &CollectorError) {
        error!(target: "vmax2influx::run", category, kind = error.category(), %error,
            "category collection failed");
        self.failed_categories.push(category.to_string());
    }

    fn skip(&mut self, category: &'static str, reason: &str) {
        warn!(target: "vmax2influx::run", category, reason, "category skipped");
        self.failed_categories.push(category.to_string());
    }

    fn apply(&mut self, category: &'static str, outcome: CollectorResult<usize>) {
        match outcome {
            Ok(written) => self.succeed(category, written),
            Err(error) => self.fail(category, &error),
        }
    }
}

/// Run the full single-pass collection against one array.
///
/// Returns the run summary, or an error only when every category failed.
pub async fn run_collection(
    api: &dyn ArrayApi,
    writer: &dyn PointWriter,
    config: &CollectorConfig,
) -> CollectorResult<RunSummary> {
    let window = TimeWindow::trailing(config.collector.lookback_minutes);
    let base = base_tags(config);
    let mut summary = RunSummary::default();

    info!(target: "vmax2influx::run",
        array = %config.array.serial_number,
        start_ms = window.start_ms,
        end_ms = window.end_ms,
        "starting collection pass");

    let array_response = match collect_array(api, writer, &base, window).await {
        Ok((response, written)) => {
            summary.succeed(MEASUREMENT_ARRAY, written);
            Some(response)
        }
        Err(error) => {
            summary.fail(MEASUREMENT_ARRAY, &error);
            None
        }
    };

    summary.apply(
        MEASUREMENT_STORAGE_GROUP,
        collect_storage_groups(api, writer, &base, window).await,
    );
    summary.apply(
        MEASUREMENT_DIRECTOR,
        collect_directors(api, writer, &base, window).await,
    );
    summary.apply(
        MEASUREMENT_PORT_GROUP,
        collect_port_groups(api, writer, &base, window).await,
    );
    summary.apply(
        MEASUREMENT_HOST,
        collect_hosts(api, writer, &base, window).await,
    );

    // SRP and alert records reuse the final array-level entry timestamp.
    let array_time = array_response
        .as_ref()
        .and_then(MetricsResponse::last_timestamp_ms)
        .and_then(format_epoch_ms);
    match &array_time {
        Some(time) => {
            summary.apply(MEASUREMENT_SRP, collect_srps(api, writer, &base, time).await);
            summary.apply(
                MEASUREMENT_ALERTS,
                collect_alerts(api, writer, &base, time).await,
            );
        }
        None => {
            summary.skip(MEASUREMENT_SRP, "no array-level timestamp available");
            summary.skip(MEASUREMENT_ALERTS, "no array-level timestamp available");
        }
    }

    if summary.failed_categories.len() == CATEGORY_COUNT {
        return Err(CollectorError::AllCategoriesFailed(CATEGORY_COUNT));
    }

    info!(target: "vmax2influx::run",
        points = summary.points_written,
        failed = summary.failed_categories.len(),
        "collection pass complete");
    Ok(summary)
}

// ============================================================================
// SECTION 10: CLI & COMMAND LINE INTERFACE
// ============================================================================

// ----------------------------------------------------------------------------
// 10.1 CLI Argument Parser
// ----------------------------------------------------------------------------

/// VMAX to InfluxDB collector CLI
#[derive(Parser, Debug)]
#[command(
    name = "vmax2influx",
    author = "AIOps Team",
    version,
    about = "Single-pass metrics collector: Unisphere REST API to InfluxDB",
    long_about = "Pulls performance and alert metrics for one VMAX/PowerMax array \
                  from the Unisphere REST API over a trailing window and writes \
                  them to InfluxDB. Runs once and exits; schedule it externally."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "vmax2influx.toml", env = "VMAX2INFLUX_CONFIG")]
    pub config: PathBuf,

    /// Log level override
    #[arg(short, long, env = "VMAX2INFLUX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "VMAX2INFLUX_DEBUG")]
    pub debug: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one collection pass (the default)
    Run,

    /// Validate configuration file
    Validate {
        /// Show full parsed configuration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show collector version
    Version,
}

// ----------------------------------------------------------------------------
// 10.2 CLI Handler Functions
// ----------------------------------------------------------------------------

/// Handle the validate subcommand
fn handle_validate(config_path: &Path, verbose: bool) -> CollectorResult<()> {
    println!("Validating configuration file: {}", config_path.display());

    match CollectorConfig::load(config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid!");

            if verbose {
                println!("\n📋 Parsed configuration:");
                println!("{}", "=".repeat(60));
                match toml::to_string_pretty(&config) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(e) => println!("Failed to serialize: {e}"),
                }
            }

            println!("\n📊 Configuration Summary:");
            println!("  • Array serial: {}", config.array.serial_number);
            println!(
                "  • Unisphere endpoint: https://{}:{} (API v{})",
                config.array.host, config.array.port, config.array.api_version
            );
            println!(
                "  • InfluxDB endpoint: http://{}:{} (db: {})",
                config.influxdb.host, config.influxdb.port, config.influxdb.database
            );
            println!("  • Location tag: {}", config.collector.location);
            println!("  • Lookback window: {} minutes", config.collector.lookback_minutes);
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration is invalid: {e}");
            Err(e.into())
        }
    }
}

/// Handle the generate-config subcommand
fn handle_generate_config(output: Option<&Path>) -> CollectorResult<()> {
    let rendered = CollectorConfig::generate_default_config();
    match output {
        Some(path) => {
            std::fs::write(path, &rendered).map_err(|e| ConfigError::WriteFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            println!("✅ Default configuration written to {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Handle the version subcommand
fn handle_version() {
    println!("{COLLECTOR_FULL_NAME}");
    println!("  name:    {COLLECTOR_NAME}");
    println!("  version: {COLLECTOR_VERSION}");
}

// ============================================================================
// SECTION 11: MAIN ENTRY POINT
// ============================================================================

/// Main entry point for the collector
#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();

    // Handle subcommands that don't need full initialization
    match &cli.command {
        Some(Commands::Version) => {
            handle_version();
            return Ok(());
        }
        Some(Commands::GenerateConfig { output }) => {
            handle_generate_config(output.as_deref())?;
            return Ok(());
        }
        Some(Commands::Validate { verbose }) => {
            handle_validate(&cli.config, *verbose)?;
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    // Load configuration
    let config = CollectorConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    // Override log level if specified
    let mut logging_config = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging_config.level = level.clone();
    }
    if cli.debug {
        logging_config.level = "debug".into();
    }

    init_logging(&logging_config)?;

    info!("📡 {} v{}", COLLECTOR_FULL_NAME, COLLECTOR_VERSION);

    let api = UnisphereClient::new(&config.array)?;
    let writer = InfluxWriter::new(&config.influxdb)?;

    let summary = run_collection(&api, &writer, &config).await?;

    if summary.failed_categories.is_empty() {
        info!(points = summary.points_written, "run finished");
    } else {
        warn!(
            points = summary.points_written,
            failed = ?summary.failed_categories,
            "run finished with failed categories"
        );
    }

    Ok(())
}

// ============================================================================
// SECTION 12: CORE TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn obj(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("expected a JSON object, got {other}"),
        }
    }

    // ---- timestamp conversion ----

    #[rstest]
    #[case(1_700_000_000_000, "2023-11-14T22:13:20")]
    #[case(1_700_000_000_999, "2023-11-14T22:13:20")] // truncated, not rounded
    #[case(1_699_999_999_999, "2023-11-14T22:13:19")]
    #[case(0, "1970-01-01T00:00:00")]
    fn test_format_epoch_ms(#[case] epoch_ms: i64, #[case] expected: &str) {
        assert_eq!(format_epoch_ms(epoch_ms).as_deref(), Some(expected));
    }

    #[test]
    fn test_parse_point_time() {
        assert_eq!(parse_point_time("2023-11-14T22:13:20"), Some(1_700_000_000));
        assert_eq!(parse_point_time("not-a-time"), None);
        assert_eq!(parse_point_time("2023-11-14 22:13:20"), None);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let formatted = format_epoch_ms(1_700_000_000_000).unwrap();
        assert_eq!(parse_point_time(&formatted), Some(1_700_000_000));
    }

    #[test]
    fn test_trailing_window_length() {
        let window = TimeWindow::trailing(15);
        assert_eq!(window.end_ms - window.start_ms, 900_000);
    }

    // ---- field values ----

    #[test]
    fn test_field_value_from_json() {
        assert_eq!(FieldValue::from_json(&json!(42)), Some(FieldValue::Integer(42)));
        assert_eq!(FieldValue::from_json(&json!(2.5)), Some(FieldValue::Float(2.5)));
        assert_eq!(
            FieldValue::from_json(&json!("srp_1")),
            Some(FieldValue::Text("srp_1".to_string()))
        );
        assert_eq!(FieldValue::from_json(&json!(true)), Some(FieldValue::Boolean(true)));
        assert_eq!(FieldValue::from_json(&json!([1, 2])), None);
        assert_eq!(FieldValue::from_json(&json!({"a": 1})), None);
        assert_eq!(FieldValue::from_json(&JsonValue::Null), None);
    }

    #[test]
    fn test_scalar_fields_strips_sequences() {
        let raw = obj(json!({
            "num": 1.5,
            "count": 7,
            "name": "srp_1",
            "flag": true,
            "list": [1, 2],
            "nested": {"a": 1},
            "nothing": null,
        }));
        let fields = scalar_fields(&raw);

        assert_eq!(fields.len(), 4);
        assert_eq!(fields.get("num"), Some(&FieldValue::Float(1.5)));
        assert_eq!(fields.get("count"), Some(&FieldValue::Integer(7)));
        assert_eq!(fields.get("name"), Some(&FieldValue::Text("srp_1".to_string())));
        assert_eq!(fields.get("flag"), Some(&FieldValue::Boolean(true)));
        assert!(!fields.contains_key("list"));
        assert!(!fields.contains_key("nested"));
        assert!(!fields.contains_key("nothing"));
    }

    #[test]
    fn test_overlay_tags_caller_wins() {
        let base = BTreeMap::from([
            (TAG_SERIAL.to_string(), "000197812345".to_string()),
            (TAG_LOCATION.to_string(), "Boston, MA".to_string()),
        ]);
        let extra = BTreeMap::from([
            (TAG_LOCATION.to_string(), "DR Site".to_string()),
            (TAG_HOST.to_string(), "db01".to_string()),
        ]);

        let merged = overlay_tags(&base, &extra);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get(TAG_SERIAL).map(String::as_str), Some("000197812345"));
        assert_eq!(merged.get(TAG_LOCATION).map(String::as_str), Some("DR Site"));
        assert_eq!(merged.get(TAG_HOST).map(String::as_str), Some("db01"));
    }

    #[test]
    fn test_metric_point_builder() {
        let point = MetricPoint::new("Array", "2023-11-14T22:13:20")
            .with_tag("S/N", "000197812345")
            .with_field("iops", FieldValue::Integer(42));

        assert_eq!(point.measurement, "Array");
        assert_eq!(point.time, "2023-11-14T22:13:20");
        assert_eq!(point.tags.get("S/N").map(String::as_str), Some("000197812345"));
        assert_eq!(point.fields.get("iops"), Some(&FieldValue::Integer(42)));
    }

    // ---- SRP capacity math ----

    #[test]
    fn test_srp_capacity_identity() {
        let fields = BTreeMap::from([
            (SRP_USABLE_KEY.to_string(), FieldValue::Float(1000.0)),
            (SRP_ALLOCATED_KEY.to_string(), FieldValue::Float(250.0)),
        ]);

        let (free, percent) = srp_capacity(&fields).unwrap().unwrap();
        assert_eq!(free, 750.0);
        assert_eq!(free + 250.0, 1000.0);
        assert!((percent - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_srp_capacity_integer_fields() {
        let fields = BTreeMap::from([
            (SRP_USABLE_KEY.to_string(), FieldValue::Integer(200)),
            (SRP_ALLOCATED_KEY.to_string(), FieldValue::Integer(50)),
        ]);

        let (free, percent) = srp_capacity(&fields).unwrap().unwrap();
        assert_eq!(free, 150.0);
        assert!((percent - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_srp_capacity_zero_usable_is_guarded() {
        let fields = BTreeMap::from([
            (SRP_USABLE_KEY.to_string(), FieldValue::Float(0.0)),
            (SRP_ALLOCATED_KEY.to_string(), FieldValue::Float(0.0)),
        ]);

        assert_eq!(srp_capacity(&fields).unwrap(), None);
    }

    #[test]
    fn test_srp_capacity_missing_key_is_error() {
        let fields = BTreeMap::from([(SRP_USABLE_KEY.to_string(), FieldValue::Float(1000.0))]);

        let result = srp_capacity(&fields);
        assert!(matches!(
            result,
            Err(ApiError::MissingKey { key: SRP_ALLOCATED_KEY, .. })
        ));
    }

    // ---- director classification ----

    #[rstest]
    #[case("FA-1D", Some(DirectorClass::FrontEnd))]
    #[case("SE-2E", Some(DirectorClass::FrontEnd))]
    #[case("DF-2C", Some(DirectorClass::BackEnd))]
    #[case("RF-1E", Some(DirectorClass::Rdf))]
    #[case("IM-3A", Some(DirectorClass::Infrastructure))]
    #[case("ED-4B", Some(DirectorClass::Eds))]
    #[case("df-2c", Some(DirectorClass::BackEnd))]
    #[case("XX-1", None)]
    #[case("", None)]
    fn test_director_classification(#[case] id: &str, #[case] expected: Option<DirectorClass>) {
        assert_eq!(DirectorClass::classify(id), expected);
    }

    #[test]
    fn test_director_class_names() {
        assert_eq!(DirectorClass::FrontEnd.as_str(), "FE");
        assert_eq!(DirectorClass::FrontEnd.performance_category(), "FEDirector");
        assert_eq!(DirectorClass::BackEnd.as_str(), "BE");
        assert_eq!(DirectorClass::Rdf.performance_category(), "RDFDirector");
    }

    #[test]
    fn test_alert_severity_names() {
        assert_eq!(AlertSeverity::Fatal.as_str(), "FATAL");
        assert_eq!(AlertSeverity::Critical.as_str(), "CRITICAL");
        assert_eq!(AlertSeverity::Warning.as_str(), "WARNING");
        assert_eq!(AlertSeverity::Minor.as_str(), "MINOR");
        assert_eq!(AlertSeverity::Information.as_str(), "INFORMATION");
    }

    // ---- performance normalization ----

    #[test]
    fn test_normalize_performance() {
        let body = json!({
            "resultList": {
                "result": [
                    {"timestamp": 1_700_000_000_000i64, "iops": 42},
                    {"timestamp": 1_700_000_300_000i64, "iops": 43},
                ],
                "from": 1,
                "to": 2,
            },
            "count": 2,
        });

        let response = normalize_performance(&body, "Array").unwrap();
        assert_eq!(response.perf_data.len(), 2);
        assert_eq!(response.last_timestamp_ms(), Some(1_700_000_300_000));
    }

    #[test]
    fn test_normalize_performance_missing_result_list() {
        let body = json!({"count": 0});
        let result = normalize_performance(&body, "Array");
        assert!(matches!(result, Err(ApiError::MissingKey { key: "resultList", .. })));
    }

    #[test]
    fn test_last_timestamp_of_empty_response() {
        assert_eq!(MetricsResponse::default().last_timestamp_ms(), None);
    }

    // ---- line protocol ----

    #[test]
    fn test_render_line_escaping() {
        let point = MetricPoint::new("Storage Group", "2023-11-14T22:13:20")
            .with_tag("Location", "Boston, MA")
            .with_tag("S/N", "000197812345")
            .with_field("iops", FieldValue::Integer(42))
            .with_field("response_time", FieldValue::Float(1.5));

        assert_eq!(
            render_line(&point).unwrap(),
            "Storage\\ Group,Location=Boston\\,\\ MA,S/N=000197812345 iops=42i,response_time=1.5 1700000000"
        );
    }

    #[test]
    fn test_render_line_string_and_bool_fields() {
        let point = MetricPoint::new("M", "2023-11-14T22:13:20")
            .with_field("note", FieldValue::Text(r#"a"b\c"#.to_string()))
            .with_field("up", FieldValue::Boolean(true));

        assert_eq!(
            render_line(&point).unwrap(),
            r#"M note="a\"b\\c",up=true 1700000000"#
        );
    }

    #[test]
    fn test_render_line_skips_empty_tag_values() {
        let point = MetricPoint::new("M", "2023-11-14T22:13:20")
            .with_tag("Location", "")
            .with_tag("S/N", "X")
            .with_field("f", FieldValue::Integer(1));

        assert_eq!(render_line(&point).unwrap(), "M,S/N=X f=1i 1700000000");
    }

    #[test]
    fn test_render_line_rejects_empty_fields() {
        let point = MetricPoint::new("Alerts", "2023-11-14T22:13:20");
        assert!(matches!(
            render_line(&point),
            Err(WriteError::EmptyFields { .. })
        ));
    }

    #[test]
    fn test_render_line_rejects_bad_time() {
        let point =
            MetricPoint::new("Array", "nope").with_field("f", FieldValue::Integer(1));
        assert!(matches!(render_line(&point), Err(WriteError::InvalidTime(_))));
    }

    // ---- configuration ----

    const VALID_CONFIG: &str = r#"
        [influxdb]
        host = "influx.example.com"
        database = "vmaxdb"

        [array]
        serial_number = "000197812345"
        host = "unisphere.example.com"

        [collector]
        location = "Boston, MA"
    "#;

    #[test]
    fn test_config_defaults() {
        let config = CollectorConfig::default();

        assert_eq!(config.influxdb.host, "localhost");
        assert_eq!(config.influxdb.port, DEFAULT_INFLUX_PORT);
        assert_eq!(config.influxdb.database, "vmaxdb");
        assert_eq!(config.array.port, DEFAULT_UNISPHERE_PORT);
        assert_eq!(config.array.username, "smc");
        assert_eq!(config.array.api_version, DEFAULT_API_VERSION);
        assert!(!config.array.verify_tls);
        assert_eq!(config.collector.lookback_minutes, DEFAULT_LOOKBACK_MINUTES);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_from_str_valid() {
        let config = CollectorConfig::from_str(VALID_CONFIG).unwrap();

        assert_eq!(config.array.serial_number, "000197812345");
        assert_eq!(config.collector.location, "Boston, MA");
        assert_eq!(config.influxdb.username, None);
        // unspecified values fall back to defaults
        assert_eq!(config.array.port, 8443);
        assert_eq!(config.collector.lookback_minutes, 15);
    }

    #[test]
    fn test_config_rejects_empty_serial() {
        let result = CollectorConfig::default().validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "array.serial_number"
        ));
    }

    #[test]
    fn test_config_rejects_zero_lookback() {
        let mut config = CollectorConfig::from_str(VALID_CONFIG).unwrap();
        config.collector.lookback_minutes = 0;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "collector.lookback_minutes"
        ));
    }

    #[test]
    fn test_config_rejects_unknown_log_format() {
        let mut config = CollectorConfig::from_str(VALID_CONFIG).unwrap();
        config.logging.format = "xml".to_string();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "logging.format"
        ));
    }

    #[test]
    fn test_generate_default_config_renders_all_sections() {
        let rendered = CollectorConfig::generate_default_config();
        assert!(rendered.contains("[influxdb]"));
        assert!(rendered.contains("[array]"));
        assert!(rendered.contains("[collector]"));
        assert!(rendered.contains("[logging]"));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmax2influx.toml");
        std::fs::write(&path, VALID_CONFIG).unwrap();

        let config = CollectorConfig::load(&path).unwrap();
        assert_eq!(config.array.serial_number, "000197812345");
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let result = CollectorConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    // ---- error categories ----

    #[test]
    fn test_error_categories() {
        let config_err: CollectorError = ConfigError::InvalidValue {
            field: "x".to_string(),
            message: "y".to_string(),
        }
        .into();
        assert_eq!(config_err.category(), "config");

        let api_err: CollectorError = ApiError::MissingKey {
            key: "timestamp",
            context: "Array".to_string(),
        }
        .into();
        assert_eq!(api_err.category(), "api");

        let write_err: CollectorError = WriteError::EmptyFields {
            measurement: "SRP".to_string(),
        }
        .into();
        assert_eq!(write_err.category(), "write");

        assert_eq!(CollectorError::AllCategoriesFailed(7).category(), "run");
    }
}

// ============================================================================
// SECTION 13: PIPELINE TESTS
// ============================================================================
// Collection pass exercised end-to-end against a mocked array API and a
// recording writer.
// ============================================================================
