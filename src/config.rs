//! Run configuration — CLI flags, environment, and an optional JSON file.
//!
//! Precedence is CLI/env over file over built-in defaults. Everything is
//! validated up front so a bad setting never reaches the worker pool.

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SHUTTLE: &str = "shuttle-5.estuary.tech";
pub const DEFAULT_WORKERS: i64 = 10;
pub const DEFAULT_FROM_DATE: &str = "2000-01-01";
pub const DEFAULT_TO_DATE: &str = "2023-12-31";
pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("numOfWorkers must be at least 1 (got {0})")]
    InvalidWorkerCount(i64),

    #[error("{field} is not a valid YYYY-MM-DD date: '{value}'")]
    InvalidDate {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("date range is inverted: {from} is after {to}")]
    InvertedDateRange { from: NaiveDate, to: NaiveDate },

    #[error("shuttle host must not be empty")]
    EmptyShuttle,

    #[error("no content index configured (set --db-path, AUDIT_DB_PATH or dbPath)")]
    MissingDbPath,

    #[error("unsupported gateway scheme '{0}' (expected http or https)")]
    InvalidScheme(String),

    #[error("probe timeout must be greater than zero")]
    ZeroProbeTimeout,

    #[error("failed to read config file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ── CLI ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Command-line surface. Every setting is optional here so the config file
/// can fill the gaps.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON config file supplying defaults for the options below.
    #[arg(long, env = "AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Shuttle host: selects contents stored there and is the gateway probed.
    #[arg(long, env = "AUDIT_SHUTTLE")]
    pub shuttle: Option<String>,

    #[arg(
        long = "num-of-workers",
        alias = "numOfWorkers",
        env = "AUDIT_NUM_OF_WORKERS",
        allow_negative_numbers = true
    )]
    pub num_of_workers: Option<i64>,

    /// First creation date included (YYYY-MM-DD).
    #[arg(long = "from-date-range", alias = "fromDateRange", env = "AUDIT_FROM_DATE_RANGE")]
    pub from_date_range: Option<String>,

    /// Last creation date included (YYYY-MM-DD).
    #[arg(long = "to-date-range", alias = "toDateRange", env = "AUDIT_TO_DATE_RANGE")]
    pub to_date_range: Option<String>,

    /// SQLite content index holding the `contents` and `shuttles` tables.
    #[arg(long, env = "AUDIT_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "AUDIT_GATEWAY_SCHEME")]
    pub gateway_scheme: Option<String>,

    #[arg(long, env = "AUDIT_PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: Option<u64>,

    /// Give up waiting for outstanding probes after this many seconds.
    #[arg(long, env = "AUDIT_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub summary_json: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "AUDIT_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ── Config File ─────────────────────────────────────────────────────

/// Shape of the optional config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    pub shuttle: Option<String>,
    pub num_of_workers: Option<i64>,
    pub from_date_range: Option<String>,
    pub to_date_range: Option<String>,
    pub db_path: Option<PathBuf>,
    pub gateway_scheme: Option<String>,
    pub probe_timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Validated Config ────────────────────────────────────────────────

/// Validated settings for one audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub shuttle: String,
    pub worker_count: usize,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub db_path: PathBuf,
    pub gateway_scheme: String,
    pub probe_timeout: Duration,
    pub deadline: Option<Duration>,
}

impl AuditConfig {
    /// Load the config file named by `args` (if any) and merge.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(args, file)
    }

    pub fn from_layers(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let shuttle = args
            .shuttle
            .clone()
            .or(file.shuttle)
            .unwrap_or_else(|| DEFAULT_SHUTTLE.to_string());
        let shuttle = shuttle.trim().to_string();
        if shuttle.is_empty() {
            return Err(ConfigError::EmptyShuttle);
        }

        let workers = args.num_of_workers.or(file.num_of_workers).unwrap_or(DEFAULT_WORKERS);
        let worker_count = usize::try_from(workers)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(ConfigError::InvalidWorkerCount(workers))?;

        let from_raw = args
            .from_date_range
            .clone()
            .or(file.from_date_range)
            .unwrap_or_else(|| DEFAULT_FROM_DATE.to_string());
        let to_raw = args
            .to_date_range
            .clone()
            .or(file.to_date_range)
            .unwrap_or_else(|| DEFAULT_TO_DATE.to_string());
        let from_date = parse_date("fromDateRange", &from_raw)?;
        let to_date = parse_date("toDateRange", &to_raw)?;
        if from_date > to_date {
            return Err(ConfigError::InvertedDateRange { from: from_date, to: to_date });
        }

        let db_path = args
            .db_path
            .clone()
            .or(file.db_path)
            .ok_or(ConfigError::MissingDbPath)?;

        let gateway_scheme = args
            .gateway_scheme
            .clone()
            .or(file.gateway_scheme)
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string())
            .to_ascii_lowercase();
        if gateway_scheme != "http" && gateway_scheme != "https" {
            return Err(ConfigError::InvalidScheme(gateway_scheme));
        }

        let timeout_secs = args
            .probe_timeout_secs
            .or(file.probe_timeout_secs)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }

        let deadline = args
            .deadline_secs
            .or(file.deadline_secs)
            .map(Duration::from_secs);

        Ok(Self {
            shuttle,
            worker_count,
            from_date,
            to_date,
            db_path,
            gateway_scheme,
            probe_timeout: Duration::from_secs(timeout_secs),
            deadline,
        })
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|source| ConfigError::InvalidDate {
        field,
        value: value.to_string(),
        source,
    })
}
