use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;
use crate::command::CommandConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logo: LogoConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

/// Poll loop and claim timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Identity written into claims and ledger entries.
    /// Falls back to the HOSTNAME environment variable.
    #[serde(default)]
    pub holder_id: Option<String>,

    /// Sleep between scans that made no progress (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Feed page size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Age after which another worker may take over a claim.
    #[serde(default = "default_stale_claim")]
    pub stale_claim_secs: u64,

    /// Upper bound on a single pipeline step.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Upper bound on a whole run, all steps included.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Backward adjustment of the poll marker for feed clock drift.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,

    /// How far back the first scan looks when the ledger is empty.
    #[serde(default = "default_initial_lookback")]
    pub initial_lookback_secs: u64,
}

fn default_poll_interval() -> u64 {
    3000 // 3 seconds
}

fn default_batch_size() -> usize {
    100
}

fn default_stale_claim() -> u64 {
    1800 // 30 minutes
}

fn default_step_timeout() -> u64 {
    300 // 5 minutes
}

fn default_run_timeout() -> u64 {
    1200 // 20 minutes
}

fn default_clock_skew() -> u64 {
    300 // 5 minutes
}

fn default_initial_lookback() -> u64 {
    86400 // 1 day
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            holder_id: None,
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            stale_claim_secs: default_stale_claim(),
            step_timeout_secs: default_step_timeout(),
            run_timeout_secs: default_run_timeout(),
            clock_skew_secs: default_clock_skew(),
            initial_lookback_secs: default_initial_lookback(),
        }
    }
}

impl WorkerConfig {
    /// Configured holder id, else `hostname`; blank values count as absent.
    pub fn resolve_holder_id(&self, hostname: Option<String>) -> Result<String, ConfigError> {
        self.holder_id
            .clone()
            .into_iter()
            .chain(hostname)
            .map(|h| h.trim().to_string())
            .find(|h| !h.is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError(
                    "worker.holder_id is not set and HOSTNAME is empty".to_string(),
                )
            })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn stale_claim_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_claim_secs as i64)
    }

    pub fn clock_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.clock_skew_secs as i64)
    }

    pub fn initial_lookback(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.initial_lookback_secs as i64)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file shared by every worker process.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("pdfpost.db")
}

fn default_busy_timeout() -> u64 {
    5000
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Logo stamping pipeline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogoConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Report names eligible for stamping, e.g. `["R5542565"]`.
    #[serde(default)]
    pub reports: Vec<String>,
    /// Directory holding produced files, named by file id.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    /// Scratch directory for backups and stamped output.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub stamper: Option<CommandConfig>,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            reports: Vec::new(),
            source_dir: None,
            work_dir: default_work_dir(),
            stamper: None,
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("wrkdir")
}

/// Report mailing pipeline
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub reports: Vec<String>,
    /// Directory holding produced files; attachments are read from here.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    #[serde(default)]
    pub sender: Option<CommandConfig>,
}

/// Sanitized config for API responses (mail command arguments hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub worker: WorkerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub logo: LogoConfig,
    pub mail: SanitizedMailConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMailConfig {
    pub enabled: bool,
    pub reports: Vec<String>,
    pub source_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<SanitizedCommand>,
}

/// Program name only; the argument count shows whether arguments are set.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCommand {
    pub program: String,
    pub args_configured: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            worker: config.worker.clone(),
            database: config.database.clone(),
            logging: config.logging.clone(),
            server: config.server.clone(),
            logo: config.logo.clone(),
            mail: SanitizedMailConfig {
                enabled: config.mail.enabled,
                reports: config.mail.reports.clone(),
                source_dir: config.mail.source_dir.clone(),
                sender: config.mail.sender.as_ref().map(|s| SanitizedCommand {
                    program: s.program.clone(),
                    args_configured: s.args.len(),
                }),
            },
        }
    }
}
