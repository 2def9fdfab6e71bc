//! Server configuration
//!
//! Sources are layered, later ones winning: the optional YAML file,
//! `PROMPTWALL__*` environment variables, then command-line flags.

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use promptwall_telemetry::PersistenceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Default)]
#[command(name = "promptwall-server")]
#[command(about = "PromptWall policy firewall for LLM prompts and responses", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PROMPTWALL_CONFIG", default_value = "promptwall.yaml")]
    pub config: PathBuf,

    /// Initial policy rules file (YAML)
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    /// Listen address
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Directory for the persisted audit log; enables auditing
    #[arg(long)]
    pub audit_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Rules loaded at startup; a missing file starts with no rules
    #[serde(default = "default_policy_path")]
    pub policy_path: PathBuf,

    /// Bearer token required to change the policy or read the audit log
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Maximum accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allow cross-origin requests from any origin (admin console, demo page)
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl ServerConfig {
    /// Load configuration from file, environment and CLI overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::from_sources(&cli.config)?;

        if let Some(ref policy) = cli.policy {
            config.policy_path = policy.clone();
        }

        if let Some(ref listen) = cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(ref audit_dir) = cli.audit_dir {
            config.audit.enabled = true;
            config.audit.audit_dir = audit_dir.clone();
        }

        if cli.log_json {
            config.log_format = LogFormat::Json;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_sources(path: &Path) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix("PROMPTWALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than zero");
        }

        if matches!(self.admin_token.as_deref(), Some(token) if token.trim().is_empty()) {
            anyhow::bail!("admin_token must not be empty when set");
        }

        if self.audit.enabled && self.audit.flush_interval == 0 {
            anyhow::bail!("audit.flush_interval must be greater than zero");
        }

        Ok(())
    }

    /// Socket address string to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            policy_path: default_policy_path(),
            admin_token: None,
            max_body_bytes: default_max_body_bytes(),
            cors_allow_any_origin: false,
            log_format: LogFormat::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,

    /// Flush to disk after this many records
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,

    /// Rotate the current file beyond this size (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Rotate the current file once it is this old (seconds)
    #[serde(default = "default_max_file_age_secs")]
    pub max_file_age_secs: u64,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl AuditConfig {
    pub fn persistence(&self) -> PersistenceConfig {
        PersistenceConfig {
            audit_dir: self.audit_dir.clone(),
            max_file_size: self.max_file_size,
            max_file_age_secs: self.max_file_age_secs,
            flush_interval: self.flush_interval,
            retention_days: self.retention_days,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            audit_dir: default_audit_dir(),
            flush_interval: default_flush_interval(),
            max_file_size: default_max_file_size(),
            max_file_age_secs: default_max_file_age_secs(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_policy_path() -> PathBuf {
    PathBuf::from("./policy.yaml")
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_audit_dir() -> PathBuf {
    PathBuf::from("./audit")
}

fn default_flush_interval() -> usize {
    10
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}

fn default_max_file_age_secs() -> u64 {
    86400
}

fn default_retention_days() -> u32 {
    90
}
