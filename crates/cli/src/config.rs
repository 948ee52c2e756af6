//! Server configuration.
//!
//! Settings are resolved from, in increasing priority: built-in defaults, an
//! optional TOML file (`--config`), `PROCTRACK_*` environment variables and
//! command line flags.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//! api_key = "change-me"
//!
//! [storage]
//! data = "/var/lib/proctrack/processes.json"
//!
//! [validation]
//! strict_apps = true
//! ```

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Deserialize;

use proctrack_core::ValidationRules;

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_DATA_FILE: &str = "processes.json";

pub(crate) const ENV_PORT: &str = "PROCTRACK_PORT";
pub(crate) const ENV_DATA: &str = "PROCTRACK_DATA";
pub(crate) const ENV_API_KEY: &str = "PROCTRACK_API_KEY";
pub(crate) const ENV_STRICT_APPS: &str = "PROCTRACK_STRICT_APPS";

// ── File format ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub validation: ValidationSection,
}

/// `[server]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServerSection {
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

/// `[storage]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct StorageSection {
    /// Path of the process table file.
    pub data: Option<PathBuf>,
    /// Keep records in memory only.
    #[serde(default)]
    pub memory: bool,
}

/// `[validation]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ValidationSection {
    #[serde(default)]
    pub strict_apps: bool,
}

pub(crate) fn read_config_file(path: &Path) -> Result<ConfigFile, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

// ── Flags ────────────────────────────────────────────────────────────────────

/// Flags shared by `serve` and the offline data commands.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct StorageArgs {
    /// Path of the process table file
    #[arg(long)]
    pub data: Option<PathBuf>,
    /// Restrict appsUsed entries to the known application list
    #[arg(long)]
    pub strict_apps: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub(crate) struct ServeArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
    /// Keep records in memory only (nothing is written to disk)
    #[arg(long, conflicts_with = "data")]
    pub memory: bool,
    /// Require this API key on every route except /health
    #[arg(long)]
    pub api_key: Option<String>,
    /// Path to TLS certificate PEM file (requires --tls-key)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,
    /// Path to TLS private key PEM file (requires --tls-cert)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
    #[command(flatten)]
    pub storage: StorageArgs,
}

// ── Resolved settings ────────────────────────────────────────────────────────

/// Where the server keeps its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DataLocation {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    pub port: u16,
    pub data: DataLocation,
    pub api_key: Option<String>,
    pub rules: ValidationRules,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
}

fn env_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Data file for the offline commands: flag, then environment, then default.
pub(crate) fn resolve_data_path(
    args: &StorageArgs,
    env: impl Fn(&str) -> Option<String>,
) -> PathBuf {
    args.data
        .clone()
        .or_else(|| env(ENV_DATA).filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE))
}

pub(crate) fn resolve_rules(args: &StorageArgs, env: impl Fn(&str) -> Option<String>) -> ValidationRules {
    ValidationRules {
        strict_apps: args.strict_apps || env(ENV_STRICT_APPS).is_some_and(|v| env_flag(&v)),
    }
}

impl ServeConfig {
    /// Resolve the server settings. `env` looks up environment variables so
    /// tests can supply their own.
    pub(crate) fn resolve(
        args: &ServeArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let file = match &args.config {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };

        let env_port = match env(ENV_PORT).filter(|v| !v.is_empty()) {
            Some(text) => Some(
                text.trim()
                    .parse::<u16>()
                    .map_err(|_| format!("{ENV_PORT} must be a port number, got '{text}'"))?,
            ),
            None => None,
        };
        let port = args
            .port
            .or(env_port)
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);

        let data = if args.memory {
            DataLocation::Memory
        } else if let Some(path) = &args.storage.data {
            DataLocation::File(path.clone())
        } else if let Some(path) = env(ENV_DATA).filter(|v| !v.is_empty()) {
            DataLocation::File(PathBuf::from(path))
        } else if file.storage.memory {
            DataLocation::Memory
        } else {
            DataLocation::File(
                file.storage
                    .data
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE)),
            )
        };

        let api_key = args
            .api_key
            .clone()
            .or_else(|| env(ENV_API_KEY))
            .or(file.server.api_key)
            .filter(|k| !k.is_empty());

        let strict_apps = args.storage.strict_apps
            || match env(ENV_STRICT_APPS) {
                Some(value) => env_flag(&value),
                None => file.validation.strict_apps,
            };

        let tls_cert = args.tls_cert.clone().or(file.server.tls_cert);
        let tls_key = args.tls_key.clone().or(file.server.tls_key);
        if tls_cert.is_some() != tls_key.is_some() {
            return Err("--tls-cert and --tls-key must both be provided".to_string());
        }

        Ok(Self {
            port,
            data,
            api_key,
            rules: ValidationRules { strict_apps },
            tls_cert,
            tls_key,
        })
    }
}
