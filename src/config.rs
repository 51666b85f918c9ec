//! Runtime configuration.
//!
//! Settings are read from an optional `rollcall.toml`, with environment
//! variables (`ROLLCALL_EXTRACTOR_URL`, `ROLLCALL_DB`) taking precedence
//! over the file. Every field has a default so a missing file is not an
//! error; in particular, an absent database path means the commit sink
//! runs in detached mode rather than failing hard.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_FILE: &str = "rollcall.toml";

fn default_extractor_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_extraction_timeout() -> u64 {
    30
}

fn default_commit_timeout() -> u64 {
    10
}

fn default_ack_display() -> u64 {
    3
}

/// On-disk representation of `rollcall.toml`.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    /// Base URL of the extraction pipeline service.
    #[serde(default = "default_extractor_url")]
    extractor_url: String,

    /// SQLite database path. Absent means detached mode.
    #[serde(default)]
    database: Option<PathBuf>,

    #[serde(default = "default_extraction_timeout")]
    extraction_timeout_secs: u64,

    #[serde(default = "default_commit_timeout")]
    commit_timeout_secs: u64,

    /// How long the committed acknowledgment stays up before the workflow
    /// relaxes back to reviewing.
    #[serde(default = "default_ack_display")]
    ack_display_secs: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            extractor_url: default_extractor_url(),
            database: None,
            extraction_timeout_secs: default_extraction_timeout(),
            commit_timeout_secs: default_commit_timeout(),
            ack_display_secs: default_ack_display(),
        }
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub extractor_url: String,
    pub database: Option<PathBuf>,
    pub extraction_timeout_secs: u64,
    pub commit_timeout_secs: u64,
    pub ack_display_secs: u64,
}

impl Config {
    /// Load configuration from an explicit file, or from `rollcall.toml`
    /// in the current directory when present, then apply env overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => {
                let default_path = Path::new(CONFIG_FILE);
                if default_path.exists() {
                    let raw = std::fs::read_to_string(default_path)
                        .context("Failed to read rollcall.toml")?;
                    toml::from_str(&raw).context("Failed to parse rollcall.toml")?
                } else {
                    ConfigFile::default()
                }
            }
        };

        Ok(Self::from_file(file))
    }

    fn from_file(file: ConfigFile) -> Self {
        let extractor_url = std::env::var("ROLLCALL_EXTRACTOR_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(file.extractor_url);

        let database = std::env::var("ROLLCALL_DB")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or(file.database);

        Self {
            extractor_url,
            database,
            extraction_timeout_secs: file.extraction_timeout_secs,
            commit_timeout_secs: file.commit_timeout_secs,
            ack_display_secs: file.ack_display_secs,
        }
    }

    /// Whether the commit sink will run against real storage.
    pub fn storage_configured(&self) -> bool {
        self.database.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}
