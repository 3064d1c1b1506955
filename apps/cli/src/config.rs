//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/packmule/config.toml`
//! - Windows: `%APPDATA%/packmule/config.toml`

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use packmule_scheduler::DEFAULT_CONCURRENT_UPLOADS;
use packmule_transfer::MAX_UPLOAD_ATTEMPTS;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name attached to every upload's metadata (hostname by default).
    #[serde(default = "default_submitter")]
    pub submitter: String,

    /// Destination directory used when none is given on the command line.
    #[serde(default)]
    pub destination: String,

    /// Uploads in flight at once. `0` sends the whole batch at once.
    #[serde(default = "default_concurrent_uploads")]
    pub concurrent_uploads: usize,

    /// Transmission attempts per file before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_submitter() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "packmule".into())
}

fn default_concurrent_uploads() -> usize {
    DEFAULT_CONCURRENT_UPLOADS
}

fn default_max_attempts() -> u32 {
    MAX_UPLOAD_ATTEMPTS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            submitter: default_submitter(),
            destination: String::new(),
            concurrent_uploads: DEFAULT_CONCURRENT_UPLOADS,
            max_attempts: MAX_UPLOAD_ATTEMPTS,
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = AppConfig::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Saves the current configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("packmule").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("packmule")
            .join("config.toml")
    }
}
