//! Configuration loading for the cron daemon.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/task-cron/config.toml.

use std::collections::BTreeMap;
use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::CronError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// IANA timezone cron expressions are evaluated in
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Seconds to wait for running jobs on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Known storages and their repository ids.
    /// Backs the `storageId` and `repositoryId` autocomplete sources.
    #[serde(default)]
    pub storages: BTreeMap<String, Vec<String>>,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "task-cron")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_http_port() -> u16 {
    48080
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            http_port: default_http_port(),
            http_host: default_http_host(),
            log_level: default_log_level(),
            default_timezone: default_timezone(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            storages: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/task-cron/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (CRON_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, CronError> {
        let config_dir = ProjectDirs::from("", "", "task-cron")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| CronError::Config(e.to_string()))?
            .set_default("http_port", default_http_port() as i64)
            .map_err(|e| CronError::Config(e.to_string()))?
            .set_default("http_host", default_http_host())
            .map_err(|e| CronError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| CronError::Config(e.to_string()))?
            .set_default("default_timezone", default_timezone())
            .map_err(|e| CronError::Config(e.to_string()))?
            .set_default("shutdown_timeout_secs", default_shutdown_timeout() as i64)
            .map_err(|e| CronError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: CRON_DB_PATH, CRON_HTTP_PORT, CRON_DEFAULT_TIMEZONE, etc.
        // Keys contain underscores, so nested separators use "__".
        builder = builder.add_source(
            Environment::with_prefix("CRON")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| CronError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CronError::Config(e.to_string()))
    }

    /// Socket address string for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Expand ~ in db_path to the user's home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }

    /// All repository ids across every configured storage
    pub fn repository_ids(&self) -> impl Iterator<Item = &str> {
        self.storages.values().flatten().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.http_port, 48080);
        assert_eq!(settings.http_host, "0.0.0.0");
        assert_eq!(settings.default_timezone, "UTC");
        assert_eq!(settings.shutdown_timeout_secs, 30);
        assert!(settings.storages.is_empty());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cron.toml");
        std::fs::write(
            &path,
            r#"
http_port = 9000
default_timezone = "Europe/Warsaw"

[storages]
storage0 = ["releases", "snapshots"]
storage-common-proxies = ["carlspring"]
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(settings.http_port, 9000);
        assert_eq!(settings.default_timezone, "Europe/Warsaw");
        assert_eq!(settings.storages["storage0"], vec!["releases", "snapshots"]);

        let repos: Vec<&str> = settings.repository_ids().collect();
        assert!(repos.contains(&"carlspring"));
        assert!(repos.contains(&"releases"));
    }

    #[test]
    fn test_http_addr() {
        let settings = Settings::default();
        assert_eq!(settings.http_addr(), "0.0.0.0:48080");
    }

    #[test]
    fn test_expanded_db_path_plain() {
        let settings = Settings {
            db_path: "/var/lib/task-cron".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.expanded_db_path(), PathBuf::from("/var/lib/task-cron"));
    }
}
