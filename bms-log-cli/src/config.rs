//! Configuration loading and parsing
//!
//! Every section of `config.toml` is optional; command-line flags override
//! whatever the file sets.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            poll_timeout_ms: default_poll_timeout(),
        }
    }
}

impl BusConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_poll_timeout() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_plot_dir")]
    pub plot_dir: PathBuf,
    #[serde(default = "default_true")]
    pub plots: bool,
    pub summary_json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            plot_dir: default_plot_dir(),
            plots: true,
            summary_json: None,
        }
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("can_data_log.txt")
}

fn default_plot_dir() -> PathBuf {
    PathBuf::from("plots")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Reject values the ingest loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.bus.interface.trim().is_empty() {
            bail!("bus.interface must not be empty");
        }
        if self.bus.poll_timeout_ms == 0 {
            bail!("bus.poll_timeout_ms must be greater than zero");
        }
        if self.output.log_file.as_os_str().is_empty() {
            bail!("output.log_file must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .validate()
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [bus]
            interface = "vcan0"
            poll_timeout_ms = 250

            [output]
            log_file = "logs/bms.txt"
            plot_dir = "charts"
            summary_json = "summary.json"

            [display]
            enabled = false
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.bus.interface, "vcan0");
        assert_eq!(config.bus.poll_timeout(), Duration::from_millis(250));
        assert_eq!(config.output.log_file, PathBuf::from("logs/bms.txt"));
        assert_eq!(config.output.summary_json, Some(PathBuf::from("summary.json")));
        assert!(config.output.plots);
        assert!(!config.display.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.bus.interface, "can0");
        assert_eq!(config.bus.poll_timeout_ms, 1000);
        assert_eq!(config.output.log_file, PathBuf::from("can_data_log.txt"));
        assert_eq!(config.output.plot_dir, PathBuf::from("plots"));
        assert!(config.display.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_poll_timeout_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bus]\npoll_timeout_ms = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("poll_timeout_ms"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("does-not-exist.toml")).is_err());
    }
}
