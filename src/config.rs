// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{EncodePreset, OutputNaming, RunnerOptions, Tools};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: Tools,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub output: OutputNaming,

    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Preset used when `convert` is run without `--preset`
    #[serde(default)]
    pub preset: EncodePreset,

    /// Default overwrite setting (whether to overwrite existing output files)
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of encoder output lines kept for failure reports
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,

    /// How long to wait for progress output to flush after ffmpeg exits
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_tail_lines() -> usize {
    20
}

fn default_drain_timeout_ms() -> u64 {
    2000
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tail_lines: default_tail_lines(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn options(&self) -> RunnerOptions {
        RunnerOptions {
            tail_lines: self.tail_lines,
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("trackmux")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("trackmux")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            Self::from_toml(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })
        } else {
            let config = Config::default();

            // A read-only config dir is not fatal; built-in defaults still apply
            if let Err(e) = config.save() {
                tracing::warn!(
                    "Could not create default config file: {:#}. Using built-in defaults; \
                     run 'trackmux init-config' to create one.",
                    e
                );
            }

            Ok(config)
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid config TOML")
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            Config::default().save()?;
        }
        Ok(())
    }
}
