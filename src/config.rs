use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::ArtifactPaths;
use crate::error::{Result, VitalsError};

pub const DEFAULT_CONFIG_PATH: &str = "vitals.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub artifacts: ArtifactsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Where the trained artifacts live. Per-file paths override `dir`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
    pub ranges: Option<PathBuf>,
    pub scaler: Option<PathBuf>,
    pub model: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            ranges: None,
            scaler: None,
            model: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_prefix: "vitals_check.log".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ArtifactsConfig {
    pub fn paths(&self) -> ArtifactPaths {
        let defaults = ArtifactPaths::in_dir(&self.dir);
        ArtifactPaths {
            ranges: self.ranges.clone().unwrap_or(defaults.ranges),
            scaler: self.scaler.clone().unwrap_or(defaults.scaler),
            model: self.model.clone().unwrap_or(defaults.model),
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist; without one,
    /// `VITALS_CONFIG` or `vitals.toml` is read when present and built-in
    /// defaults are used otherwise. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("VITALS_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            VitalsError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("VITALS_ARTIFACT_DIR") {
            self.artifacts.dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("VITALS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("VITALS_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| VitalsError::Config(format!("Invalid VITALS_PORT '{port}': {e}")))?;
        }
        Ok(())
    }
}
