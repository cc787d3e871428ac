use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub input: InputSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LayoutSettings {
    /// Gap between neighbouring cells, in pixels.
    pub margin: u32,
    /// Gap between a monitor's work area edge and the grid, in pixels.
    pub padding: u32,
}

impl Default for LayoutSettings {
    fn default() -> Self { LayoutSettings { margin: 16, padding: 32 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct InputSettings {
    /// Hook callbacks slower than this are reported. The OS silently removes
    /// hooks that are too slow, so this should sit well below its timeout.
    pub callback_budget_ms: u64,
    /// Keep mouse buttons from reaching the windows under the overlay.
    pub swallow_clicks: bool,
}

impl Default for InputSettings {
    fn default() -> Self { InputSettings { callback_budget_ms: 200, swallow_clicks: true } }
}

impl InputSettings {
    pub fn callback_budget(&self) -> Duration { Duration::from_millis(self.callback_budget_ms) }
}

pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tabscope").join("config.toml"))
}

impl Config {
    /// Loads the config at `path`. A missing file yields the defaults.
    pub fn read(path: &Path) -> Result<Config, ConfigError> {
        let buf = match fs::read_to_string(path) {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(?path, "no config file, using defaults");
                return Ok(Config::default());
            }
            Err(source) => return Err(ConfigError::Io { path: path.to_owned(), source }),
        };
        let config = Config::parse(&buf)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(buf: &str) -> Result<Config, toml::de::Error> { toml::from_str(buf) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.input.callback_budget_ms == 0 {
            return Err(ConfigError::Invalid(
                "settings.input.callback_budget_ms must be greater than zero".into(),
            ));
        }
        if self.settings.layout.margin > i32::MAX as u32
            || self.settings.layout.padding > i32::MAX as u32
        {
            return Err(ConfigError::Invalid("layout margins out of range".into()));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> String {
        toml::to_string(self).unwrap_or_else(|e| format!("# could not serialize config: {e}\n"))
    }
}
