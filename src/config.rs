use std::{
    fs, io,
    path::{Path, PathBuf},
};

use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::Deserialize;
use thiserror::Error;

const APP_DIR: &str = "markpane";
const CONFIG_FILE: &str = "config.toml";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("no home directory to place {0} in")]
    NoHome(&'static str),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Seconds between autosave ticks.
    pub autosave_interval_secs: u64,
    /// Where the backing store keeps its entries.
    pub data_dir: Option<PathBuf>,
    pub render: RenderConfig,
    pub assistant: AssistantConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 5,
            data_dir: None,
            render: RenderConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Fenced code languages turned into diagram containers.
    pub diagram_languages: Vec<String>,
    pub diagrams: bool,
    pub highlight: bool,
    pub math: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            diagram_languages: vec!["mermaid".to_string()],
            diagrams: true,
            highlight: true,
            math: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Overridden by `OPENAI_API_KEY` when that is set.
    pub api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            api_key: None,
        }
    }
}

impl AssistantConfig {
    /// The credential for this session: environment first, then the file.
    pub fn credential(&self) -> Option<String> {
        dotenvy::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Config {
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }
}

pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("MARKPANE_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let strategy = choose_base_strategy().map_err(|_| ConfigError::NoHome("config"))?;
    Ok(strategy.config_dir().join(APP_DIR))
}

pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let strategy = choose_base_strategy().map_err(|_| ConfigError::NoHome("data"))?;
    Ok(strategy.data_dir().join(APP_DIR))
}
