//! Configuration management
//!
//! TOML file with an `[engine]` and a `[batch]` section; every field is
//! optional and falls back to the defaults next to the executable.

use anyhow::{Context, Result};
use oneocr_engine::{executable_dir, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Output format for recognized text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text, one line per recognized line
    #[default]
    Text,
    /// Full result with bounding boxes as JSON
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

/// Batch driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory scanned for input images
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,

    /// Directory receiving one output file per image
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,

    /// Accepted file extensions (lowercase, without dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub format: OutputFormat,
}

fn default_src_dir() -> PathBuf { executable_dir().join("src") }
fn default_dest_dir() -> PathBuf { executable_dir().join("dest") }
fn default_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "bmp"].iter().map(|s| s.to_string()).collect()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            src_dir: default_src_dir(),
            dest_dir: default_dest_dir(),
            extensions: default_extensions(),
            format: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content).context("failed to parse config TOML")
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }
}

/// `<config dir>/oneocr/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("oneocr").join("config.toml"))
}
