//! Configuration loading and parsing.
//!
//! Parses `cellrun.toml` (or an override path provided by the binary):
//!
//! ```toml
//! [history]
//! max_depth = 200
//! [links]
//! implicit_detection = true
//! require_scheme = false
//! ```
//!
//! Every field has a default, so an absent section or key is never an error.
//! Unknown fields are ignored to allow forward evolution. A file that fails to
//! parse falls back to defaults with a warning; the editing engine never
//! refuses to start because of configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "cellrun.toml";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max_depth")]
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
        }
    }
}

impl HistoryConfig {
    const fn default_max_depth() -> usize {
        200
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LinksConfig {
    #[serde(default = "LinksConfig::default_implicit_detection")]
    pub implicit_detection: bool,
    /// When set, only `http://` / `https://` words are auto-promoted.
    #[serde(default)]
    pub require_scheme: bool,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            implicit_detection: Self::default_implicit_detection(),
            require_scheme: false,
        }
    }
}

impl LinksConfig {
    const fn default_implicit_detection() -> bool {
        true
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Local working directory first, then the platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("cellrun").join(CONFIG_FILE_NAME);
    }
    local
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_defaults_no_file");
        return Ok(Config::default());
    };
    match parse(&content) {
        Ok(file) => {
            let mut cfg = Config {
                raw: Some(content),
                file,
            };
            cfg.clamp();
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(cfg)
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

/// Strict variant for callers that want parse errors surfaced.
pub fn load_strict(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let file = parse(&content).with_context(|| format!("parsing config {}", path.display()))?;
    let mut cfg = Config {
        raw: Some(content),
        file,
    };
    cfg.clamp();
    Ok(cfg)
}

fn parse(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str::<ConfigFile>(content)?)
}

impl Config {
    pub fn history_depth(&self) -> usize {
        self.file.history.max_depth
    }

    pub fn implicit_links(&self) -> bool {
        self.file.links.implicit_detection
    }

    pub fn require_scheme(&self) -> bool {
        self.file.links.require_scheme
    }

    // A zero-depth history could never hold the edit that was just committed.
    fn clamp(&mut self) {
        let raw = self.file.history.max_depth;
        if raw == 0 {
            self.file.history.max_depth = 1;
            info!(target: "config", raw, clamped = 1, "history_max_depth_clamped");
        }
    }
}
