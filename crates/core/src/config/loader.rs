//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    /// Parsed settings, defaults filled in
    pub schema: ConfigSchema,
    /// File the settings came from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::config_not_found(p));
            }
        }

        let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

        let schema = if let Some(ref p) = config_path {
            tracing::debug!(path = %p.display(), "Loading configuration");
            load_config_file(p)?
        } else {
            tracing::debug!("No configuration file found, using defaults");
            ConfigSchema::default()
        };

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Project root for resolving relative paths.
    ///
    /// This is the directory holding the config file, or its parent when the
    /// file lives in a `.config/` directory.
    pub fn base_dir(&self) -> PathBuf {
        let Some(dir) = self.path.as_deref().and_then(Path::parent) else {
            return PathBuf::new();
        };
        match dir.file_name() {
            Some(name) if name == CONFIG_DIR => dir.parent().unwrap_or(dir).to_path_buf(),
            _ => dir.to_path_buf(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

/// Directory that may hold the config file one level below the project root
const CONFIG_DIR: &str = ".config";

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let candidates = [".droidcfg.toml", "droidcfg.toml", ".config/droidcfg.toml"];

    candidates
        .into_iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
            .with_source(e)
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::parse(format!("Failed to parse config file {}: {}", path.display(), e))
            .with_source(e)
    })
}
