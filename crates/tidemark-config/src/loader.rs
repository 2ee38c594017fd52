use std::path::{Path, PathBuf};

use tidemark_common::{Error, Result};
use tracing::{debug, info};

use crate::model::MigrateConfig;

const LOCAL_CANDIDATES: &[&str] = &["tidemark.yml", "tidemark.yaml", "tidemark.toml"];

/// Reads `MigrateConfig` from YAML or TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the config at `path`. The format is picked from the extension.
    pub fn load(path: &Path) -> Result<MigrateConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Find a config file in `dir` or the user config directory and load it,
    /// falling back to defaults when there is none.
    pub fn discover(dir: &Path) -> Result<MigrateConfig> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(MigrateConfig::default())
            }
        }
    }

    fn find(dir: &Path) -> Option<PathBuf> {
        let local = LOCAL_CANDIDATES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file());
        if local.is_some() {
            return local;
        }

        dirs::config_dir()
            .map(|d| d.join("tidemark").join("config.yml"))
            .filter(|p| p.is_file())
    }
}
