use std::path::{Path, PathBuf};
use std::fs;
use crate::common::config::Config;
use crate::common::error::Result;
use crate::common::paths;

/// Resolves where the service keeps its data, either under `./dev_data`
/// or in the system locations.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(base_dir.join("accounts"))?;
            fs::create_dir_all(base_dir.join("frames"))?;

            tracing::info!("Development mode enabled - data will be saved to: {}",
                           base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config_file(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from("configs/watcher.toml")
        } else {
            paths::system_config_file()
        }
    }

    /// Load the config for this mode, or defaults when no file exists.
    pub fn load_config(&self, explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) => Config::load_from_path(path),
            None => {
                let path = self.config_file();
                if path.exists() {
                    Config::load_from_path(&path)
                } else {
                    tracing::warn!("No config at {}, using defaults", path.display());
                    Ok(Config::default())
                }
            }
        }
    }

    pub fn accounts_dir(&self, config: &Config) -> PathBuf {
        match &config.storage.accounts_dir {
            Some(dir) => dir.clone(),
            None if self.enabled => self.base_dir.join("accounts"),
            None => paths::system_accounts_dir(),
        }
    }

    pub fn frames_dir(&self, config: &Config) -> PathBuf {
        match &config.storage.frames_dir {
            Some(dir) => dir.clone(),
            None if self.enabled => self.base_dir.join("frames"),
            None => paths::system_frames_dir(),
        }
    }

    /// Relative model paths are resolved against this directory.
    pub fn models_dir(&self) -> PathBuf {
        if self.enabled {
            PathBuf::from("./models")
        } else {
            paths::system_models_dir()
        }
    }
}
