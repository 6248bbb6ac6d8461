//! Configuration loader
//!
//! Loads and validates the YAML build configuration.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::BuildConfig;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "FREEWAY_GRID_CONFIG";

pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Loader that always yields the built-in defaults
    pub fn defaults() -> Self {
        Self { path: None }
    }

    /// Resolve the configuration file
    ///
    /// Path resolution order:
    /// 1. FREEWAY_GRID_CONFIG environment variable (explicit override)
    /// 2. Relative "config/build.yaml" (works when running from the workspace root)
    /// 3. CARGO_MANIFEST_DIR/config/build.yaml
    /// 4. Built-in defaults
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::new(path);
        }

        let relative = Path::new("config").join("build.yaml");
        if relative.exists() {
            return Self::new(relative);
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let path = Path::new(&manifest_dir).join("config").join("build.yaml");
            if path.exists() {
                return Self::new(path);
            }
        }

        Self::defaults()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the build configuration, or defaults when no file is configured
    pub fn load(&self) -> Result<BuildConfig> {
        let Some(path) = &self.path else {
            info!("No build configuration file, using defaults");
            return Ok(BuildConfig::default());
        };

        info!("Loading build configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: BuildConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        config
            .validate()
            .map_err(|e| anyhow!("{}: {}", path.display(), e))?;

        info!(
            striped_areas_traversable = config.striped_areas_traversable,
            "Loaded build configuration"
        );
        Ok(config)
    }
}
