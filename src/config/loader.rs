//! Configuration loader with tier-based merging.
//!
//! Tiers, lowest to highest: embedded defaults, the user file
//! (`~/.props-injector/config.yaml`), an explicit file, then environment
//! variable overrides.

use super::merge::deep_merge_all;
use super::types::InjectorConfig;
use crate::error::ConfigError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Explicit config file, layered above the user file.
pub const ENV_CONFIG: &str = "PROPS_INJECTOR_CONFIG";
/// User config directory (default `~/.props-injector`).
pub const ENV_USER_DIR: &str = "PROPS_INJECTOR_USER_DIR";
/// Path list replacing `resource_roots`.
pub const ENV_RESOURCE_PATH: &str = "PROPS_INJECTOR_RESOURCE_PATH";
/// Path list replacing `class_path`.
pub const ENV_CLASS_PATH: &str = "PROPS_INJECTOR_CLASS_PATH";

const CONFIG_FILE: &str = "config.yaml";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    User = 1,
    Explicit = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Explicit => write!(f, "explicit"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file tier is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_dir: Option<PathBuf>,
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover paths from the environment and the home directory.
    pub fn discover() -> Self {
        let user_dir = std::env::var_os(ENV_USER_DIR)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".props-injector")));
        let explicit_file = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        Self {
            user_dir,
            explicit_file,
        }
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }

    fn user_file(&self) -> Option<PathBuf> {
        self.user_dir.as_ref().map(|dir| dir.join(CONFIG_FILE))
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: InjectorConfig,
    /// Files that contributed, in tier order.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load all tiers from `paths`, then apply the process environment.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self, ConfigError> {
        let mut loader = Self::load_files(paths)?;
        apply_env_overrides(&mut loader.config, |name| std::env::var(name).ok());
        Ok(loader)
    }

    /// Load the default and file tiers only.
    pub fn load_files(paths: ConfigPaths) -> Result<Self, ConfigError> {
        let mut documents = vec![
            serde_yaml::to_value(InjectorConfig::default()).map_err(|e| ConfigError::Parse {
                path: ConfigTier::Defaults.to_string(),
                source: e,
            })?,
        ];
        let mut sources = Vec::new();

        if let Some(user_file) = paths.user_file().filter(|p| p.is_file()) {
            documents.push(read_document(&user_file)?);
            sources.push((ConfigTier::User, user_file));
        }

        // An explicit file that is missing is an error, unlike the user file.
        if let Some(explicit) = &paths.explicit_file {
            documents.push(read_document(explicit)?);
            sources.push((ConfigTier::Explicit, explicit.clone()));
        }

        let merged = deep_merge_all(documents);
        let config: InjectorConfig =
            serde_yaml::from_value(merged).map_err(|e| ConfigError::Parse {
                path: sources
                    .last()
                    .map(|(_, p)| p.display().to_string())
                    .unwrap_or_else(|| ConfigTier::Defaults.to_string()),
                source: e,
            })?;

        for (tier, path) in &sources {
            debug!(tier = %tier, path = %path.display(), "Loaded config file");
        }
        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut InjectorConfig {
        &mut self.config
    }

    pub fn into_config(self) -> InjectorConfig {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Apply the environment tier, reading variables through `lookup`.
pub fn apply_env_overrides(config: &mut InjectorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(roots) = lookup(ENV_RESOURCE_PATH).filter(|v| !v.is_empty()) {
        config.resource_roots = std::env::split_paths(&roots).collect();
        debug!(roots = %roots, "Resource roots overridden from environment");
    }
    if let Some(class_path) = lookup(ENV_CLASS_PATH).filter(|v| !v.is_empty()) {
        config.class_path = std::env::split_paths(&class_path).collect();
        debug!(class_path = %class_path, "Class path overridden from environment");
    }
}
