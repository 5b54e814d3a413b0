//! Injector configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default hot reload period (15 minutes).
pub const DEFAULT_REFRESH_SECS: u64 = 900;

/// Default locator of the file seeding the directory context.
pub const DEFAULT_DIRECTORY_SOURCE: &str = "directory.properties";

/// Settings the built-in providers are constructed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InjectorConfig {
    /// Search roots for bare and `resource:` locators.
    #[serde(default = "default_resource_roots")]
    pub resource_roots: Vec<PathBuf>,

    /// Archives and directories scanned for manifests.
    #[serde(default = "default_class_path")]
    pub class_path: Vec<PathBuf>,

    /// Properties file seeding the default directory context.
    #[serde(default = "default_directory_source")]
    pub directory_source: String,

    /// Hot reload period for types that do not set their own.
    #[serde(default = "default_refresh_secs")]
    pub default_refresh_secs: u64,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            resource_roots: default_resource_roots(),
            class_path: default_class_path(),
            directory_source: default_directory_source(),
            default_refresh_secs: default_refresh_secs(),
        }
    }
}

impl InjectorConfig {
    pub fn default_refresh(&self) -> Duration {
        Duration::from_secs(self.default_refresh_secs)
    }

    pub fn with_resource_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.resource_roots = roots;
        self
    }

    pub fn with_class_path(mut self, class_path: Vec<PathBuf>) -> Self {
        self.class_path = class_path;
        self
    }
}

fn default_resource_roots() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_class_path() -> Vec<PathBuf> {
    std::env::var_os("CLASSPATH")
        .map(|v| std::env::split_paths(&v).collect())
        .unwrap_or_default()
}

fn default_directory_source() -> String {
    DEFAULT_DIRECTORY_SOURCE.to_string()
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InjectorConfig::default();
        assert_eq!(config.resource_roots, vec![PathBuf::from(".")]);
        assert_eq!(config.directory_source, "directory.properties");
        assert_eq!(config.default_refresh(), Duration::from_secs(900));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: InjectorConfig = serde_yaml::from_str("default_refresh_secs: 60\n").unwrap();
        assert_eq!(config.default_refresh_secs, 60);
        assert_eq!(config.directory_source, DEFAULT_DIRECTORY_SOURCE);
    }
}
