//! Source locator resolution.
//!
//! - `file:<path>` names a filesystem path directly
//! - `resource:<path>` or a bare path is searched under the resource roots,
//!   first match wins

use crate::error::ProviderError;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "file:";
const RESOURCE_PREFIX: &str = "resource:";

/// Resolves locators to readable paths.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    roots: Vec<PathBuf>,
}

impl ResourceLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve `locator` to an existing path, if any.
    pub fn find(&self, locator: &str) -> Option<PathBuf> {
        if let Some(path) = locator.strip_prefix(FILE_PREFIX) {
            let path = PathBuf::from(path);
            return path.is_file().then_some(path);
        }
        let relative = locator.strip_prefix(RESOURCE_PREFIX).unwrap_or(locator);
        let relative = relative.trim_start_matches('/');
        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve `locator` or fail with a source error naming it.
    pub fn require(&self, locator: &str) -> Result<PathBuf, ProviderError> {
        self.find(locator).ok_or_else(|| {
            ProviderError::unavailable(
                locator,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("not found (searched {})", self.describe_roots()),
                ),
            )
        })
    }

    /// Read the text behind `locator`.
    pub fn read_to_string(&self, locator: &str) -> Result<String, ProviderError> {
        let path = self.require(locator)?;
        read_path(locator, &path)
    }

    fn describe_roots(&self) -> String {
        self.roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ResourceLocator {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(".")])
    }
}

pub(crate) fn read_path(locator: &str, path: &Path) -> Result<String, ProviderError> {
    std::fs::read_to_string(path).map_err(|e| ProviderError::unavailable(locator, e))
}
