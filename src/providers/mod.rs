//! Source providers.
//!
//! Each provider resolves raw values for one source family. Providers own
//! their slice of the source cache and report absence as `Ok(None)`; the
//! default/fail-fast policy is applied by the engine, not here.
//!
//! Key/value sources report a key that maps to an empty string as absent,
//! so the engine applies the binding's `default_value` or `fail_fast` to it
//! like to a missing key. An empty value never reaches a converter.

pub mod database;
pub mod directory;
pub mod env;
pub mod i18n;
pub mod manifest;
pub mod maven;
pub mod properties;
pub mod property;
pub mod system;

pub use database::DatabaseProvider;
pub use directory::{DirectoryContext, DirectoryProvider, MemoryDirectory};
pub use env::EnvironmentProvider;
pub use i18n::ResourceBundleProvider;
pub use manifest::ManifestProvider;
pub use maven::MavenProvider;
pub use properties::PropertiesProvider;
pub use property::PropertyProvider;
pub use system::{SystemProperties, SystemPropertyProvider};

use crate::binding::{FieldInfo, Params};
use crate::config::InjectorConfig;
use crate::error::ProviderError;
use crate::properties::Properties;
use crate::registry::ProviderRegistry;
use crate::resources::ResourceLocator;
use std::sync::Arc;
use std::time::Instant;

/// Identifiers of the built-in provider kinds.
pub mod kind {
    pub const ENV: &str = "env";
    pub const SYSTEM: &str = "system";
    pub const PROPERTY: &str = "property";
    pub const PROPERTIES: &str = "properties";
    pub const I18N: &str = "i18n";
    pub const DB: &str = "db";
    pub const DIRECTORY: &str = "directory";
    pub const MAVEN: &str = "maven";
    pub const MANIFEST: &str = "manifest";
}

/// Value produced by a provider before type conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    /// A whole key/value bag, only assignable to `Properties` fields.
    Bag(Properties),
}

impl RawValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::Bag(_) => None,
        }
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// How a pass treats already cached sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Load on first use, keep for the process lifetime.
    Cached,
    /// Reload entries loaded before the given instant.
    ReloadOlderThan(Instant),
}

/// Input to a single provider call.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub params: &'a Params,
    pub field: &'a FieldInfo,
    pub policy: LoadPolicy,
}

/// Result of a provider call: a raw value, or `None` when absent.
pub type ProviderResult = Result<Option<RawValue>, ProviderError>;

/// Contract every source family implements.
pub trait Provider: Send + Sync {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult;
}

impl<F> Provider for F
where
    F: Fn(&ProviderRequest<'_>) -> ProviderResult + Send + Sync,
{
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        self(request)
    }
}

/// Treat an empty looked-up value as absent.
///
/// The engine cannot tell the two apart afterwards: an empty value takes
/// the binding's default, or fails a `fail_fast` binding.
pub(crate) fn non_empty(value: Option<String>, key: &str, locator: &str) -> Option<RawValue> {
    match value {
        Some(v) if v.is_empty() => {
            tracing::warn!(key = %key, locator = %locator, "Value is empty, treating as absent");
            None
        }
        Some(v) => Some(RawValue::Text(v)),
        None => None,
    }
}

/// Register every built-in kind, configured from `config`.
pub fn register_builtins(
    registry: &ProviderRegistry,
    config: &InjectorConfig,
    system: Arc<SystemProperties>,
    directory: Option<Arc<dyn DirectoryContext>>,
) {
    let locator = Arc::new(ResourceLocator::new(config.resource_roots.clone()));

    let directory = match directory {
        Some(context) => DirectoryProvider::with_context(context),
        None => DirectoryProvider::from_properties_file(
            Arc::clone(&locator),
            config.directory_source.clone(),
        ),
    };

    registry.register_provider(kind::ENV, Arc::new(EnvironmentProvider::new()));
    registry.register_provider(kind::SYSTEM, Arc::new(SystemPropertyProvider::new(system)));
    registry.register_provider(kind::PROPERTY, Arc::new(PropertyProvider::new(Arc::clone(&locator))));
    registry.register_provider(kind::PROPERTIES, Arc::new(PropertiesProvider::new(Arc::clone(&locator))));
    registry.register_provider(kind::I18N, Arc::new(ResourceBundleProvider::new(Arc::clone(&locator))));
    registry.register_provider(kind::DB, Arc::new(DatabaseProvider::new(Arc::clone(&locator))));
    registry.register_provider(kind::DIRECTORY, Arc::new(directory));
    registry.register_provider(kind::MAVEN, Arc::new(MavenProvider::new(locator)));
    registry.register_provider(kind::MANIFEST, Arc::new(ManifestProvider::new(config.class_path.clone())));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_is_absent() {
        assert_eq!(non_empty(Some(String::new()), "bean.empty", "app.properties"), None);
        assert_eq!(non_empty(None, "bean.missing", "app.properties"), None);
        assert_eq!(
            non_empty(Some(" ".to_string()), "bean.blank", "app.properties"),
            Some(RawValue::Text(" ".to_string()))
        );
    }
}
