//! Whole properties file as one value.

use super::{Provider, ProviderRequest, ProviderResult, RawValue};
use crate::cache::SourceCache;
use crate::error::ProviderError;
use crate::properties::Properties;
use crate::resources::ResourceLocator;
use std::sync::Arc;

/// Injects an entire file into a `Properties` field.
pub struct PropertiesProvider {
    locator: Arc<ResourceLocator>,
    cache: SourceCache<Properties>,
}

impl PropertiesProvider {
    pub fn new(locator: Arc<ResourceLocator>) -> Self {
        Self {
            locator,
            cache: SourceCache::new("properties"),
        }
    }
}

impl Provider for PropertiesProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        if !request.field.is::<Properties>() {
            return Err(ProviderError::IncompatibleFieldType {
                expected: std::any::type_name::<Properties>(),
                actual: request.field.value_type_name,
            });
        }
        let source = request.params.required("source")?;

        let props = self.cache.get_or_load(source, request.policy, || {
            self.locator.read_to_string(source).map(|text| Properties::parse(&text))
        })?;
        Ok(Some(RawValue::Bag(Properties::clone(&props))))
    }
}
