//! Single key from a flat properties file.

use super::{Provider, ProviderRequest, ProviderResult, non_empty};
use crate::cache::SourceCache;
use crate::properties::Properties;
use crate::resources::ResourceLocator;
use std::sync::Arc;
use tracing::warn;

pub struct PropertyProvider {
    locator: Arc<ResourceLocator>,
    cache: SourceCache<Properties>,
}

impl PropertyProvider {
    pub fn new(locator: Arc<ResourceLocator>) -> Self {
        Self {
            locator,
            cache: SourceCache::new("property"),
        }
    }

    pub fn cache(&self) -> &SourceCache<Properties> {
        &self.cache
    }
}

impl Provider for PropertyProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let source = request.params.required("source")?;
        let key = request.params.required("key")?;

        let props = self.cache.get_or_load(source, request.policy, || {
            self.locator.read_to_string(source).map(|text| Properties::parse(&text))
        })?;

        let value = props.get(key).map(str::to_string);
        if value.is_none() {
            warn!(
                key = %key,
                source = %source,
                field = request.field.name,
                declaring_type = request.field.declaring_type,
                "Property not found in source"
            );
        }
        Ok(non_empty(value, key, source))
    }
}
