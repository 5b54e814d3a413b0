//! Build metadata packaged under `META-INF/maven/<group>/<artifact>/`.

use super::{Provider, ProviderRequest, ProviderResult, non_empty};
use crate::cache::SourceCache;
use crate::properties::Properties;
use crate::resources::ResourceLocator;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_SOURCE: &str = "pom.properties";

pub struct MavenProvider {
    locator: Arc<ResourceLocator>,
    cache: SourceCache<Properties>,
}

impl MavenProvider {
    pub fn new(locator: Arc<ResourceLocator>) -> Self {
        Self {
            locator,
            cache: SourceCache::new("maven"),
        }
    }

    pub fn metadata_path(group_id: &str, artifact_id: &str, source: &str) -> String {
        format!("META-INF/maven/{}/{}/{}", group_id, artifact_id, source)
    }
}

impl Provider for MavenProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let key = request.params.required("key")?;
        let group_id = request.params.required("group_id")?;
        let artifact_id = request.params.required("artifact_id")?;
        let source = request.params.get("source").unwrap_or(DEFAULT_SOURCE);

        let path = Self::metadata_path(group_id, artifact_id, source);
        let props = self.cache.get_or_load(&path, request.policy, || {
            self.locator.read_to_string(&path).map(|text| Properties::parse(&text))
        })?;

        let value = props.get(key).map(str::to_string);
        if value.is_none() {
            warn!(key = %key, metadata = %path, "Key not found in build metadata");
        }
        Ok(non_empty(value, key, &path))
    }
}
