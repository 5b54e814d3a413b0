//! Process environment provider.

use super::{Provider, ProviderRequest, ProviderResult, RawValue};
use tracing::warn;

/// Reads variables from the process environment. No caching.
#[derive(Debug, Default)]
pub struct EnvironmentProvider;

impl EnvironmentProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Provider for EnvironmentProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let key = request.params.required("key")?;
        match std::env::var(key) {
            Ok(value) => Ok(Some(RawValue::Text(value))),
            Err(_) => {
                warn!(
                    key = %key,
                    field = request.field.name,
                    declaring_type = request.field.declaring_type,
                    "Environment variable not set"
                );
                Ok(None)
            }
        }
    }
}
