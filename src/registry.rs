//! Provider and converter tables shared by every injection.
//!
//! Both tables are copy-on-write behind `ArcSwap`: registrations may be
//! interleaved with running injections, readers never block, and the last
//! registration for a kind or type wins.

use crate::convert::{ConverterRegistry, TypeConverter};
use crate::providers::Provider;
use arc_swap::ArcSwap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct ProviderRegistry {
    providers: ArcSwap<HashMap<String, Arc<dyn Provider>>>,
    converters: ConverterRegistry,
}

impl ProviderRegistry {
    /// Registry with no providers and the built-in converters.
    pub fn new() -> Self {
        Self::with_converters(ConverterRegistry::with_builtins())
    }

    pub fn with_converters(converters: ConverterRegistry) -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
            converters,
        }
    }

    /// Register `provider` for `kind`, replacing any previous one.
    pub fn register_provider(&self, kind: impl Into<String>, provider: Arc<dyn Provider>) {
        let kind = kind.into();
        debug!(kind = %kind, "Registering provider");
        self.providers.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(kind.clone(), Arc::clone(&provider));
            next
        });
    }

    pub fn register_converter<V, E, F>(&self, func: F)
    where
        V: Any + Send,
        E: fmt::Display,
        F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
    {
        debug!(target_type = std::any::type_name::<V>(), "Registering converter");
        self.converters.register(func);
    }

    pub fn register_type_converter(&self, type_id: TypeId, converter: TypeConverter) {
        debug!(target_type = converter.target(), "Registering converter");
        self.converters.insert(type_id, converter);
    }

    pub fn provider(&self, kind: &str) -> Option<Arc<dyn Provider>> {
        self.providers.load().get(kind).cloned()
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.providers.load().keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{FieldInfo, Params};
    use crate::providers::{LoadPolicy, ProviderRequest, ProviderResult, RawValue};

    fn request_text(provider: &dyn Provider) -> Option<String> {
        let params = Params::new();
        let field = FieldInfo {
            name: "f",
            declaring_type: "T",
            value_type: TypeId::of::<String>(),
            value_type_name: "String",
        };
        provider
            .resolve(&ProviderRequest {
                params: &params,
                field: &field,
                policy: LoadPolicy::Cached,
            })
            .unwrap()
            .and_then(|v| v.as_text().map(str::to_string))
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = ProviderRegistry::new();
        registry.register_provider(
            "x",
            Arc::new(|_: &ProviderRequest<'_>| -> ProviderResult { Ok(Some(RawValue::from("first"))) }),
        );
        registry.register_provider(
            "x",
            Arc::new(|_: &ProviderRequest<'_>| -> ProviderResult { Ok(Some(RawValue::from("second"))) }),
        );

        let provider = registry.provider("x").unwrap();
        assert_eq!(request_text(provider.as_ref()).as_deref(), Some("second"));
        assert_eq!(registry.kinds(), vec!["x"]);
    }

    #[test]
    fn test_unknown_kind() {
        let registry = ProviderRegistry::new();
        assert!(registry.provider("nope").is_none());
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn test_converter_override() {
        let registry = ProviderRegistry::new();
        registry.register_converter(|raw: &str| Ok::<_, String>(raw.len() as u32));
        let converter = registry.converters().get(TypeId::of::<u32>()).unwrap();
        let value = converter.convert("abcd").unwrap();
        assert_eq!(*value.downcast::<u32>().unwrap(), 4);
    }
}
