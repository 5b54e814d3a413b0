//! Naming/directory service lookups.
//!
//! One shared [`DirectoryContext`] is created on first use through the
//! provider's factory. A failing factory is fatal for the calling
//! injection and is retried on the next one; a name that is not bound is
//! plain absence.

use super::{Provider, ProviderRequest, ProviderResult, RawValue};
use crate::error::{BoxError, ProviderError};
use crate::properties::Properties;
use crate::resources::ResourceLocator;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A naming context values can be looked up in.
pub trait DirectoryContext: Send + Sync {
    /// `Ok(None)` when `name` is not bound.
    fn lookup(&self, name: &str) -> Result<Option<String>, BoxError>;
}

/// In-memory naming context.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(props: &Properties) -> Self {
        let directory = Self::new();
        for (name, value) in props.iter() {
            directory.bind(name, value);
        }
        directory
    }

    /// Bind or rebind `name`.
    pub fn bind(&self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(name.into(), value.into());
    }

    pub fn unbind(&self, name: &str) -> Option<String> {
        self.entries.write().remove(name)
    }
}

impl DirectoryContext for MemoryDirectory {
    fn lookup(&self, name: &str) -> Result<Option<String>, BoxError> {
        Ok(self.entries.read().get(name).cloned())
    }
}

type ContextFactory = Box<dyn Fn() -> Result<Arc<dyn DirectoryContext>, BoxError> + Send + Sync>;

pub struct DirectoryProvider {
    factory: ContextFactory,
    context: Mutex<Option<Arc<dyn DirectoryContext>>>,
}

impl DirectoryProvider {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn DirectoryContext>, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            context: Mutex::new(None),
        }
    }

    /// Provider over an already built context.
    pub fn with_context(context: Arc<dyn DirectoryContext>) -> Self {
        Self::new(move || Ok(Arc::clone(&context)))
    }

    /// Provider whose context is seeded from a properties file on first use.
    pub fn from_properties_file(locator: Arc<ResourceLocator>, source: impl Into<String>) -> Self {
        let source = source.into();
        Self::new(move || {
            let text = locator.read_to_string(&source)?;
            let directory = MemoryDirectory::from_properties(&Properties::parse(&text));
            Ok(Arc::new(directory) as Arc<dyn DirectoryContext>)
        })
    }

    fn context(&self) -> Result<Arc<dyn DirectoryContext>, ProviderError> {
        let mut context = self.context.lock();
        if let Some(ctx) = context.as_ref() {
            return Ok(Arc::clone(ctx));
        }
        debug!("Initializing directory context");
        let ctx = (self.factory)()
            .map_err(|e| ProviderError::unavailable("directory context", e))?;
        *context = Some(Arc::clone(&ctx));
        Ok(ctx)
    }
}

impl Provider for DirectoryProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let name = request.params.required("name")?;
        let context = self.context()?;
        let value = context
            .lookup(name)
            .map_err(|e| ProviderError::unavailable(name, e))?;
        if value.is_none() {
            warn!(name = %name, field = request.field.name, "Name not bound in directory context");
        }
        Ok(value.map(RawValue::Text))
    }
}
