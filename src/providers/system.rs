//! In-process system property table.
//!
//! A process-wide key/value table seeded with facts about the host
//! (`os.name`, `user.home`, `path.separator`, ...). Applications may set
//! their own entries at runtime, e.g. from command line flags.

use super::{Provider, ProviderRequest, ProviderResult, RawValue};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::warn;

/// Mutable property table shared across the process.
#[derive(Debug, Default)]
pub struct SystemProperties {
    values: RwLock<HashMap<String, String>>,
}

impl SystemProperties {
    /// Empty table, not seeded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with host facts.
    pub fn seeded() -> Self {
        let props = Self::new();
        props.set("os.name", std::env::consts::OS);
        props.set("os.arch", std::env::consts::ARCH);
        props.set("os.family", std::env::consts::FAMILY);
        props.set("file.separator", std::path::MAIN_SEPARATOR.to_string());
        props.set("path.separator", if cfg!(windows) { ";" } else { ":" });
        props.set("line.separator", if cfg!(windows) { "\r\n" } else { "\n" });
        props.set("process.id", std::process::id().to_string());
        if let Ok(dir) = std::env::current_dir() {
            props.set("user.dir", dir.display().to_string());
        }
        if let Some(home) = dirs::home_dir() {
            props.set("user.home", home.display().to_string());
        }
        if let Some(user) = std::env::var("USER")
            .ok()
            .or_else(|| std::env::var("USERNAME").ok())
        {
            props.set("user.name", user);
        }
        props
    }

    /// The process-wide table.
    pub fn global() -> Arc<SystemProperties> {
        static GLOBAL: OnceLock<Arc<SystemProperties>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SystemProperties::seeded())))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }
}

/// Reads from a [`SystemProperties`] table. No caching.
pub struct SystemPropertyProvider {
    properties: Arc<SystemProperties>,
}

impl SystemPropertyProvider {
    pub fn new(properties: Arc<SystemProperties>) -> Self {
        Self { properties }
    }
}

impl Default for SystemPropertyProvider {
    fn default() -> Self {
        Self::new(SystemProperties::global())
    }
}

impl Provider for SystemPropertyProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let key = request.params.required("key")?;
        match self.properties.get(key) {
            Some(value) => Ok(Some(RawValue::Text(value))),
            None => {
                warn!(
                    key = %key,
                    field = request.field.name,
                    declaring_type = request.field.declaring_type,
                    "System property not set"
                );
                Ok(None)
            }
        }
    }
}
