//! Resolution observers.
//!
//! Observers are told about every successful injection, foreground or
//! background, before the injecting call returns. [`ManagedObjects`] is the
//! built-in one: it keeps a registry of injected objects whose type declares
//! a management name, the way a management console would list them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Prefix of the names under which managed objects are registered.
pub const MANAGED_DOMAIN: &str = "props_injector";

/// One completed injection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedEvent {
    pub type_name: String,
    /// Management name declared by the type, if any.
    pub managed_name: Option<String>,
    /// Address-based identity of the injected object.
    pub identity: usize,
    /// Number of fields that received a value.
    pub fields_written: usize,
    /// Whether the injection was a hot reload pass.
    pub background: bool,
}

pub trait ResolutionObserver: Send + Sync {
    fn on_resolved(&self, event: &ResolvedEvent);
}

impl<F> ResolutionObserver for F
where
    F: Fn(&ResolvedEvent) + Send + Sync,
{
    fn on_resolved(&self, event: &ResolvedEvent) {
        self(event)
    }
}

/// Registry entry for one managed object.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ManagedObject {
    pub object_name: String,
    pub type_name: String,
    pub identity: usize,
    pub registered_at: DateTime<Utc>,
    /// Completed hot reload passes since registration.
    pub refreshes: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Management registrar for injected objects.
///
/// Each name is registered once; later events for the same name only bump
/// its refresh counter.
#[derive(Default)]
pub struct ManagedObjects {
    objects: Mutex<BTreeMap<String, ManagedObject>>,
}

impl ManagedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered name for `managed_name`, falling back to the type name.
    pub fn object_name(managed_name: &str, type_name: &str) -> String {
        let name = if managed_name.trim().is_empty() {
            type_name
        } else {
            managed_name.trim()
        };
        format!("{}:name={}", MANAGED_DOMAIN, name)
    }

    pub fn get(&self, object_name: &str) -> Option<ManagedObject> {
        self.objects.lock().get(object_name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<ManagedObject> {
        self.objects.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl ResolutionObserver for ManagedObjects {
    fn on_resolved(&self, event: &ResolvedEvent) {
        let Some(managed_name) = event.managed_name.as_deref() else {
            return;
        };
        let object_name = Self::object_name(managed_name, &event.type_name);
        let now = Utc::now();

        let mut objects = self.objects.lock();
        match objects.get_mut(&object_name) {
            Some(existing) => {
                if event.background {
                    existing.refreshes += 1;
                    existing.last_refreshed_at = Some(now);
                }
                debug!(object_name = %object_name, "Managed object already registered");
            }
            None => {
                info!(object_name = %object_name, type_name = %event.type_name, "Registered managed object");
                objects.insert(
                    object_name.clone(),
                    ManagedObject {
                        object_name,
                        type_name: event.type_name.clone(),
                        identity: event.identity,
                        registered_at: now,
                        refreshes: 0,
                        last_refreshed_at: None,
                    },
                );
            }
        }
    }
}
