//! The resolution engine.
//!
//! For every bound field, bindings are tried in order. The first binding
//! yielding a value wins; the value is converted to the field's type and
//! written. A binding that finds nothing falls back to its `default_value`,
//! fails the whole injection when marked `fail_fast`, or otherwise hands
//! over to the next binding. A field whose bindings are all exhausted keeps
//! its current value.
//!
//! Fields are written one at a time. When an injection fails, fields
//! processed before the failing one keep their new values. A hot reload
//! pass racing a reader on another thread can likewise be observed half
//! applied; no snapshot consistency across fields is provided.

use crate::binding::{Binding, BindingSet, Configurable, FieldBinding, Shared};
use crate::config::InjectorConfig;
use crate::convert::ConvertFailure;
use crate::error::{FieldContext, InjectionError, Result};
use crate::observer::{ManagedObjects, ResolutionObserver, ResolvedEvent};
use crate::providers::{
    self, DirectoryContext, LoadPolicy, Provider, ProviderRequest, RawValue, SystemProperties,
};
use crate::registry::ProviderRegistry;
use crate::scheduler::{HotReloadScheduler, RefreshHandle};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// State shared between foreground calls and hot reload passes.
struct Core {
    registry: ProviderRegistry,
    observers: RwLock<Vec<Arc<dyn ResolutionObserver>>>,
}

impl Core {
    /// Run every field of `set`, handing converted values to `write`.
    /// Returns the number of fields written.
    fn resolve_fields<T, W>(&self, set: &BindingSet<T>, policy: LoadPolicy, mut write: W) -> Result<usize>
    where
        T: 'static,
        W: FnMut(&FieldBinding<T>, Box<dyn Any + Send>) -> std::result::Result<(), Box<dyn Any + Send>>,
    {
        let mut written = 0;
        for field in set.fields() {
            let Some((value, context)) = self.resolve_field(field, policy)? else {
                continue;
            };
            write(field, value).map_err(|_| InjectionError::IncompatibleFieldType {
                expected: field.info().value_type_name,
                context,
            })?;
            written += 1;
        }
        Ok(written)
    }

    fn resolve_field<T: 'static>(
        &self,
        field: &FieldBinding<T>,
        policy: LoadPolicy,
    ) -> Result<Option<(Box<dyn Any + Send>, FieldContext)>> {
        let info = field.info();
        for binding in field.bindings() {
            let context = || FieldContext {
                field: info.name.to_string(),
                declaring_type: info.declaring_type.to_string(),
                kind: binding.kind().to_string(),
                params: binding.params().clone(),
            };
            let provider = self
                .registry
                .provider(binding.kind())
                .ok_or_else(|| InjectionError::UnknownProvider { context: context() })?;

            let request = ProviderRequest {
                params: binding.params(),
                field: info,
                policy,
            };
            let raw = match provider
                .resolve(&request)
                .map_err(|e| InjectionError::from_provider(context(), e))?
            {
                Some(raw) => raw,
                None if binding.params().fail_fast() => {
                    return Err(InjectionError::FailFast { context: context() });
                }
                None => match binding.params().default_value() {
                    Some(default) => {
                        debug!(field = info.name, kind = binding.kind(), "Using default value");
                        RawValue::Text(default.to_string())
                    }
                    None => {
                        trace!(field = info.name, kind = binding.kind(), "No value, trying next binding");
                        continue;
                    }
                },
            };

            let value = self
                .registry
                .converters()
                .convert(&raw, info)
                .map_err(|failure| match failure {
                    ConvertFailure::Conversion(source) => InjectionError::Conversion {
                        context: context(),
                        source,
                    },
                    ConvertFailure::Incompatible { expected } => {
                        InjectionError::IncompatibleFieldType {
                            context: context(),
                            expected,
                        }
                    }
                })?;
            debug!(field = info.name, kind = binding.kind(), "Resolved field");
            return Ok(Some((value, context())));
        }
        Ok(None)
    }

    fn notify(&self, event: &ResolvedEvent) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.on_resolved(event);
        }
    }

    fn inject_shared<T: Send + Sync + 'static>(
        &self,
        target: &Shared<T>,
        set: &BindingSet<T>,
        policy: LoadPolicy,
    ) -> Result<usize> {
        // The write lock is held for one assignment at a time.
        self.resolve_fields(set, policy, |field, value| {
            (field.setter())(&mut *target.write(), value)
        })
    }
}

fn identity_of<T>(target: &Shared<T>) -> usize {
    Arc::as_ptr(target) as *const () as usize
}

/// Builder for [`Injector`].
pub struct InjectorBuilder {
    config: InjectorConfig,
    builtins: bool,
    system_properties: Option<Arc<SystemProperties>>,
    directory: Option<Arc<dyn DirectoryContext>>,
    providers: Vec<(String, Arc<dyn Provider>)>,
    registry_hooks: Vec<Box<dyn FnOnce(&ProviderRegistry)>>,
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl InjectorBuilder {
    fn new() -> Self {
        Self {
            config: InjectorConfig::default(),
            builtins: true,
            system_properties: None,
            directory: None,
            providers: Vec::new(),
            registry_hooks: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an empty provider table.
    pub fn without_builtin_providers(mut self) -> Self {
        self.builtins = false;
        self
    }

    /// Table backing the `system` kind (default: the process-wide one).
    pub fn system_properties(mut self, properties: Arc<SystemProperties>) -> Self {
        self.system_properties = Some(properties);
        self
    }

    /// Context backing the `directory` kind instead of `directory_source`.
    pub fn directory_context(mut self, context: Arc<dyn DirectoryContext>) -> Self {
        self.directory = Some(context);
        self
    }

    pub fn provider(mut self, kind: impl Into<String>, provider: impl Provider + 'static) -> Self {
        self.providers.push((kind.into(), Arc::new(provider)));
        self
    }

    pub fn converter<V, E, F>(mut self, func: F) -> Self
    where
        V: Any + Send,
        E: fmt::Display,
        F: Fn(&str) -> std::result::Result<V, E> + Send + Sync + 'static,
    {
        self.registry_hooks
            .push(Box::new(move |registry: &ProviderRegistry| registry.register_converter(func)));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> Injector {
        let registry = ProviderRegistry::new();
        if self.builtins {
            let system = self
                .system_properties
                .unwrap_or_else(SystemProperties::global);
            providers::register_builtins(&registry, &self.config, system, self.directory);
        }
        for (kind, provider) in self.providers {
            registry.register_provider(kind, provider);
        }
        for hook in self.registry_hooks {
            hook(&registry);
        }

        let managed = Arc::new(ManagedObjects::new());
        let mut observers: Vec<Arc<dyn ResolutionObserver>> = Vec::with_capacity(self.observers.len() + 1);
        observers.push(managed.clone());
        observers.extend(self.observers);

        debug!(kinds = ?registry.kinds(), "Injector ready");
        Injector {
            core: Arc::new(Core {
                registry,
                observers: RwLock::new(observers),
            }),
            scheduler: HotReloadScheduler::new(),
            managed,
            default_refresh: self.config.default_refresh(),
        }
    }
}

/// Resolves bound fields of targets from the registered providers.
///
/// Dropping the injector stops every hot reload registration.
pub struct Injector {
    core: Arc<Core>,
    scheduler: HotReloadScheduler,
    managed: Arc<ManagedObjects>,
    default_refresh: Duration,
}

impl Injector {
    /// Injector with the built-in providers and default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn from_config(config: InjectorConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.core.registry
    }

    /// Register a provider. Replaces any provider of the same kind.
    pub fn register_provider(&self, kind: impl Into<String>, provider: impl Provider + 'static) {
        self.core.registry.register_provider(kind, Arc::new(provider));
    }

    /// Register a converter. Replaces any converter for the same type.
    pub fn register_converter<V, E, F>(&self, func: F)
    where
        V: Any + Send,
        E: fmt::Display,
        F: Fn(&str) -> std::result::Result<V, E> + Send + Sync + 'static,
    {
        self.core.registry.register_converter(func);
    }

    pub fn add_observer(&self, observer: Arc<dyn ResolutionObserver>) {
        self.core.observers.write().push(observer);
    }

    pub fn managed_objects(&self) -> &Arc<ManagedObjects> {
        &self.managed
    }

    /// Inject a shared target.
    ///
    /// If `T` requests hot reload, the target is scheduled for periodic
    /// re-injection and the handle controlling it is returned. Injecting an
    /// already scheduled target again does not schedule it twice.
    pub fn inject<T: Configurable>(&self, target: &Shared<T>) -> Result<Option<RefreshHandle>> {
        let set = BindingSet::<T>::discover();
        let fields_written = self.core.inject_shared(target, &set, LoadPolicy::Cached)?;
        let identity = identity_of(target);

        let handle = T::hot_reload().map(|hot_reload| {
            let period = hot_reload.period.unwrap_or(self.default_refresh);
            self.schedule(target, set, period)
        });

        self.core.notify(&ResolvedEvent {
            type_name: std::any::type_name::<T>().to_string(),
            managed_name: T::managed_name(),
            identity,
            fields_written,
            background: false,
        });
        Ok(handle)
    }

    /// Inject an exclusively borrowed target. Never scheduled for hot reload.
    pub fn inject_mut<T: Configurable>(&self, target: &mut T) -> Result<()> {
        if T::hot_reload().is_some() {
            debug!(
                type_name = std::any::type_name::<T>(),
                "Hot reload needs a shared handle, injecting once"
            );
        }
        let set = BindingSet::<T>::discover();
        let fields_written = self.inject_fields(target, &set)?;
        self.core.notify(&ResolvedEvent {
            type_name: std::any::type_name::<T>().to_string(),
            managed_name: T::managed_name(),
            identity: target as *const T as usize,
            fields_written,
            background: false,
        });
        Ok(())
    }

    /// Inject `target` from an explicitly supplied binding set.
    pub fn inject_with<T: 'static>(&self, target: &mut T, set: &BindingSet<T>) -> Result<usize> {
        let fields_written = self.inject_fields(target, set)?;
        self.core.notify(&ResolvedEvent {
            type_name: set.type_name().to_string(),
            managed_name: None,
            identity: target as *const T as usize,
            fields_written,
            background: false,
        });
        Ok(fields_written)
    }

    /// Resolve one ad-hoc binding into a value of type `V`.
    pub fn resolve<V: Any + Send>(&self, binding: Binding) -> Result<Option<V>> {
        let mut set = BindingSet::<Option<V>>::new();
        set.field("value", |slot: &mut Option<V>, value: V| *slot = Some(value))
            .bind(binding);
        let mut slot = None;
        self.inject_fields(&mut slot, &set)?;
        Ok(slot)
    }

    pub fn is_scheduled<T>(&self, target: &Shared<T>) -> bool {
        self.scheduler.is_registered(identity_of(target))
    }

    /// Number of targets currently scheduled for hot reload.
    pub fn scheduled(&self) -> usize {
        self.scheduler.len()
    }

    /// Stop all hot reload passes.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn inject_fields<T: 'static>(&self, target: &mut T, set: &BindingSet<T>) -> Result<usize> {
        self.core.resolve_fields(set, LoadPolicy::Cached, |field, value| {
            (field.setter())(target, value)
        })
    }

    fn schedule<T: Configurable>(
        &self,
        target: &Shared<T>,
        set: BindingSet<T>,
        period: Duration,
    ) -> RefreshHandle {
        let identity = identity_of(target);
        let weak_target = Arc::downgrade(target);
        let weak_core = Arc::downgrade(&self.core);
        let managed_name = T::managed_name();

        let task = move |pass_start: Instant| -> Result<bool> {
            let (Some(target), Some(core)) = (weak_target.upgrade(), weak_core.upgrade()) else {
                return Ok(false);
            };
            let fields_written =
                core.inject_shared(&target, &set, LoadPolicy::ReloadOlderThan(pass_start))?;
            core.notify(&ResolvedEvent {
                type_name: std::any::type_name::<T>().to_string(),
                managed_name: managed_name.clone(),
                identity,
                fields_written,
                background: true,
            });
            Ok(true)
        };

        let weak: std::sync::Weak<RwLock<T>> = Arc::downgrade(target);
        let liveness: std::sync::Weak<dyn Any + Send + Sync> = weak;
        self.scheduler
            .register(identity, liveness, period, Box::new(task))
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("registry", &self.core.registry)
            .field("scheduled", &self.scheduler.len())
            .field("default_refresh", &self.default_refresh)
            .finish()
    }
}
