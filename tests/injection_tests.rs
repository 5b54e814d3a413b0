//! Integration tests for field injection.
//!
//! These tests drive the injector end to end with properties files in a
//! temporary directory and the process environment, covering binding
//! order, absence policy, caching and observer notification.

use props_injector::cache::SourceCache;
use props_injector::error::ErrorKind;
use props_injector::providers::SystemProperties;
use props_injector::{
    Binding, BindingSet, Configurable, Injector, InjectorConfig, ProviderError, ProviderRequest,
    ProviderResult, Properties, RawValue, ResolvedEvent, shared,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Helper to create a resource root containing `app.properties`.
fn setup_resources() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(
        temp.path().join("app.properties"),
        "bean.name=Foo\nbean.port=8080\nbean.empty=\nbean.flag=on\n",
    )
    .expect("Failed to write app.properties");
    temp
}

/// Helper to build an injector over a resource root with an isolated
/// system property table.
fn injector_for(root: &Path, system: Arc<SystemProperties>) -> Injector {
    Injector::builder()
        .config(InjectorConfig::default().with_resource_roots(vec![root.to_path_buf()]))
        .system_properties(system)
        .build()
}

#[derive(Default)]
struct Bean {
    name: String,
    port: u16,
    flag: bool,
}

impl Configurable for Bean {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("name", |b: &mut Bean, v: String| b.name = v)
            .bind(Binding::system("bean.name"))
            .bind(Binding::property("app.properties", "bean.name").order(1));
        set.field("port", |b: &mut Bean, v: u16| b.port = v)
            .bind(Binding::property("app.properties", "bean.port"));
        set.field("flag", |b: &mut Bean, v: bool| b.flag = v)
            .bind(Binding::property("app.properties", "bean.flag"));
    }

    fn managed_name() -> Option<String> {
        Some("bean".to_string())
    }
}

#[test]
fn property_file_scenario_resolves_name() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut bean = Bean::default();
    injector.inject_mut(&mut bean).unwrap();

    assert_eq!(bean.name, "Foo");
    assert_eq!(bean.port, 8080);
    assert!(bean.flag);
}

#[test]
fn first_binding_with_a_value_wins() {
    let temp = setup_resources();
    let system = Arc::new(SystemProperties::new());
    system.set("bean.name", "FromSystem");
    let injector = injector_for(temp.path(), system);

    let mut bean = Bean::default();
    injector.inject_mut(&mut bean).unwrap();
    assert_eq!(bean.name, "FromSystem");
}

#[test]
fn env_default_used_when_variable_unset() {
    let injector = Injector::new();
    let value: Option<String> = injector
        .resolve(Binding::env("PROPS_INJECTOR_TEST_UNSET_HOME_91C2").default_value("/default"))
        .unwrap();
    assert_eq!(value.as_deref(), Some("/default"));
}

#[test]
fn env_value_used_when_variable_set() {
    let Ok(path) = std::env::var("PATH") else {
        return;
    };
    let injector = Injector::new();
    let value: Option<String> = injector
        .resolve(Binding::env("PATH").default_value("/default"))
        .unwrap();
    assert_eq!(value, Some(path));
}

#[derive(Default)]
struct Strict {
    first: String,
    second: String,
    third: String,
}

impl Configurable for Strict {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("first", |s: &mut Strict, v: String| s.first = v)
            .bind(Binding::property("app.properties", "bean.name"));
        set.field("second", |s: &mut Strict, v: String| s.second = v)
            .bind(Binding::property("app.properties", "missing").fail_fast());
        set.field("third", |s: &mut Strict, v: String| s.third = v)
            .bind(Binding::property("app.properties", "bean.port"));
    }
}

#[test]
fn fail_fast_aborts_and_keeps_earlier_fields() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut strict = Strict::default();
    let err = injector.inject_mut(&mut strict).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FailFast);
    let message = err.to_string();
    assert!(message.contains("'second'"));
    assert!(message.contains("Strict"));
    assert!(message.contains("'property'"));
    assert!(message.contains("key=missing"));

    assert_eq!(strict.first, "Foo");
    assert_eq!(strict.second, "");
    assert_eq!(strict.third, "");
}

#[derive(Default)]
struct Lenient {
    name: String,
    empty: String,
}

impl Configurable for Lenient {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("name", |l: &mut Lenient, v: String| l.name = v)
            .bind(Binding::property("app.properties", "missing"));
        set.field("empty", |l: &mut Lenient, v: String| l.empty = v)
            .bind(Binding::property("app.properties", "bean.empty").default_value("fallback"));
    }
}

#[test]
fn missing_key_without_default_is_ignored() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut lenient = Lenient {
        name: "untouched".to_string(),
        ..Lenient::default()
    };
    injector.inject_mut(&mut lenient).unwrap();

    assert_eq!(lenient.name, "untouched");
    // An empty value counts as absent, so the default applies.
    assert_eq!(lenient.empty, "fallback");
}

#[test]
fn empty_value_trips_fail_fast() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut value = String::new();
    let mut set = BindingSet::<String>::new();
    set.field("empty", |s: &mut String, v: String| *s = v)
        .bind(Binding::property("app.properties", "bean.empty").fail_fast());
    let err = injector.inject_with(&mut value, &set).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailFast);
    assert!(value.is_empty());
}

#[test]
fn missing_source_file_is_fatal() {
    let temp = TempDir::new().unwrap();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut lenient = Lenient::default();
    let err = injector.inject_mut(&mut lenient).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.to_string().contains("app.properties"));
}

#[test]
fn missing_required_param_is_validation_error() {
    let injector = Injector::new();
    let err = injector
        .resolve::<String>(Binding::new("property").param("source", "app.properties"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("'key'"));
}

/// Test double counting how often its source is read.
struct CountingProvider {
    root: std::path::PathBuf,
    cache: SourceCache<Properties>,
    loads: Arc<AtomicUsize>,
}

impl props_injector::Provider for CountingProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let source = request.params.required("source")?;
        let key = request.params.required("key")?;
        let props = self.cache.get_or_load(source, request.policy, || {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Properties::load(&self.root.join(source))
                .map_err(|e| ProviderError::unavailable(source, e))
        })?;
        Ok(props.get(key).map(RawValue::from))
    }
}

#[derive(Default)]
struct Counted {
    name: String,
}

impl Configurable for Counted {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("name", |c: &mut Counted, v: String| c.name = v)
            .bind(
                Binding::new("counting")
                    .param("source", "app.properties")
                    .param("key", "bean.name"),
            );
    }
}

#[test]
fn same_locator_is_read_once_across_objects() {
    let temp = setup_resources();
    let loads = Arc::new(AtomicUsize::new(0));
    let injector = Injector::builder()
        .provider(
            "counting",
            CountingProvider {
                root: temp.path().to_path_buf(),
                cache: SourceCache::new("counting"),
                loads: Arc::clone(&loads),
            },
        )
        .build();

    let mut a = Counted::default();
    let mut b = Counted::default();
    injector.inject_mut(&mut a).unwrap();
    injector.inject_mut(&mut b).unwrap();

    assert_eq!(a.name, "Foo");
    assert_eq!(b.name, "Foo");
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn property_source_is_cached_for_foreground_injections() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut first = Bean::default();
    injector.inject_mut(&mut first).unwrap();
    std::fs::write(temp.path().join("app.properties"), "bean.name=Changed\n").unwrap();

    let mut second = Bean::default();
    injector.inject_mut(&mut second).unwrap();
    assert_eq!(second.name, "Foo");
    assert_eq!(second.port, 8080);
}

#[derive(Default)]
struct Bag {
    all: Properties,
}

impl Configurable for Bag {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("all", |b: &mut Bag, v: Properties| b.all = v)
            .bind(Binding::properties("app.properties"));
    }
}

#[derive(Default)]
struct WrongBag {
    all: String,
}

impl Configurable for WrongBag {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("all", |b: &mut WrongBag, v: String| b.all = v)
            .bind(Binding::properties("does-not-exist.properties"));
    }
}

#[test]
fn properties_bag_injected_whole() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut bag = Bag::default();
    injector.inject_mut(&mut bag).unwrap();
    assert_eq!(bag.all.get("bean.name"), Some("Foo"));
    assert_eq!(bag.all.len(), 4);
}

#[test]
fn properties_bag_rejects_wrong_field_type_before_io() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));

    let mut wrong = WrongBag::default();
    let err = injector.inject_mut(&mut wrong).unwrap_err();
    // The missing file would be SourceUnavailable if it had been opened.
    assert_eq!(err.kind(), ErrorKind::IncompatibleFieldType);
}

#[derive(Default)]
struct Base {
    url: String,
    timeout: u64,
}

impl Configurable for Base {
    fn bindings(set: &mut BindingSet<Self>) {
        set.field("url", |b: &mut Base, v: String| b.url = v)
            .bind(Binding::system("base.url"));
        set.field("timeout", |b: &mut Base, v: u64| b.timeout = v)
            .bind(Binding::system("base.timeout"));
    }
}

#[derive(Default)]
struct Service {
    base: Base,
    name: String,
}

impl Configurable for Service {
    fn bindings(set: &mut BindingSet<Self>) {
        set.inherit(|s: &mut Service| &mut s.base);
        set.field("url", |s: &mut Service, v: String| s.base.url = v)
            .bind(Binding::system("service.url"));
        set.field("name", |s: &mut Service, v: String| s.name = v)
            .bind(Binding::system("service.name"));
    }
}

#[test]
fn derived_bindings_override_inherited_ones() {
    let system = Arc::new(SystemProperties::new());
    system.set("base.url", "http://base");
    system.set("base.timeout", "30");
    system.set("service.url", "http://service");
    system.set("service.name", "svc");
    let injector = Injector::builder().system_properties(system).build();

    let service = shared(Service::default());
    injector.inject(&service).unwrap();

    let service = service.read();
    assert_eq!(service.base.url, "http://service");
    assert_eq!(service.base.timeout, 30);
    assert_eq!(service.name, "svc");
}

#[test]
fn observers_notified_and_managed_objects_registered() {
    let temp = setup_resources();
    let events = Arc::new(parking_lot::Mutex::new(Vec::<ResolvedEvent>::new()));
    let sink = Arc::clone(&events);
    let injector = Injector::builder()
        .config(InjectorConfig::default().with_resource_roots(vec![temp.path().to_path_buf()]))
        .system_properties(Arc::new(SystemProperties::new()))
        .observer(Arc::new(move |event: &ResolvedEvent| sink.lock().push(event.clone())))
        .build();

    let bean = shared(Bean::default());
    injector.inject(&bean).unwrap();
    injector.inject(&bean).unwrap();

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].fields_written, 3);
    assert_eq!(events[0].managed_name.as_deref(), Some("bean"));
    assert!(!events[0].background);

    let managed = injector.managed_objects();
    assert_eq!(managed.names(), vec!["props_injector:name=bean"]);
}

#[test]
fn custom_converter_replaces_builtin() {
    let temp = setup_resources();
    let injector = injector_for(temp.path(), Arc::new(SystemProperties::new()));
    injector.register_converter(|raw: &str| Ok::<_, String>(raw.trim().to_uppercase()));

    let mut bean = Bean::default();
    injector.inject_mut(&mut bean).unwrap();
    assert_eq!(bean.name, "FOO");
}
