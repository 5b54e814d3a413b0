//! Declarative field-level configuration injection.
//!
//! Types describe where each field's value comes from by implementing
//! [`Configurable`]; an [`Injector`] resolves those bindings against its
//! registered providers (environment, system properties, properties files,
//! resource bundles, databases, directory contexts and archive metadata),
//! converts the raw values and writes them into the target.
//!
//! ```ignore
//! use props_injector::{Binding, BindingSet, Configurable, Injector, shared};
//!
//! #[derive(Default)]
//! struct Settings {
//!     name: String,
//!     port: u16,
//! }
//!
//! impl Configurable for Settings {
//!     fn bindings(set: &mut BindingSet<Self>) {
//!         set.field("name", |s: &mut Settings, v: String| s.name = v)
//!             .bind(Binding::property("app.properties", "bean.name"));
//!         set.field("port", |s: &mut Settings, v: u16| s.port = v)
//!             .bind(Binding::env("APP_PORT").default_value("8080"));
//!     }
//! }
//!
//! let injector = Injector::new();
//! let settings = shared(Settings::default());
//! injector.inject(&settings)?;
//! ```

pub mod binding;
pub mod cache;
pub mod cli;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod observer;
pub mod properties;
pub mod providers;
pub mod registry;
pub mod resources;
pub mod scheduler;

pub use binding::{Binding, BindingSet, Configurable, FieldInfo, HotReload, Params, Shared, shared};
pub use config::InjectorConfig;
pub use engine::{Injector, InjectorBuilder};
pub use error::{ErrorKind, InjectionError, ProviderError, Result};
pub use observer::{ManagedObjects, ResolutionObserver, ResolvedEvent};
pub use properties::Properties;
pub use providers::{LoadPolicy, Provider, ProviderRequest, ProviderResult, RawValue};
pub use scheduler::RefreshHandle;
