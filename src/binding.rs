//! Binding declarations.
//!
//! A [`Binding`] ties one field of a target to one provider kind and its
//! lookup parameters. Targets describe their bindings by implementing
//! [`Configurable`], which fills a [`BindingSet`] with typed field setters:
//!
//! ```ignore
//! impl Configurable for Bean {
//!     fn bindings(set: &mut BindingSet<Self>) {
//!         set.field("name", |bean: &mut Bean, v: String| bean.name = v)
//!             .bind(Binding::system("bean.name"))
//!             .bind(Binding::property("app.properties", "bean.name").order(1));
//!     }
//! }
//! ```

use crate::error::ProviderError;
use crate::providers::kind;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Engine policy parameter: value used when the provider finds nothing.
pub const DEFAULT_VALUE: &str = "default_value";
/// Engine policy parameter: absence becomes a fatal error.
pub const FAIL_FAST: &str = "fail_fast";

/// Free-form provider parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Trimmed value of a parameter, `None` when unset or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Trimmed value of a parameter that must be present.
    pub fn required(&self, name: &str) -> Result<&str, ProviderError> {
        self.get(name).ok_or_else(|| ProviderError::missing_param(name))
    }

    pub fn default_value(&self) -> Option<&str> {
        self.get(DEFAULT_VALUE)
    }

    pub fn fail_fast(&self) -> bool {
        matches!(
            self.get(FAIL_FAST).map(str::to_ascii_lowercase).as_deref(),
            Some("true" | "yes" | "on" | "1")
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        f.write_str("}")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One declared source for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    kind: String,
    params: Params,
    order: i32,
}

impl Binding {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
            order: 0,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Position among the field's bindings; lower runs first.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn default_value(self, value: impl Into<String>) -> Self {
        self.param(DEFAULT_VALUE, value)
    }

    pub fn fail_fast(self) -> Self {
        self.param(FAIL_FAST, "true")
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn priority(&self) -> i32 {
        self.order
    }

    // Shorthands for the built-in kinds

    pub fn env(key: impl Into<String>) -> Self {
        Self::new(kind::ENV).param("key", key)
    }

    pub fn system(key: impl Into<String>) -> Self {
        Self::new(kind::SYSTEM).param("key", key)
    }

    pub fn property(source: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(kind::PROPERTY).param("source", source).param("key", key)
    }

    pub fn properties(source: impl Into<String>) -> Self {
        Self::new(kind::PROPERTIES).param("source", source)
    }

    pub fn i18n(bundle: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(kind::I18N).param("bundle", bundle).param("key", key)
    }

    pub fn db(configuration: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(kind::DB)
            .param("configuration", configuration)
            .param("key", key)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(kind::DIRECTORY).param("name", name)
    }

    pub fn maven(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self::new(kind::MAVEN)
            .param("group_id", group_id)
            .param("artifact_id", artifact_id)
            .param("key", key)
    }

    pub fn manifest(archive: impl Into<String>, header: impl Into<String>) -> Self {
        Self::new(kind::MANIFEST)
            .param("archive", archive)
            .param("header", header)
    }
}

/// Static description of a bound field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: &'static str,
    pub declaring_type: &'static str,
    pub value_type: TypeId,
    pub value_type_name: &'static str,
}

impl FieldInfo {
    pub fn is<V: 'static>(&self) -> bool {
        self.value_type == TypeId::of::<V>()
    }
}

/// Type-erased field writer. Hands the value back if it has the wrong type.
pub(crate) type Setter<T> =
    Arc<dyn Fn(&mut T, Box<dyn Any + Send>) -> Result<(), Box<dyn Any + Send>> + Send + Sync>;

/// A field together with its stacked bindings.
pub struct FieldBinding<T> {
    info: FieldInfo,
    bindings: Vec<Binding>,
    setter: Setter<T>,
    inherited: bool,
}

impl<T> FieldBinding<T> {
    pub fn info(&self) -> &FieldInfo {
        &self.info
    }

    /// Bindings in evaluation order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub(crate) fn setter(&self) -> &Setter<T> {
        &self.setter
    }

    fn push(&mut self, binding: Binding) {
        // After every binding of equal order, so ties keep declaration order.
        let at = self.bindings.partition_point(|b| b.order <= binding.order);
        self.bindings.insert(at, binding);
    }
}

impl<T> Clone for FieldBinding<T> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            bindings: self.bindings.clone(),
            setter: Arc::clone(&self.setter),
            inherited: self.inherited,
        }
    }
}

impl<T> fmt::Debug for FieldBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("info", &self.info)
            .field("bindings", &self.bindings)
            .field("inherited", &self.inherited)
            .finish_non_exhaustive()
    }
}

/// All bindings discovered for a target type.
///
/// The set is always in evaluation order: declared fields first, then
/// inherited fields the outer type does not redeclare, each field's
/// bindings sorted by order.
pub struct BindingSet<T> {
    type_name: &'static str,
    fields: Vec<FieldBinding<T>>,
}

impl<T: 'static> BindingSet<T> {
    pub fn new() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            fields: Vec::new(),
        }
    }

    /// Declare a field of type `V` written through `setter`.
    ///
    /// Replaces an inherited field of the same name.
    pub fn field<V, F>(&mut self, name: &'static str, setter: F) -> FieldBuilder<'_, T>
    where
        V: Any + Send,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let setter: Setter<T> = Arc::new(move |target: &mut T, value: Box<dyn Any + Send>| {
            let value = value.downcast::<V>()?;
            setter(target, *value);
            Ok(())
        });
        self.fields.retain(|f| !(f.inherited && f.info.name == name));
        let index = self
            .fields
            .iter()
            .position(|f| f.inherited)
            .unwrap_or(self.fields.len());
        self.fields.insert(
            index,
            FieldBinding {
                info: FieldInfo {
                    name,
                    declaring_type: self.type_name,
                    value_type: TypeId::of::<V>(),
                    value_type_name: std::any::type_name::<V>(),
                },
                bindings: Vec::new(),
                setter,
                inherited: false,
            },
        );
        FieldBuilder {
            field: &mut self.fields[index],
        }
    }

    /// Pull in the bindings of an embedded base type reached through
    /// `project`. Fields the outer type declares under the same name,
    /// before or after this call, override the base's bindings.
    pub fn inherit<B, P>(&mut self, project: P) -> &mut Self
    where
        B: Configurable,
        P: Fn(&mut T) -> &mut B + Send + Sync + 'static,
    {
        let project = Arc::new(project);
        for base in BindingSet::<B>::discover().fields {
            if self.fields.iter().any(|f| f.info.name == base.info.name) {
                continue;
            }
            let base_setter = base.setter;
            let project = Arc::clone(&project);
            let setter: Setter<T> = Arc::new(move |target: &mut T, value| {
                base_setter(project(target), value)
            });
            self.fields.push(FieldBinding {
                info: base.info,
                bindings: base.bindings,
                setter,
                inherited: true,
            });
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldBinding<T>] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T: Configurable> BindingSet<T> {
    /// Collect the bindings `T` declares.
    pub fn discover() -> Self {
        let mut set = Self::new();
        T::bindings(&mut set);
        set
    }
}

impl<T: 'static> Default for BindingSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BindingSet<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name,
            fields: self.fields.clone(),
        }
    }
}

/// Builder returned by [`BindingSet::field`].
pub struct FieldBuilder<'a, T> {
    field: &'a mut FieldBinding<T>,
}

impl<T> FieldBuilder<'_, T> {
    pub fn bind(self, binding: Binding) -> Self {
        self.field.push(binding);
        self
    }
}

/// Periodic re-injection request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotReload {
    /// `None` uses the injector's configured default period.
    pub period: Option<Duration>,
}

impl HotReload {
    pub fn every(period: Duration) -> Self {
        Self {
            period: Some(period),
        }
    }
}

/// A type whose fields can be filled from configuration sources.
pub trait Configurable: Sized + Send + Sync + 'static {
    fn bindings(set: &mut BindingSet<Self>);

    /// Keep instances fresh by re-running injection periodically.
    fn hot_reload() -> Option<HotReload> {
        None
    }

    /// Name under which instances are exposed to management observers.
    fn managed_name() -> Option<String> {
        None
    }
}

/// Target handle whose identity keys hot-reload registration.
pub type Shared<T> = Arc<RwLock<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}
