//! Type converter registry.
//!
//! Maps a field's value type to a function turning raw text into that type.
//! Registration is copy-on-write so lookups during resolution never block.

use crate::binding::FieldInfo;
use crate::error::ConversionError;
use crate::properties::Properties;
use crate::providers::RawValue;
use arc_swap::ArcSwap;
use chrono::{DateTime, NaiveDate, Utc};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type ConvertFn = dyn Fn(&str) -> Result<Box<dyn Any + Send>, ConversionError> + Send + Sync;

/// A registered conversion into one target type.
#[derive(Clone)]
pub struct TypeConverter {
    target: &'static str,
    func: Arc<ConvertFn>,
}

impl TypeConverter {
    pub fn new<V, E, F>(func: F) -> Self
    where
        V: Any + Send,
        E: fmt::Display,
        F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
    {
        let target = std::any::type_name::<V>();
        Self {
            target,
            func: Arc::new(move |raw: &str| {
                func(raw)
                    .map(|v| Box::new(v) as Box<dyn Any + Send>)
                    .map_err(|e| ConversionError::new(raw, target, e))
            }),
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn convert(&self, raw: &str) -> Result<Box<dyn Any + Send>, ConversionError> {
        (self.func)(raw)
    }
}

impl fmt::Debug for TypeConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConverter")
            .field("target", &self.target)
            .finish()
    }
}

/// Why a raw value could not be assigned.
#[derive(Debug)]
pub enum ConvertFailure {
    Conversion(ConversionError),
    Incompatible { expected: &'static str },
}

/// Converters keyed by target type. Last registration wins.
pub struct ConverterRegistry {
    converters: ArcSwap<HashMap<TypeId, TypeConverter>>,
}

impl ConverterRegistry {
    /// Empty registry: only identity assignments succeed.
    pub fn empty() -> Self {
        Self {
            converters: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Registry with the built-in converters.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        register_builtins(&registry);
        registry
    }

    pub fn register<V, E, F>(&self, func: F)
    where
        V: Any + Send,
        E: fmt::Display,
        F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
    {
        self.insert(TypeId::of::<V>(), TypeConverter::new(func));
    }

    pub fn insert(&self, type_id: TypeId, converter: TypeConverter) {
        self.converters.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(type_id, converter.clone());
            next
        });
    }

    pub fn get(&self, type_id: TypeId) -> Option<TypeConverter> {
        self.converters.load().get(&type_id).cloned()
    }

    pub fn contains(&self, type_id: TypeId) -> bool {
        self.converters.load().contains_key(&type_id)
    }

    /// Convert `raw` into the value type of `field`.
    pub fn convert(
        &self,
        raw: &RawValue,
        field: &FieldInfo,
    ) -> Result<Box<dyn Any + Send>, ConvertFailure> {
        match raw {
            RawValue::Bag(props) => {
                if field.is::<Properties>() {
                    Ok(Box::new(props.clone()))
                } else {
                    Err(ConvertFailure::Incompatible {
                        expected: std::any::type_name::<Properties>(),
                    })
                }
            }
            RawValue::Text(text) => {
                if let Some(converter) = self.get(field.value_type) {
                    return converter.convert(text).map_err(ConvertFailure::Conversion);
                }
                if field.is::<String>() {
                    return Ok(Box::new(text.clone()));
                }
                Err(ConvertFailure::Conversion(ConversionError::new(
                    text.as_str(),
                    field.value_type_name,
                    "no converter registered for this type",
                )))
            }
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

macro_rules! register_from_str {
    ($registry:expr, $($ty:ty),+ $(,)?) => {
        $( $registry.register(|s: &str| s.trim().parse::<$ty>()); )+
    };
}

fn register_builtins(registry: &ConverterRegistry) {
    register_from_str!(
        registry, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
    );
    registry.register(parse_bool);
    registry.register(parse_char);
    registry.register(|s: &str| Ok::<_, std::convert::Infallible>(PathBuf::from(s.trim())));
    registry.register(parse_duration);
    registry.register(|s: &str| {
        DateTime::parse_from_rfc3339(s.trim()).map(|d| d.with_timezone(&Utc))
    });
    registry.register(|s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"));
    registry.register(|s: &str| Ok::<_, std::convert::Infallible>(Properties::parse(s)));
}

pub fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "no" | "n" | "off" | "0" => Ok(false),
        other => Err(format!("'{}' is not a boolean", other)),
    }
}

fn parse_char(raw: &str) -> Result<char, String> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("expected exactly one character".to_string()),
    }
}

/// Integer milliseconds, or a number with an `ms`, `s`, `m` or `h` suffix.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("'{}' is not a duration", raw))?;
    let scale: u64 = match unit.trim() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        other => return Err(format!("unknown duration unit '{}'", other)),
    };
    amount
        .checked_mul(scale)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("'{}' is out of range", raw))
}
