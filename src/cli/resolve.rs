//! `resolve` subcommand: one ad-hoc binding, printed as text or JSON.

use crate::binding::Binding;
use crate::engine::Injector;
use crate::error::InjectionError;
use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Printed in place of a value when no binding produced one.
pub const ABSENT: &str = "<absent>";

/// Field type the value is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Bool,
    I64,
    F64,
    Path,
    Duration,
}

/// Arguments for the resolve subcommand
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Provider kind (see `kinds`)
    #[arg(short, long)]
    pub kind: String,

    /// Binding parameter as name=value (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Type to convert the value to
    #[arg(short = 't', long = "type", value_enum, default_value_t = ValueType::String)]
    pub value_type: ValueType,

    /// Print a JSON object instead of the bare value
    #[arg(long)]
    pub json: bool,
}

impl ResolveArgs {
    pub fn binding(&self) -> Binding {
        self.params
            .iter()
            .fold(Binding::new(self.kind.as_str()), |binding, (name, value)| {
                binding.param(name.as_str(), value.as_str())
            })
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Outcome of one resolution.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolveOutput {
    pub kind: String,
    pub params: BTreeMap<String, String>,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// `None` when absent.
    pub value: Option<Value>,
    #[serde(skip)]
    pub display: Option<String>,
}

impl ResolveOutput {
    pub fn render(&self, as_json: bool) -> String {
        if as_json {
            // Serializing plain maps and JSON values cannot fail.
            serde_json::to_string_pretty(self).unwrap_or_default()
        } else {
            self.display.clone().unwrap_or_else(|| ABSENT.to_string())
        }
    }
}

pub fn run_resolve(injector: &Injector, args: &ResolveArgs) -> Result<ResolveOutput, InjectionError> {
    let binding = args.binding();
    let resolved: Option<(Value, String)> = match args.value_type {
        ValueType::String => injector
            .resolve::<String>(binding)?
            .map(|v| (json!(v), v)),
        ValueType::Bool => injector
            .resolve::<bool>(binding)?
            .map(|v| (json!(v), v.to_string())),
        ValueType::I64 => injector
            .resolve::<i64>(binding)?
            .map(|v| (json!(v), v.to_string())),
        ValueType::F64 => injector
            .resolve::<f64>(binding)?
            .map(|v| (json!(v), v.to_string())),
        ValueType::Path => injector
            .resolve::<PathBuf>(binding)?
            .map(|v| (json!(v.display().to_string()), v.display().to_string())),
        ValueType::Duration => injector
            .resolve::<Duration>(binding)?
            .map(|v| (json!(v.as_millis() as u64), format!("{:?}", v))),
    };

    let (value, display) = match resolved {
        Some((value, display)) => (Some(value), Some(display)),
        None => (None, None),
    };
    Ok(ResolveOutput {
        kind: args.kind.clone(),
        params: args.params.iter().cloned().collect(),
        value_type: args.value_type,
        value,
        display,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderRequest, ProviderResult, RawValue};

    fn injector() -> Injector {
        Injector::builder()
            .without_builtin_providers()
            .provider("fixed", |request: &ProviderRequest<'_>| -> ProviderResult {
                Ok(match request.params.required("key")? {
                    "timeout" => Some(RawValue::from("2s")),
                    "enabled" => Some(RawValue::from("yes")),
                    _ => None,
                })
            })
            .build()
    }

    fn args(params: &[(&str, &str)], value_type: ValueType) -> ResolveArgs {
        ResolveArgs {
            kind: "fixed".to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value_type,
            json: false,
        }
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("key=a=b").unwrap(),
            ("key".to_string(), "a=b".to_string())
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param(" =x").is_err());
    }

    #[test]
    fn test_resolve_typed() {
        let injector = injector();
        let output = run_resolve(&injector, &args(&[("key", "timeout")], ValueType::Duration)).unwrap();
        assert_eq!(output.value, Some(json!(2000)));
        assert_eq!(output.render(false), "2s");

        let output = run_resolve(&injector, &args(&[("key", "enabled")], ValueType::Bool)).unwrap();
        assert_eq!(output.render(false), "true");
    }

    #[test]
    fn test_absent_and_default() {
        let injector = injector();
        let output = run_resolve(&injector, &args(&[("key", "missing")], ValueType::String)).unwrap();
        assert_eq!(output.render(false), ABSENT);
        let json: Value = serde_json::from_str(&output.render(true)).unwrap();
        assert_eq!(json["value"], Value::Null);
        assert_eq!(json["type"], "string");

        let output = run_resolve(
            &injector,
            &args(&[("key", "missing"), ("default_value", "42")], ValueType::I64),
        )
        .unwrap();
        assert_eq!(output.value, Some(json!(42)));
    }

    #[test]
    fn test_conversion_failure_is_error() {
        let injector = injector();
        let err = run_resolve(&injector, &args(&[("key", "timeout")], ValueType::I64)).unwrap_err();
        assert!(err.to_string().contains("conversion failed"));
    }
}
