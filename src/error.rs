//! Error taxonomy for injection and provider failures.
//!
//! Providers report [`ProviderError`] without knowledge of the field being
//! resolved; the engine wraps it into an [`InjectionError`] carrying a
//! [`FieldContext`]. Absence of a key is not an error at this level, it is
//! an `Ok(None)` from a provider.

use crate::binding::Params;
use serde::Serialize;
use std::fmt;

/// Boxed transport error carried by source failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error categories for programmatic handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Raised before any I/O
    Validation,
    IncompatibleFieldType,
    UnknownProvider,

    // Transport
    SourceUnavailable,

    // Policy
    FailFast,

    // Typing
    Conversion,
}

/// Where in a target an error happened.
#[derive(Debug, Clone)]
pub struct FieldContext {
    pub field: String,
    pub declaring_type: String,
    pub kind: String,
    pub params: Params,
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' of type '{}' bound to provider '{}' with {}",
            self.field, self.declaring_type, self.kind, self.params
        )
    }
}

/// A failure inside a single provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    Validation(String),

    #[error("unable to load source '{locator}': {source}")]
    SourceUnavailable {
        locator: String,
        #[source]
        source: BoxError,
    },

    #[error("resource bundle '{bundle}' not found for locale '{locale}'")]
    BundleNotFound { bundle: String, locale: String },

    #[error("field of type '{actual}' is incompatible, expected '{expected}'")]
    IncompatibleFieldType {
        expected: &'static str,
        actual: &'static str,
    },
}

impl ProviderError {
    /// Missing or empty required parameter.
    pub fn missing_param(name: &str) -> Self {
        ProviderError::Validation(format!("no value specified for parameter '{}'", name))
    }

    pub fn unavailable(locator: impl Into<String>, err: impl Into<BoxError>) -> Self {
        ProviderError::SourceUnavailable {
            locator: locator.into(),
            source: err.into(),
        }
    }
}

/// A raw value could not be turned into the field's type.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot convert '{value}' to '{target}': {reason}")]
pub struct ConversionError {
    pub value: String,
    pub target: &'static str,
    pub reason: String,
}

impl ConversionError {
    pub fn new(value: impl Into<String>, target: &'static str, reason: impl fmt::Display) -> Self {
        Self {
            value: value.into(),
            target,
            reason: reason.to_string(),
        }
    }
}

/// Fatal failure of an injection call. Aborts the whole target.
#[derive(Debug, thiserror::Error)]
pub enum InjectionError {
    #[error("invalid binding on {context}: {message}")]
    Validation {
        context: FieldContext,
        message: String,
    },

    #[error("source unavailable for {context}: {source}")]
    SourceUnavailable {
        context: FieldContext,
        #[source]
        source: ProviderError,
    },

    #[error("required value absent for {context}")]
    FailFast { context: FieldContext },

    #[error("conversion failed for {context}: {source}")]
    Conversion {
        context: FieldContext,
        #[source]
        source: ConversionError,
    },

    #[error("incompatible {context}: expected '{expected}'")]
    IncompatibleFieldType {
        context: FieldContext,
        expected: &'static str,
    },

    #[error("no provider registered for {context}")]
    UnknownProvider { context: FieldContext },
}

impl InjectionError {
    /// Attach field context to a provider failure.
    pub fn from_provider(context: FieldContext, err: ProviderError) -> Self {
        match err {
            ProviderError::Validation(message) => InjectionError::Validation { context, message },
            ProviderError::IncompatibleFieldType { expected, .. } => {
                InjectionError::IncompatibleFieldType { context, expected }
            }
            err @ (ProviderError::SourceUnavailable { .. } | ProviderError::BundleNotFound { .. }) => {
                InjectionError::SourceUnavailable {
                    context,
                    source: err,
                }
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InjectionError::Validation { .. } => ErrorKind::Validation,
            InjectionError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            InjectionError::FailFast { .. } => ErrorKind::FailFast,
            InjectionError::Conversion { .. } => ErrorKind::Conversion,
            InjectionError::IncompatibleFieldType { .. } => ErrorKind::IncompatibleFieldType,
            InjectionError::UnknownProvider { .. } => ErrorKind::UnknownProvider,
        }
    }

    pub fn context(&self) -> &FieldContext {
        match self {
            InjectionError::Validation { context, .. }
            | InjectionError::SourceUnavailable { context, .. }
            | InjectionError::FailFast { context }
            | InjectionError::Conversion { context, .. }
            | InjectionError::IncompatibleFieldType { context, .. }
            | InjectionError::UnknownProvider { context } => context,
        }
    }
}

/// Failure loading the injector's own configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for injection operations.
pub type Result<T> = std::result::Result<T, InjectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FieldContext {
        FieldContext {
            field: "name".to_string(),
            declaring_type: "app::Bean".to_string(),
            kind: "property".to_string(),
            params: Params::new().with("source", "app.properties").with("key", "bean.name"),
        }
    }

    #[test]
    fn test_message_embeds_context() {
        let err = InjectionError::FailFast { context: context() };
        let msg = err.to_string();
        assert!(msg.contains("'name'"));
        assert!(msg.contains("app::Bean"));
        assert!(msg.contains("'property'"));
        assert!(msg.contains("key=bean.name"));
    }

    #[test]
    fn test_from_provider_maps_kinds() {
        let err = InjectionError::from_provider(context(), ProviderError::missing_param("key"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = InjectionError::from_provider(
            context(),
            ProviderError::BundleNotFound {
                bundle: "messages".into(),
                locale: "fr".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);

        let err = InjectionError::from_provider(
            context(),
            ProviderError::IncompatibleFieldType {
                expected: "Properties",
                actual: "String",
            },
        );
        assert_eq!(err.kind(), ErrorKind::IncompatibleFieldType);
    }

    #[test]
    fn test_source_chain_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = InjectionError::from_provider(context(), ProviderError::unavailable("app.properties", io));
        let source = std::error::Error::source(&err).expect("has source");
        assert!(source.to_string().contains("app.properties"));
    }
}
