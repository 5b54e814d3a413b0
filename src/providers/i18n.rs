//! Localized resource bundles.
//!
//! A bundle `i18n.messages` for locale `fr_CA` is looked up as
//! `i18n/messages_fr_CA.properties`, `i18n/messages_fr.properties`, then the
//! base `i18n/messages.properties`. A key missing from a specific file falls
//! through to its parents. When no file exists for the requested locale, the
//! process default locale (from `LC_ALL`, `LC_MESSAGES` or `LANG`) is tried
//! before the base.

use super::{Provider, ProviderRequest, ProviderResult, non_empty};
use crate::binding::Params;
use crate::cache::SourceCache;
use crate::error::ProviderError;
use crate::properties::Properties;
use crate::resources::{ResourceLocator, read_path};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Language, country and variant, each optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Locale {
    pub language: Option<String>,
    pub country: Option<String>,
    pub variant: Option<String>,
}

impl Locale {
    /// Most specific well-formed combination of the three parts.
    pub fn new(language: Option<&str>, country: Option<&str>, variant: Option<&str>) -> Self {
        let language = language.map(str::to_ascii_lowercase);
        let country = language.as_ref().and(country).map(str::to_ascii_uppercase);
        let variant = country.as_ref().and(variant).map(str::to_string);
        Self {
            language,
            country,
            variant,
        }
    }

    /// Parse a POSIX locale string such as `en_US.UTF-8`.
    pub fn from_posix(raw: &str) -> Self {
        let raw = raw.split(['.', '@']).next().unwrap_or("");
        if raw.is_empty() || raw == "C" || raw == "POSIX" {
            return Self::default();
        }
        let mut parts = raw.split(['_', '-']);
        Self::new(parts.next(), parts.next(), parts.next())
    }

    /// Default locale of the process environment.
    pub fn system_default() -> Self {
        ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.is_empty())
            .map(|v| Self::from_posix(&v))
            .unwrap_or_default()
    }

    fn from_params(params: &Params) -> Option<Self> {
        params.get("language").map(|language| {
            Self::new(Some(language), params.get("country"), params.get("variant"))
        })
    }

    /// File suffixes from most to least specific, base excluded.
    fn suffixes(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(language) = &self.language {
            if let Some(country) = &self.country {
                if let Some(variant) = &self.variant {
                    out.push(format!("_{}_{}_{}", language, country, variant));
                }
                out.push(format!("_{}_{}", language, country));
            }
            out.push(format!("_{}", language));
        }
        out
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.language, &self.country, &self.variant]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            f.write_str("root")
        } else {
            f.write_str(&parts.join("_"))
        }
    }
}

/// Loaded files for one bundle and locale, most specific first.
#[derive(Debug)]
pub struct BundleChain {
    files: Vec<Properties>,
}

impl BundleChain {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.files.iter().find_map(|props| props.get(key))
    }
}

pub struct ResourceBundleProvider {
    locator: Arc<ResourceLocator>,
    default_locale: Locale,
    cache: SourceCache<BundleChain>,
}

impl ResourceBundleProvider {
    pub fn new(locator: Arc<ResourceLocator>) -> Self {
        Self::with_default_locale(locator, Locale::system_default())
    }

    pub fn with_default_locale(locator: Arc<ResourceLocator>, default_locale: Locale) -> Self {
        Self {
            locator,
            default_locale,
            cache: SourceCache::new("i18n"),
        }
    }

    fn load_chain(&self, bundle: &str, locale: &Locale) -> Result<BundleChain, ProviderError> {
        let base = bundle.replace('.', "/");
        let find = |suffix: &str| {
            let locator = format!("{}{}.properties", base, suffix);
            self.locator.find(&locator).map(|path| (locator, path))
        };

        let mut found: Vec<_> = locale.suffixes().iter().filter_map(|s| find(s.as_str())).collect();
        if found.is_empty() && *locale != self.default_locale {
            found = self
                .default_locale
                .suffixes()
                .iter()
                .filter_map(|s| find(s.as_str()))
                .collect();
        }
        found.extend(find(""));

        if found.is_empty() {
            return Err(ProviderError::BundleNotFound {
                bundle: bundle.to_string(),
                locale: locale.to_string(),
            });
        }

        let mut files = Vec::with_capacity(found.len());
        for (locator, path) in found {
            debug!(bundle = %bundle, file = %path.display(), "Loading bundle file");
            files.push(Properties::parse(&read_path(&locator, &path)?));
        }
        Ok(BundleChain { files })
    }
}

impl Provider for ResourceBundleProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let bundle = request.params.required("bundle")?;
        let key = request.params.required("key")?;
        let locale = Locale::from_params(request.params).unwrap_or_else(|| self.default_locale.clone());

        let cache_key = format!("{}@{}", bundle, locale);
        let chain = self
            .cache
            .get_or_load(&cache_key, request.policy, || self.load_chain(bundle, &locale))?;

        let value = chain.get(key).map(str::to_string);
        if value.is_none() {
            warn!(key = %key, bundle = %bundle, locale = %locale, "Key not found in resource bundle");
        }
        Ok(non_empty(value, key, bundle))
    }
}
