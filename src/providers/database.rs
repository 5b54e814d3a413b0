//! Key/value table in a relational database.
//!
//! The binding's `configuration` names a properties file describing the
//! connection and table:
//!
//! ```text
//! db.driver=sqlite
//! db.url=/var/lib/app/settings.db
//! db.user=
//! db.password=
//! db.schema=main
//! db.table=application_properties
//! db.key_column=name
//! db.value_column=value
//! ```
//!
//! Both the parsed connection settings and the full key/value extraction
//! of the table are cached under the configuration locator.

use super::{LoadPolicy, Provider, ProviderRequest, ProviderResult, non_empty};
use crate::cache::SourceCache;
use crate::error::ProviderError;
use crate::properties::Properties;
use crate::resources::ResourceLocator;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DB_DRIVER: &str = "db.driver";
pub const DB_URL: &str = "db.url";
pub const DB_USER: &str = "db.user";
pub const DB_PASSWORD: &str = "db.password";
pub const DB_SCHEMA: &str = "db.schema";
pub const DB_TABLE: &str = "db.table";
pub const DB_KEY_COLUMN: &str = "db.key_column";
pub const DB_VALUE_COLUMN: &str = "db.value_column";

const SQLITE_DRIVER: &str = "sqlite";

/// Connection and table settings read from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub driver: String,
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub schema: String,
    pub table: String,
    pub key_column: String,
    pub value_column: String,
}

impl DbConfig {
    pub fn from_properties(locator: &str, props: &Properties) -> Result<Self, ProviderError> {
        let optional = |name: &str| {
            props
                .get(name)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| {
                ProviderError::unavailable(
                    locator,
                    format!("database configuration is missing '{}'", name),
                )
            })
        };

        Ok(Self {
            driver: optional(DB_DRIVER).unwrap_or_else(|| SQLITE_DRIVER.to_string()),
            url: required(DB_URL)?,
            user: optional(DB_USER),
            password: optional(DB_PASSWORD),
            schema: optional(DB_SCHEMA).unwrap_or_else(|| "main".to_string()),
            table: required(DB_TABLE)?,
            key_column: required(DB_KEY_COLUMN)?,
            value_column: required(DB_VALUE_COLUMN)?,
        })
    }

    fn query(&self) -> String {
        format!(
            "SELECT {}, {} FROM {}.{}",
            quote_ident(&self.key_column),
            quote_ident(&self.value_column),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }

    fn database_path(&self) -> &str {
        self.url
            .strip_prefix("jdbc:sqlite:")
            .or_else(|| self.url.strip_prefix("sqlite://"))
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

pub struct DatabaseProvider {
    locator: Arc<ResourceLocator>,
    configurations: SourceCache<DbConfig>,
    tables: SourceCache<Properties>,
}

impl DatabaseProvider {
    pub fn new(locator: Arc<ResourceLocator>) -> Self {
        Self {
            locator,
            configurations: SourceCache::new("db-config"),
            tables: SourceCache::new("db-table"),
        }
    }

    fn configuration(&self, locator: &str, policy: LoadPolicy) -> Result<Arc<DbConfig>, ProviderError> {
        self.configurations.get_or_load(locator, policy, || {
            let text = self.locator.read_to_string(locator)?;
            DbConfig::from_properties(locator, &Properties::parse(&text))
        })
    }

    /// Read the whole key/value table. The connection is closed on return.
    fn load_table(locator: &str, config: &DbConfig) -> Result<Properties, ProviderError> {
        if !config.driver.eq_ignore_ascii_case(SQLITE_DRIVER) {
            return Err(ProviderError::unavailable(
                locator,
                format!("unsupported database driver '{}'", config.driver),
            ));
        }
        if config.user.is_some() || config.password.is_some() {
            debug!(locator = %locator, "Credentials are ignored by the sqlite driver");
        }

        let conn = Connection::open_with_flags(
            config.database_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| ProviderError::unavailable(locator, e))?;

        let mut stmt = conn
            .prepare(&config.query())
            .map_err(|e| ProviderError::unavailable(locator, e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?)))
            .map_err(|e| ProviderError::unavailable(locator, e))?;

        let mut props = Properties::new();
        for row in rows {
            let (key, value) = row.map_err(|e| ProviderError::unavailable(locator, e))?;
            if let (Some(key), Some(value)) = (value_to_string(key), value_to_string(value)) {
                props.insert(key, value);
            }
        }
        debug!(locator = %locator, table = %config.table, rows = props.len(), "Loaded database properties");
        Ok(props)
    }
}

impl Provider for DatabaseProvider {
    fn resolve(&self, request: &ProviderRequest<'_>) -> ProviderResult {
        let configuration = request.params.required("configuration")?;
        let key = request.params.required("key")?;

        let config = self.configuration(configuration, request.policy)?;
        let table = self.tables.get_or_load(configuration, request.policy, || {
            Self::load_table(configuration, &config)
        })?;

        let value = table.get(key).map(str::to_string);
        if value.is_none() {
            warn!(
                key = %key,
                configuration = %configuration,
                "Key not found in database table"
            );
        }
        Ok(non_empty(value, key, configuration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_props() -> Properties {
        Properties::parse(
            "db.url=sqlite:/tmp/app.db\n\
             db.table=app_props\n\
             db.key_column=k\n\
             db.value_column=v\n",
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = DbConfig::from_properties("db.properties", &config_props()).unwrap();
        assert_eq!(config.driver, "sqlite");
        assert_eq!(config.schema, "main");
        assert_eq!(config.user, None);
        assert_eq!(config.database_path(), "/tmp/app.db");
    }

    #[test]
    fn test_config_missing_table_is_source_error() {
        let props = Properties::parse("db.url=x.db\ndb.key_column=k\ndb.value_column=v\n");
        let err = DbConfig::from_properties("db.properties", &props).unwrap_err();
        assert!(matches!(err, ProviderError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("db.properties"));
    }

    #[test]
    fn test_query_quotes_identifiers() {
        let mut props = config_props();
        props.insert(DB_TABLE, "odd\"name");
        let config = DbConfig::from_properties("db.properties", &props).unwrap();
        assert_eq!(
            config.query(),
            "SELECT \"k\", \"v\" FROM \"main\".\"odd\"\"name\""
        );
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(Value::Integer(7)), Some("7".to_string()));
        assert_eq!(value_to_string(Value::Null), None);
        assert_eq!(value_to_string(Value::Text("x".into())), Some("x".to_string()));
    }
}
