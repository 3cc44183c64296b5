//! DDL normalization.
//!
//! Live definitions reported by a database server and the SQL an author
//! declares rarely match byte for byte: the server adds quoting, default
//! options, definers and its own layout. A [`DialectAdapter`] rewrites both
//! sides into one canonical text so that a plain string comparison tells
//! whether a resource is in sync.
//!
//! One adapter exists per database language. It is chosen once from the
//! configuration through [`DatabaseLanguage::adapter`].

mod layout;
mod lexer;
mod mysql;
mod postgres;
mod query;
mod table;
mod token;

pub use mysql::{MysqlAdapter, ServerDefaults};
pub use postgres::PostgresAdapter;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::definition::ResourceType;
use crate::error::{ConfigError, ControlError, DialectError, Result};

/// Database language of the managed schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseLanguage {
    /// `MySQL` (and compatible servers).
    #[serde(alias = "MYSQL", alias = "MySQL")]
    Mysql,
    /// `PostgreSQL`.
    #[serde(alias = "POSTGRES", alias = "postgresql", alias = "PostgreSQL")]
    Postgres,
}

/// Server version the definitions target, e.g. `5.7` or `14`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectVersion {
    major: u32,
    minor: u32,
    raw: String,
}

/// Settings an adapter needs beyond language and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectSettings {
    /// Postgres schema treated as the implicit qualification.
    pub schema: String,
    /// `MySQL` table options that are implied when omitted.
    pub server_defaults: ServerDefaults,
}

/// Canonicalizes DDL for one database language and version.
pub trait DialectAdapter: Send + Sync + std::fmt::Debug {
    /// Language this adapter handles.
    fn language(&self) -> DatabaseLanguage;

    /// Dialect version in effect.
    fn dialect(&self) -> &DialectVersion;

    /// Returns true if definitions of `resource_type` can be normalized.
    fn supports(&self, resource_type: ResourceType) -> bool;

    /// Rewrites `raw` into its canonical form.
    ///
    /// Normalization is idempotent: normalizing an already normalized text
    /// returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DialectError::Unsupported`] if `resource_type` is not
    /// supported for this language and version.
    fn normalize(&self, resource_type: ResourceType, raw: &str) -> Result<String>;
}

impl DatabaseLanguage {
    /// Builds the adapter for this language.
    #[must_use]
    pub fn adapter(self, dialect: DialectVersion, settings: DialectSettings) -> Arc<dyn DialectAdapter> {
        match self {
            Self::Mysql => Arc::new(MysqlAdapter::new(dialect, settings.server_defaults)),
            Self::Postgres => Arc::new(PostgresAdapter::new(dialect, settings.schema)),
        }
    }

    /// Lowercase name used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for DatabaseLanguage {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::validation(
                format!("database language '{other}' is not supported"),
                "language",
            )),
        }
    }
}

impl std::fmt::Display for DatabaseLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DialectVersion {
    /// Creates a version from its components.
    #[must_use]
    pub fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            raw: format!("{major}.{minor}"),
        }
    }

    /// Major version.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Minor version.
    #[must_use]
    pub const fn minor(&self) -> u32 {
        self.minor
    }

    /// Returns true if this version is `major.minor` or newer.
    #[must_use]
    pub const fn at_least(&self, major: u32, minor: u32) -> bool {
        self.major > major || (self.major == major && self.minor >= minor)
    }
}

impl FromStr for DialectVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDialect {
            version: s.to_string(),
        };
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        let mut parts = trimmed.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| invalid())?,
            None => 0,
        };
        for rest in parts {
            rest.parse::<u32>().map_err(|_| invalid())?;
        }

        Ok(Self {
            major,
            minor,
            raw: trimmed.to_string(),
        })
    }
}

impl std::fmt::Display for DialectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Default for DialectSettings {
    fn default() -> Self {
        Self {
            schema: String::from("public"),
            server_defaults: ServerDefaults::default(),
        }
    }
}

/// Error for a `(language, type, dialect)` combination an adapter does not handle.
pub(crate) fn unsupported(adapter: &dyn DialectAdapter, resource_type: ResourceType) -> ControlError {
    DialectError::Unsupported {
        language: adapter.language().to_string(),
        resource_type: resource_type.to_string(),
        dialect: adapter.dialect().to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_version_parse() {
        let version: DialectVersion = "5.7".parse().expect("valid version");
        assert_eq!((version.major(), version.minor()), (5, 7));
        assert_eq!(version.to_string(), "5.7");

        let version: DialectVersion = "14".parse().expect("valid version");
        assert_eq!((version.major(), version.minor()), (14, 0));

        let version: DialectVersion = "8.0.32".parse().expect("valid version");
        assert!(version.at_least(8, 0));
        assert!(!version.at_least(8, 1));

        assert!("latest".parse::<DialectVersion>().is_err());
        assert!("5.x".parse::<DialectVersion>().is_err());
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("MYSQL".parse::<DatabaseLanguage>().ok(), Some(DatabaseLanguage::Mysql));
        assert_eq!(
            "postgresql".parse::<DatabaseLanguage>().ok(),
            Some(DatabaseLanguage::Postgres)
        );

        let err = "oracle".parse::<DatabaseLanguage>().expect_err("oracle is not supported");
        assert!(err.to_string().contains("database language 'oracle' is not supported"));
    }

    #[test]
    fn test_adapter_selection() {
        let adapter = DatabaseLanguage::Postgres.adapter(DialectVersion::new(10, 0), DialectSettings::default());
        assert_eq!(adapter.language(), DatabaseLanguage::Postgres);
        assert!(!adapter.supports(ResourceType::Procedure));
        assert!(adapter.supports(ResourceType::MaterializedView));

        let err = adapter
            .normalize(ResourceType::Procedure, "CREATE PROCEDURE p() LANGUAGE sql AS $$ SELECT 1 $$")
            .expect_err("procedures need Postgres 11");
        assert!(err.is_unsupported_dialect());
    }
}
