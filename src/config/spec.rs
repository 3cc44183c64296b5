//! Configuration types.
//!
//! [`ControlFile`] maps one-to-one to the YAML control file. [`ControlConfig`]
//! is the resolved, immutable configuration a planning run works from: the
//! dialect is parsed, definitions are loaded and the connection is open.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::connection::DatabaseConnection;
use crate::definition::{Definition, DefinitionEntry};
use crate::dialect::{DatabaseLanguage, DialectAdapter, DialectSettings, DialectVersion, ServerDefaults};

use super::hash::ContentHasher;

/// Default number of concurrent live-state lookups.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Postgres schema assumed when none is configured.
pub const DEFAULT_SCHEMA: &str = "public";

/// The root structure of a control file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlFile {
    /// Database language of the managed schema.
    pub language: DatabaseLanguage,
    /// Server version, e.g. `"5.7"` or `14`.
    #[serde(deserialize_with = "scalar_string")]
    pub dialect: String,
    /// Whether out-of-sync resources should be reapplied.
    #[serde(default)]
    pub strict: bool,
    /// Where the live state comes from.
    #[serde(default)]
    pub connection: ConnectionSpec,
    /// Postgres schema treated as the implicit qualification.
    #[serde(default)]
    pub schema: Option<String>,
    /// `MySQL` table options implied when omitted.
    #[serde(default)]
    pub server_defaults: Option<ServerDefaults>,
    /// Maximum number of concurrent lookups.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Patterns that block an automatic reapply when they match a removed line.
    #[serde(default)]
    pub strict_guards: Vec<String>,
    /// Ordered definition entries.
    #[serde(default)]
    pub definitions: Vec<DefinitionEntry>,
}

/// Live-state source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSpec {
    /// JSON snapshot of the live state.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

const fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

/// Accepts `dialect: 14` as well as `dialect: "14"`.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_yaml::Number),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text) => text,
        Scalar::Number(number) => number.to_string(),
    })
}

/// Resolved configuration of a planning run.
///
/// Built once and shared read-only by every concurrent evaluation.
#[derive(Clone)]
pub struct ControlConfig {
    /// Database language.
    pub language: DatabaseLanguage,
    /// Dialect version.
    pub dialect: DialectVersion,
    /// Shared live-state connection.
    pub connection: Arc<dyn DatabaseConnection>,
    /// Declared definitions, in declaration order.
    pub definitions: Vec<Definition>,
    /// Whether out-of-sync resources should be reapplied.
    pub strict: bool,
    /// Postgres schema, if configured.
    pub schema: Option<String>,
    /// `MySQL` server defaults.
    pub server_defaults: ServerDefaults,
    /// Maximum number of concurrent lookups.
    pub parallelism: usize,
    /// Reapply guard patterns.
    pub strict_guards: Vec<String>,
}

impl ControlConfig {
    /// Creates a configuration with no definitions and default settings.
    #[must_use]
    pub fn new(language: DatabaseLanguage, dialect: DialectVersion, connection: Arc<dyn DatabaseConnection>) -> Self {
        Self {
            language,
            dialect,
            connection,
            definitions: Vec::new(),
            strict: false,
            schema: None,
            server_defaults: ServerDefaults::default(),
            parallelism: DEFAULT_PARALLELISM,
            strict_guards: Vec::new(),
        }
    }

    /// Sets the definitions.
    #[must_use]
    pub fn with_definitions(mut self, definitions: Vec<Definition>) -> Self {
        self.definitions = definitions;
        self
    }

    /// Sets strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the Postgres schema.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the `MySQL` server defaults.
    #[must_use]
    pub fn with_server_defaults(mut self, server_defaults: ServerDefaults) -> Self {
        self.server_defaults = server_defaults;
        self
    }

    /// Sets the lookup concurrency.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the reapply guard patterns.
    #[must_use]
    pub fn with_strict_guards(mut self, strict_guards: Vec<String>) -> Self {
        self.strict_guards = strict_guards;
        self
    }

    /// Effective Postgres schema.
    #[must_use]
    pub fn schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// Settings handed to the dialect adapter.
    #[must_use]
    pub fn dialect_settings(&self) -> DialectSettings {
        DialectSettings {
            schema: self.schema().to_string(),
            server_defaults: self.server_defaults.clone(),
        }
    }

    /// Builds the dialect adapter for this configuration.
    #[must_use]
    pub fn adapter(&self) -> Arc<dyn DialectAdapter> {
        self.language.adapter(self.dialect.clone(), self.dialect_settings())
    }

    /// Fingerprint of the declared definition set.
    #[must_use]
    pub fn definitions_hash(&self) -> String {
        ContentHasher::new().hash_definitions(&self.definitions)
    }
}

impl std::fmt::Debug for ControlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConfig")
            .field("language", &self.language)
            .field("dialect", &self.dialect)
            .field("definitions", &self.definitions.len())
            .field("strict", &self.strict)
            .field("schema", &self.schema)
            .field("server_defaults", &self.server_defaults)
            .field("parallelism", &self.parallelism)
            .field("strict_guards", &self.strict_guards)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SnapshotConnection;

    #[test]
    fn test_control_file_defaults() {
        let yaml = "language: postgres\ndialect: 14\n";
        let file: ControlFile = serde_yaml::from_str(yaml).expect("control file should parse");
        assert_eq!(file.language, DatabaseLanguage::Postgres);
        assert_eq!(file.dialect, "14");
        assert!(!file.strict);
        assert_eq!(file.parallelism, DEFAULT_PARALLELISM);
        assert!(file.connection.snapshot.is_none());
        assert!(file.definitions.is_empty());
    }

    #[test]
    fn test_server_defaults_partial() {
        let yaml = "language: mysql\ndialect: \"8.0\"\nserver_defaults:\n  charset: utf8mb4\n";
        let file: ControlFile = serde_yaml::from_str(yaml).expect("control file should parse");
        let defaults = file.server_defaults.expect("server defaults should be set");
        assert_eq!(defaults.engine.as_deref(), Some("InnoDB"));
        assert_eq!(defaults.charset.as_deref(), Some("utf8mb4"));
        assert!(defaults.collation.is_none());
    }

    #[test]
    fn test_control_config_builder() {
        let config = ControlConfig::new(
            DatabaseLanguage::Postgres,
            DialectVersion::new(14, 0),
            Arc::new(SnapshotConnection::default()),
        )
        .with_strict(true)
        .with_parallelism(8);

        assert!(config.strict);
        assert_eq!(config.parallelism, 8);
        assert_eq!(config.schema(), DEFAULT_SCHEMA);
        assert_eq!(config.adapter().language(), DatabaseLanguage::Postgres);

        let config = config.with_schema("app");
        assert_eq!(config.dialect_settings().schema, "app");
    }
}
