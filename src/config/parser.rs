//! Configuration parser for loading control files.
//!
//! This module handles loading the control file from YAML, applying
//! environment variable overrides and resolving it into a [`ControlConfig`].

use crate::connection::SnapshotConnection;
use crate::definition::DefinitionLoader;
use crate::dialect::DialectVersion;
use crate::error::{ConfigError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::spec::{ControlConfig, ControlFile};

/// Overrides `dialect`.
pub const ENV_DIALECT: &str = "SCHEMACTL_DIALECT";
/// Overrides `strict` (`true`/`false`/`1`/`0`).
pub const ENV_STRICT: &str = "SCHEMACTL_STRICT";
/// Overrides `schema`.
pub const ENV_SCHEMA: &str = "SCHEMACTL_SCHEMA";
/// Overrides `parallelism`.
pub const ENV_PARALLELISM: &str = "SCHEMACTL_PARALLELISM";

/// Configuration parser for loading control files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a control file from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ControlFile> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string()))?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a control file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ControlFile> {
        debug!("Parsing YAML configuration");

        let file: ControlFile = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        })?;

        debug!(
            "Parsed control file for {} {} with {} definition entries",
            file.language,
            file.dialect,
            file.definitions.len()
        );
        Ok(file)
    }

    /// Loads a control file with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// holds a malformed value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ControlFile> {
        let mut file = self.load_file(path)?;
        Self::apply_env_overrides(&mut file, |name| std::env::var(name).ok())?;
        Ok(file)
    }

    /// Applies overrides read through `lookup` to `file`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `SCHEMACTL_STRICT` or
    /// `SCHEMACTL_PARALLELISM` cannot be parsed.
    pub fn apply_env_overrides(file: &mut ControlFile, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dialect) = lookup(ENV_DIALECT) {
            debug!("Overriding dialect from environment");
            file.dialect = dialect;
        }

        if let Some(strict) = lookup(ENV_STRICT) {
            debug!("Overriding strict from environment");
            file.strict = match strict.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid_env(ENV_STRICT)),
            };
        }

        if let Some(schema) = lookup(ENV_SCHEMA) {
            debug!("Overriding schema from environment");
            file.schema = Some(schema);
        }

        if let Some(parallelism) = lookup(ENV_PARALLELISM) {
            debug!("Overriding parallelism from environment");
            file.parallelism = parallelism.trim().parse().map_err(|_| invalid_env(ENV_PARALLELISM))?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(format!("Failed to load .env file: {e}"), env_path.display().to_string())
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Loads a control file and resolves it into a [`ControlConfig`].
    ///
    /// Definition paths and the snapshot path resolve against the directory
    /// holding the control file.
    ///
    /// # Errors
    ///
    /// Returns an error if the control file, a definition or the snapshot
    /// cannot be loaded, or the dialect version is malformed.
    pub async fn load_control(&self, path: impl AsRef<Path>) -> Result<ControlConfig> {
        let path = path.as_ref();
        let file = self.load_with_env(path)?;
        self.resolve(file, path).await
    }

    /// Resolves an already parsed control file declared at `source`.
    ///
    /// # Errors
    ///
    /// See [`ConfigParser::load_control`].
    pub async fn resolve(&self, file: ControlFile, source: &Path) -> Result<ControlConfig> {
        let base_dir = source
            .parent()
            .map(Path::to_path_buf)
            .or_else(|| self.base_path.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let dialect: DialectVersion = file.dialect.parse()?;
        let definitions = DefinitionLoader::new(file.language).load(&file.definitions, &base_dir)?;

        let snapshot = file.connection.snapshot.as_ref().ok_or_else(|| {
            ConfigError::validation("a live-state snapshot is required", "connection.snapshot")
        })?;
        let connection = SnapshotConnection::load(base_dir.join(snapshot)).await?;

        info!(
            "Resolved {} definitions for {} {}",
            definitions.len(),
            file.language,
            dialect
        );

        let mut config = ControlConfig::new(file.language, dialect, Arc::new(connection))
            .with_definitions(definitions)
            .with_strict(file.strict)
            .with_parallelism(file.parallelism)
            .with_strict_guards(file.strict_guards);
        if let Some(schema) = file.schema {
            config = config.with_schema(schema);
        }
        if let Some(server_defaults) = file.server_defaults {
            config = config.with_server_defaults(server_defaults);
        }
        Ok(config)
    }
}

fn invalid_env(name: &str) -> crate::error::ControlError {
    ConfigError::MissingEnvVar {
        name: name.to_string(),
    }
    .into()
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["control.yml", "control.yaml", "schema/control.yml"];

/// Finds the control file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ResourceType;
    use crate::dialect::DatabaseLanguage;
    use std::collections::HashMap;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dir");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
language: mysql
dialect: "5.7"
"#;
        let file = ConfigParser::new().parse_yaml(yaml, None).expect("config should parse");
        assert_eq!(file.language, DatabaseLanguage::Mysql);
        assert_eq!(file.dialect, "5.7");
        assert!(!file.strict);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
language: postgres
dialect: "14"
strict: true
schema: app
parallelism: 8
connection:
  snapshot: live.json
strict_guards:
  - "^\\s*DROP"
definitions:
  - { type: resource, path: tables/users.sql }
  - { type: change, id: seed, path: changes/seed.sql }
  - lists/functions.yml
"#;
        let file = ConfigParser::new().parse_yaml(yaml, None).expect("config should parse");
        assert!(file.strict);
        assert_eq!(file.schema.as_deref(), Some("app"));
        assert_eq!(file.parallelism, 8);
        assert_eq!(file.connection.snapshot, Some(PathBuf::from("live.json")));
        assert_eq!(file.strict_guards.len(), 1);
        assert_eq!(file.definitions.len(), 3);
    }

    #[test]
    fn test_parse_invalid_language() {
        let err = ConfigParser::new()
            .parse_yaml("language: oracle\ndialect: \"19\"\n", None)
            .expect_err("unknown language should fail");
        assert!(err.to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_env_overrides() {
        let mut file = ConfigParser::new()
            .parse_yaml("language: mysql\ndialect: \"5.7\"\n", None)
            .expect("config should parse");
        let env: HashMap<&str, &str> = [
            (ENV_DIALECT, "8.0"),
            (ENV_STRICT, "true"),
            (ENV_SCHEMA, "reporting"),
            (ENV_PARALLELISM, "2"),
        ]
        .into_iter()
        .collect();

        ConfigParser::apply_env_overrides(&mut file, |name| env.get(name).map(|v| (*v).to_string()))
            .expect("overrides should apply");
        assert_eq!(file.dialect, "8.0");
        assert!(file.strict);
        assert_eq!(file.schema.as_deref(), Some("reporting"));
        assert_eq!(file.parallelism, 2);
    }

    #[test]
    fn test_env_override_invalid_value() {
        let mut file = ConfigParser::new()
            .parse_yaml("language: mysql\ndialect: \"5.7\"\n", None)
            .expect("config should parse");
        let err = ConfigParser::apply_env_overrides(&mut file, |name| {
            (name == ENV_PARALLELISM).then(|| String::from("many"))
        })
        .expect_err("non-numeric parallelism should fail");
        assert!(err.to_string().contains(ENV_PARALLELISM));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(dir.path(), "schema/control.yml", "language: mysql\ndialect: \"8.0\"\n");
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).expect("create nested dir");

        let found = find_config_file(&nested).expect("config should be found");
        assert!(found.ends_with("schema/control.yml"));
    }

    #[tokio::test]
    async fn test_load_control() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(
            dir.path(),
            "control.yml",
            "language: mysql\ndialect: \"8.0\"\nconnection:\n  snapshot: live.json\ndefinitions:\n  - { type: resource, path: tables/user.sql }\n",
        );
        write(dir.path(), "tables/user.sql", "CREATE TABLE user (id INT NOT NULL);");
        write(
            dir.path(),
            "live.json",
            r#"{"resources": [{"type": "table", "name": "user", "ddl": "CREATE TABLE `user` (`id` int NOT NULL)"}]}"#,
        );

        let config = ConfigParser::new()
            .load_control(dir.path().join("control.yml"))
            .await
            .expect("control should load");
        assert_eq!(config.language, DatabaseLanguage::Mysql);
        assert!(config.dialect.at_least(8, 0));
        assert_eq!(config.definitions.len(), 1);

        let live = config
            .connection
            .query_live_definition(ResourceType::Table, "user")
            .await
            .expect("lookup should succeed");
        assert!(live.is_some());
    }

    #[tokio::test]
    async fn test_load_control_requires_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        write(dir.path(), "control.yml", "language: mysql\ndialect: \"8.0\"\n");

        let err = ConfigParser::new()
            .load_control(dir.path().join("control.yml"))
            .await
            .expect_err("missing snapshot should fail");
        assert!(err.to_string().contains("snapshot"));
    }
}
