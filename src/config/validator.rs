//! Configuration validation for control files.
//!
//! Catches problems that would otherwise only surface halfway through a
//! planning run: colliding identities, empty scripts, bad guard patterns.

use crate::definition::{Definition, ResourceType};
use crate::dialect::{DatabaseLanguage, ServerDefaults};
use crate::error::{ConfigError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::ControlConfig;

/// Validator for resolved control configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &ControlConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConfigError::validation(first_error.message.clone(), first_error.field.clone()).into())
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &ControlConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_definitions(config, &mut result);
        Self::validate_settings(config, &mut result);
        Self::validate_guards(config, &mut result);

        result
    }

    /// Validates the declared definitions.
    fn validate_definitions(config: &ControlConfig, result: &mut ValidationResult) {
        if config.definitions.is_empty() {
            result.warnings.push(String::from("No definitions declared in configuration"));
            return;
        }

        let adapter = config.adapter();
        let mut seen_resources: HashSet<(ResourceType, &str)> = HashSet::new();
        let mut seen_changes: HashSet<&str> = HashSet::new();
        let mut unsupported: Vec<ResourceType> = Vec::new();

        for (i, definition) in config.definitions.iter().enumerate() {
            let prefix = format!("definitions[{i}]");

            match definition {
                Definition::Resource(resource) => {
                    if !seen_resources.insert((resource.resource_type, resource.name.as_str())) {
                        result.errors.push(ValidationError {
                            field: prefix.clone(),
                            message: format!(
                                "Duplicate resource definition: {} {} ({})",
                                resource.resource_type,
                                resource.name,
                                resource.path.display()
                            ),
                        });
                    }
                    if !adapter.supports(resource.resource_type) && !unsupported.contains(&resource.resource_type) {
                        unsupported.push(resource.resource_type);
                    }
                }
                Definition::Change(change) => {
                    if !seen_changes.insert(change.id.as_str()) {
                        result.errors.push(ValidationError {
                            field: prefix.clone(),
                            message: format!("Duplicate change definition: {} ({})", change.id, change.path.display()),
                        });
                    }
                }
            }

            if definition.sql().trim().is_empty() {
                result.errors.push(ValidationError {
                    field: prefix,
                    message: format!("Definition file is empty: {}", definition.path().display()),
                });
            }
        }

        for resource_type in unsupported {
            result.warnings.push(format!(
                "definitions: {resource_type} definitions are not supported for {} {} and will fail to plan",
                config.language, config.dialect
            ));
        }
    }

    /// Validates run settings.
    fn validate_settings(config: &ControlConfig, result: &mut ValidationResult) {
        if config.parallelism == 0 {
            result.errors.push(ValidationError {
                field: String::from("parallelism"),
                message: String::from("Parallelism must be at least 1"),
            });
        }

        match config.language {
            DatabaseLanguage::Mysql => {
                if config.schema.is_some() {
                    result
                        .warnings
                        .push(String::from("schema: ignored for mysql, names are not schema-qualified"));
                }
            }
            DatabaseLanguage::Postgres => {
                if config.server_defaults != ServerDefaults::default() {
                    result
                        .warnings
                        .push(String::from("server_defaults: only applies to mysql table options"));
                }
            }
        }
    }

    /// Validates reapply guard patterns.
    fn validate_guards(config: &ControlConfig, result: &mut ValidationResult) {
        for (i, pattern) in config.strict_guards.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                result.errors.push(ValidationError {
                    field: format!("strict_guards[{i}]"),
                    message: format!("Invalid guard pattern '{pattern}': {e}"),
                });
            }
        }

        if !config.strict && !config.strict_guards.is_empty() {
            result
                .warnings
                .push(String::from("strict_guards: has no effect unless strict mode is enabled"));
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SnapshotConnection;
    use crate::definition::{ChangeDefinition, ResourceDefinition};
    use crate::dialect::DialectVersion;
    use std::sync::Arc;

    fn config(language: DatabaseLanguage, dialect: DialectVersion, definitions: Vec<Definition>) -> ControlConfig {
        ControlConfig::new(language, dialect, Arc::new(SnapshotConnection::default())).with_definitions(definitions)
    }

    fn table(name: &str) -> Definition {
        ResourceDefinition::new(
            ResourceType::Table,
            name,
            format!("tables/{name}.sql"),
            format!("CREATE TABLE {name} (id INT)"),
        )
        .into()
    }

    #[test]
    fn test_valid_config() {
        let config = config(
            DatabaseLanguage::Mysql,
            DialectVersion::new(8, 0),
            vec![table("user"), ChangeDefinition::new("seed", "seed.sql", "INSERT INTO user VALUES (1)").into()],
        );
        let result = ConfigValidator::new().validate(&config).expect("config should be valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_duplicate_definitions() {
        let config = config(
            DatabaseLanguage::Mysql,
            DialectVersion::new(8, 0),
            vec![
                table("user"),
                table("user"),
                ChangeDefinition::new("seed", "a.sql", "SELECT 1").into(),
                ChangeDefinition::new("seed", "b.sql", "SELECT 2").into(),
            ],
        );
        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 2);
        assert!(result.errors[0].message.contains("Duplicate resource definition"));
        assert!(result.errors[1].message.contains("Duplicate change definition"));

        let err = ConfigValidator::new().validate(&config).expect_err("duplicates should fail");
        assert!(err.to_string().contains("Duplicate resource definition"));
    }

    #[test]
    fn test_same_name_different_type_is_allowed() {
        let view: Definition =
            ResourceDefinition::new(ResourceType::View, "user", "views/user.sql", "CREATE VIEW user AS SELECT 1").into();
        let config = config(DatabaseLanguage::Mysql, DialectVersion::new(8, 0), vec![table("user"), view]);
        assert!(ConfigValidator::new().check(&config).is_valid());
    }

    #[test]
    fn test_empty_sql_and_zero_parallelism() {
        let config = config(
            DatabaseLanguage::Postgres,
            DialectVersion::new(14, 0),
            vec![ChangeDefinition::new("blank", "blank.sql", "  \n").into()],
        )
        .with_parallelism(0);
        let result = ConfigValidator::new().check(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["definitions[0]", "parallelism"]);
    }

    #[test]
    fn test_invalid_guard_pattern() {
        let config = config(DatabaseLanguage::Mysql, DialectVersion::new(8, 0), vec![table("user")])
            .with_strict(true)
            .with_strict_guards(vec![String::from("DROP ("), String::from("^\\s*`")]);
        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "strict_guards[0]");
    }

    #[test]
    fn test_warnings() {
        let matview: Definition = ResourceDefinition::new(
            ResourceType::MaterializedView,
            "totals",
            "totals.sql",
            "CREATE MATERIALIZED VIEW totals AS SELECT 1",
        )
        .into();
        let config = config(DatabaseLanguage::Mysql, DialectVersion::new(8, 0), vec![matview])
            .with_schema("app")
            .with_strict_guards(vec![String::from("DROP")]);
        let result = ConfigValidator::new().check(&config);
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 3);
        assert!(result.warnings[0].contains("materialized_view"));
    }
}
