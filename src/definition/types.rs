//! Definition types.
//!
//! A planning run is built from two kinds of declared definitions:
//! resources, which are idempotently reapplicable objects addressed by what
//! they create, and changes, which are one-shot scripts addressed by an id
//! and tracked by a content hash.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ContentHasher;
use crate::dialect::DatabaseLanguage;
use crate::error::Result;

use super::extract::extract_resource_header;

/// Type of database object a resource definition creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A table.
    Table,
    /// A view.
    View,
    /// A materialized view (Postgres).
    MaterializedView,
    /// A stored procedure.
    Procedure,
    /// A stored function.
    Function,
    /// A trigger.
    Trigger,
    /// A scheduled event (MySQL).
    Event,
}

/// The two kinds of definitions a plan can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// Idempotently reapplicable object definition.
    Resource,
    /// One-shot change script.
    Change,
}

/// A declarative, idempotently reapplicable object definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDefinition {
    /// Type of object created.
    pub resource_type: ResourceType,
    /// Object name, unique within its type.
    pub name: String,
    /// File the definition was declared in.
    pub path: PathBuf,
    /// Declared DDL.
    pub sql: String,
}

/// A one-shot, non-idempotent change script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDefinition {
    /// Stable identifier.
    pub id: String,
    /// File the script was declared in.
    pub path: PathBuf,
    /// Script contents.
    pub sql: String,
    /// SHA-256 of `sql`, hex encoded.
    pub hash: String,
}

/// Either kind of declared definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    /// A resource definition.
    Resource(ResourceDefinition),
    /// A change definition.
    Change(ChangeDefinition),
}

impl ResourceType {
    /// All resource types, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Table,
        Self::View,
        Self::MaterializedView,
        Self::Procedure,
        Self::Function,
        Self::Trigger,
        Self::Event,
    ];

    /// Lowercase identifier used in plan ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::View => "view",
            Self::MaterializedView => "materialized_view",
            Self::Procedure => "procedure",
            Self::Function => "function",
            Self::Trigger => "trigger",
            Self::Event => "event",
        }
    }

    /// Directory pulled definitions of this type are written to.
    #[must_use]
    pub const fn directory_name(self) -> &'static str {
        match self {
            Self::Table => "tables",
            Self::View => "views",
            Self::MaterializedView => "materialized_views",
            Self::Procedure => "procedures",
            Self::Function => "functions",
            Self::Trigger => "triggers",
            Self::Event => "events",
        }
    }

    /// SQL keyword(s) naming this type in a CREATE statement.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::Procedure => "PROCEDURE",
            Self::Function => "FUNCTION",
            Self::Trigger => "TRIGGER",
            Self::Event => "EVENT",
        }
    }

    /// Parses a type from its plan-id form or its SQL keyword, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl ResourceDefinition {
    /// Creates a resource definition with an explicit type and name.
    #[must_use]
    pub fn new(
        resource_type: ResourceType,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            name: name.into(),
            path: path.into(),
            sql: sql.into(),
        }
    }

    /// Creates a resource definition, reading its type and name from the
    /// `CREATE` header of `sql` as `language` would resolve it.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQL does not start with a recognizable CREATE statement.
    pub fn from_sql(
        path: impl Into<PathBuf>,
        sql: impl Into<String>,
        language: DatabaseLanguage,
    ) -> Result<Self> {
        let path = path.into();
        let sql = sql.into();
        let (resource_type, name) = extract_resource_header(&path, &sql, language)?;
        Ok(Self {
            resource_type,
            name,
            path,
            sql,
        })
    }
}

impl ChangeDefinition {
    /// Creates a change definition, hashing its contents.
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let hash = ContentHasher::new().hash_sql(&sql);
        Self {
            id: id.into(),
            path: path.into(),
            sql,
            hash,
        }
    }

    /// Derives a change id from a script path (its file stem).
    #[must_use]
    pub fn id_from_path(path: &Path) -> Option<String> {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
    }
}

impl Definition {
    /// Returns the kind of this definition.
    #[must_use]
    pub const fn kind(&self) -> DefinitionKind {
        match self {
            Self::Resource(_) => DefinitionKind::Resource,
            Self::Change(_) => DefinitionKind::Change,
        }
    }

    /// Returns the file this definition was declared in.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Resource(r) => &r.path,
            Self::Change(c) => &c.path,
        }
    }

    /// Returns the declared SQL.
    #[must_use]
    pub fn sql(&self) -> &str {
        match self {
            Self::Resource(r) => &r.sql,
            Self::Change(c) => &c.sql,
        }
    }
}

impl From<ResourceDefinition> for Definition {
    fn from(resource: ResourceDefinition) -> Self {
        Self::Resource(resource)
    }
}

impl From<ChangeDefinition> for Definition {
    fn from(change: ChangeDefinition) -> Self {
        Self::Change(change)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Resource => "resource",
            Self::Change => "change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resource(r) => write!(f, "{} {} ({})", r.resource_type, r.name, r.path.display()),
            Self::Change(c) => write!(f, "change {} ({})", c.id, c.path.display()),
        }
    }
}
