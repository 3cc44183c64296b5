//! Live-state collaborator trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::definition::ResourceType;
use crate::error::Result;

/// A change-log record of an applied change script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Change id.
    pub id: String,
    /// Hash of the script contents when it was applied.
    pub hash: String,
    /// Script contents when it was applied, if the change log kept them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// An object present on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LiveResource {
    /// Object type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Object name.
    pub name: String,
}

impl LiveResource {
    /// Creates a live resource.
    #[must_use]
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for LiveResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.resource_type, self.name)
    }
}

/// Read-only queries against the live database.
///
/// Implementations must be safe to call concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Returns the DDL the server reports for an object, or `None` if the
    /// object does not exist.
    async fn query_live_definition(&self, resource_type: ResourceType, name: &str) -> Result<Option<String>>;

    /// Returns the change-log entry recorded for `id`, or `None` if the
    /// change was never applied.
    async fn query_change_log_entry(&self, id: &str) -> Result<Option<ChangeLogEntry>>;

    /// Lists every object of a managed type present on the server.
    async fn list_live_resources(&self) -> Result<Vec<LiveResource>>;
}

#[async_trait]
impl DatabaseConnection for Box<dyn DatabaseConnection> {
    async fn query_live_definition(&self, resource_type: ResourceType, name: &str) -> Result<Option<String>> {
        (**self).query_live_definition(resource_type, name).await
    }

    async fn query_change_log_entry(&self, id: &str) -> Result<Option<ChangeLogEntry>> {
        (**self).query_change_log_entry(id).await
    }

    async fn list_live_resources(&self) -> Result<Vec<LiveResource>> {
        (**self).list_live_resources().await
    }
}
