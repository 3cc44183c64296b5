//! Status derivation.
//!
//! A status is computed on every run from exactly one live-state lookup per
//! definition. It is never stored on the definition.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::ContentHasher;
use crate::connection::{ChangeLogEntry, DatabaseConnection};
use crate::definition::{ChangeDefinition, DefinitionKind, ResourceDefinition};
use crate::dialect::DialectAdapter;
use crate::error::Result;

/// Status of a resource definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    /// The object does not exist.
    NotYetApplied,
    /// The live object matches the declaration.
    UpToDate,
    /// The live object exists but differs.
    OutOfSync,
}

/// Status of a change definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    /// The change log has no entry for the id.
    NotYetApplied,
    /// The recorded hash matches the current script.
    UpToDate,
    /// The script changed after it was applied.
    Drifted,
}

/// Status of any definition.
///
/// Serializes to the bare status name, e.g. `"OUT_OF_SYNC"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum DefinitionStatus {
    /// Resource status.
    Resource(ResourceStatus),
    /// Change status.
    Change(ChangeStatus),
}

impl ResourceStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotYetApplied => "NOT_YET_APPLIED",
            Self::UpToDate => "UP_TO_DATE",
            Self::OutOfSync => "OUT_OF_SYNC",
        }
    }
}

impl ChangeStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotYetApplied => "NOT_YET_APPLIED",
            Self::UpToDate => "UP_TO_DATE",
            Self::Drifted => "DRIFTED",
        }
    }
}

impl DefinitionStatus {
    /// Kind of definition this status belongs to.
    #[must_use]
    pub const fn kind(self) -> DefinitionKind {
        match self {
            Self::Resource(_) => DefinitionKind::Resource,
            Self::Change(_) => DefinitionKind::Change,
        }
    }

    /// Returns true for `OUT_OF_SYNC` and `DRIFTED`.
    #[must_use]
    pub const fn is_mismatch(self) -> bool {
        matches!(
            self,
            Self::Resource(ResourceStatus::OutOfSync) | Self::Change(ChangeStatus::Drifted)
        )
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resource(status) => status.as_str(),
            Self::Change(status) => status.as_str(),
        }
    }
}

impl From<ResourceStatus> for DefinitionStatus {
    fn from(status: ResourceStatus) -> Self {
        Self::Resource(status)
    }
}

impl From<ChangeStatus> for DefinitionStatus {
    fn from(status: ChangeStatus) -> Self {
        Self::Change(status)
    }
}

impl std::fmt::Display for DefinitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a resource definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResolution {
    /// Derived status.
    pub status: ResourceStatus,
    /// Normalized declared DDL.
    pub declared: String,
    /// Normalized live DDL, if the object exists.
    pub live: Option<String>,
}

/// Outcome of resolving a change definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeResolution {
    /// Derived status.
    pub status: ChangeStatus,
    /// Change-log entry, if the change was applied.
    pub recorded: Option<ChangeLogEntry>,
}

/// Derives definition statuses against the live state.
#[derive(Clone)]
pub struct StatusResolver {
    adapter: Arc<dyn DialectAdapter>,
    connection: Arc<dyn DatabaseConnection>,
}

impl StatusResolver {
    /// Creates a resolver normalizing with `adapter` and looking up through `connection`.
    #[must_use]
    pub fn new(adapter: Arc<dyn DialectAdapter>, connection: Arc<dyn DatabaseConnection>) -> Self {
        Self { adapter, connection }
    }

    /// Resolves the status of a resource definition.
    ///
    /// The declared SQL is normalized before the lookup, so an unsupported
    /// resource type never reaches the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource type is unsupported by the dialect or
    /// the live-state lookup fails.
    pub async fn resolve_resource(&self, resource: &ResourceDefinition) -> Result<ResourceResolution> {
        let declared = self.adapter.normalize(resource.resource_type, &resource.sql)?;

        let Some(raw_live) = self
            .connection
            .query_live_definition(resource.resource_type, &resource.name)
            .await?
        else {
            debug!("{} {} does not exist", resource.resource_type, resource.name);
            return Ok(ResourceResolution {
                status: ResourceStatus::NotYetApplied,
                declared,
                live: None,
            });
        };

        let live = self.adapter.normalize(resource.resource_type, &raw_live)?;
        let status = if live == declared {
            ResourceStatus::UpToDate
        } else {
            ResourceStatus::OutOfSync
        };
        debug!("{} {} is {}", resource.resource_type, resource.name, status.as_str());

        Ok(ResourceResolution {
            status,
            declared,
            live: Some(live),
        })
    }

    /// Resolves the status of a change definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the change-log lookup fails.
    pub async fn resolve_change(&self, change: &ChangeDefinition) -> Result<ChangeResolution> {
        let recorded = self.connection.query_change_log_entry(&change.id).await?;

        let status = match &recorded {
            None => ChangeStatus::NotYetApplied,
            Some(entry) if ContentHasher::hashes_match(&entry.hash, &change.hash) => ChangeStatus::UpToDate,
            Some(_) => ChangeStatus::Drifted,
        };
        debug!("change {} is {}", change.id, status.as_str());

        Ok(ChangeResolution { status, recorded })
    }
}

impl std::fmt::Debug for StatusResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusResolver")
            .field("adapter", &self.adapter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockDatabaseConnection;
    use crate::definition::ResourceType;
    use crate::dialect::{DatabaseLanguage, DialectSettings};

    fn resolver(language: DatabaseLanguage, dialect: &str, mock: MockDatabaseConnection) -> StatusResolver {
        let adapter = language.adapter(dialect.parse().expect("valid version"), DialectSettings::default());
        StatusResolver::new(adapter, Arc::new(mock))
    }

    fn table(sql: &str) -> ResourceDefinition {
        ResourceDefinition::new(ResourceType::Table, "user", "tables/user.sql", sql)
    }

    #[tokio::test]
    async fn test_resource_absent() {
        let mut mock = MockDatabaseConnection::new();
        mock.expect_query_live_definition()
            .withf(|resource_type, name| *resource_type == ResourceType::Table && name == "user")
            .times(1)
            .returning(|_, _| Ok(None));

        let resolution = resolver(DatabaseLanguage::Mysql, "8.0", mock)
            .resolve_resource(&table("CREATE TABLE user (id INT)"))
            .await
            .expect("resolution should succeed");
        assert_eq!(resolution.status, ResourceStatus::NotYetApplied);
        assert!(resolution.live.is_none());
    }

    #[tokio::test]
    async fn test_resource_up_to_date_and_out_of_sync() {
        let mut mock = MockDatabaseConnection::new();
        mock.expect_query_live_definition()
            .times(2)
            .returning(|_, _| Ok(Some(String::from("CREATE TABLE `user` (\n  `id` int NOT NULL\n) ENGINE=InnoDB"))));
        let resolver = resolver(DatabaseLanguage::Mysql, "8.0", mock);

        let same = resolver
            .resolve_resource(&table("create table user ( id INT not null );"))
            .await
            .expect("resolution should succeed");
        assert_eq!(same.status, ResourceStatus::UpToDate);
        assert_eq!(same.live.as_deref(), Some(same.declared.as_str()));

        let changed = resolver
            .resolve_resource(&table("CREATE TABLE user (id BIGINT NOT NULL)"))
            .await
            .expect("resolution should succeed");
        assert_eq!(changed.status, ResourceStatus::OutOfSync);
        assert_ne!(changed.live.as_deref(), Some(changed.declared.as_str()));
    }

    #[tokio::test]
    async fn test_unsupported_type_skips_lookup() {
        let mut mock = MockDatabaseConnection::new();
        mock.expect_query_live_definition().never();

        let matview = ResourceDefinition::new(
            ResourceType::MaterializedView,
            "totals",
            "totals.sql",
            "CREATE MATERIALIZED VIEW totals AS SELECT 1",
        );
        let err = resolver(DatabaseLanguage::Mysql, "8.0", mock)
            .resolve_resource(&matview)
            .await
            .expect_err("materialized views are unsupported on mysql");
        assert!(err.is_unsupported_dialect());
    }

    #[tokio::test]
    async fn test_change_statuses() {
        let change = ChangeDefinition::new("seed", "seed.sql", "INSERT INTO roles VALUES (1);");
        let current_hash = change.hash.clone();

        let mut mock = MockDatabaseConnection::new();
        mock.expect_query_change_log_entry()
            .times(3)
            .returning({
                let mut calls = 0;
                move |id| {
                    calls += 1;
                    Ok(match calls {
                        1 => None,
                        2 => Some(ChangeLogEntry {
                            id: id.to_string(),
                            hash: current_hash.clone(),
                            content: None,
                        }),
                        _ => Some(ChangeLogEntry {
                            id: id.to_string(),
                            hash: String::from("0000"),
                            content: None,
                        }),
                    })
                }
            });
        let resolver = resolver(DatabaseLanguage::Postgres, "14", mock);

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let resolution = resolver.resolve_change(&change).await.expect("resolution should succeed");
            statuses.push(resolution.status);
        }
        assert_eq!(
            statuses,
            vec![ChangeStatus::NotYetApplied, ChangeStatus::UpToDate, ChangeStatus::Drifted]
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let mut mock = MockDatabaseConnection::new();
        mock.expect_query_change_log_entry()
            .returning(|id| Err(crate::error::LookupError::change_log(id, "connection reset").into()));

        let err = resolver(DatabaseLanguage::Postgres, "14", mock)
            .resolve_change(&ChangeDefinition::new("seed", "seed.sql", "SELECT 1"))
            .await
            .expect_err("lookup failure should propagate");
        assert!(err.is_lookup());
    }

    #[test]
    fn test_status_serialization() {
        let status = DefinitionStatus::from(ResourceStatus::OutOfSync);
        assert_eq!(serde_json::to_string(&status).expect("serializes"), "\"OUT_OF_SYNC\"");
        assert_eq!(DefinitionStatus::from(ChangeStatus::Drifted).to_string(), "DRIFTED");
        assert!(DefinitionStatus::from(ChangeStatus::Drifted).is_mismatch());
        assert!(!DefinitionStatus::from(ResourceStatus::NotYetApplied).is_mismatch());
    }
}
