//! File-backed live state.
//!
//! A snapshot is a JSON capture of what a server reported for each object
//! (e.g. `SHOW CREATE TABLE` or `pg_get_functiondef` output) and the rows of
//! its change log:
//!
//! ```json
//! {
//!   "resources": [{ "type": "table", "name": "user", "ddl": "CREATE TABLE ..." }],
//!   "change_log": [{ "id": "init_user", "hash": "9f2c..." }]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::definition::ResourceType;
use crate::error::{LookupError, Result};

use super::source::{ChangeLogEntry, DatabaseConnection, LiveResource};

/// Serialized form of a live-state capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    /// Objects present on the server.
    #[serde(default)]
    pub resources: Vec<SnapshotResource>,
    /// Applied change scripts.
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
}

/// One captured object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResource {
    /// Object type.
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Object name.
    pub name: String,
    /// DDL reported by the server.
    pub ddl: String,
}

/// A [`DatabaseConnection`] answering from a captured snapshot.
#[derive(Debug, Default)]
pub struct SnapshotConnection {
    /// Snapshot file, if loaded from disk.
    path: Option<PathBuf>,
    resources: HashMap<(ResourceType, String), String>,
    change_log: HashMap<String, ChangeLogEntry>,
}

impl SnapshotConnection {
    /// Creates a connection serving `snapshot`.
    ///
    /// When an object or change id appears more than once, the last entry wins.
    #[must_use]
    pub fn from_snapshot(snapshot: LiveSnapshot) -> Self {
        let resources = snapshot
            .resources
            .into_iter()
            .map(|r| ((r.resource_type, r.name), r.ddl))
            .collect();
        let change_log = snapshot
            .change_log
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect();

        Self {
            path: None,
            resources,
            change_log,
        }
    }

    /// Loads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading live-state snapshot from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| LookupError::Snapshot {
            path: path.to_path_buf(),
            message: format!("Failed to read snapshot file: {e}"),
        })?;

        let snapshot: LiveSnapshot = serde_json::from_str(&content).map_err(|e| LookupError::Snapshot {
            path: path.to_path_buf(),
            message: format!("Failed to parse snapshot file: {e}"),
        })?;

        let mut connection = Self::from_snapshot(snapshot);
        connection.path = Some(path.to_path_buf());
        debug!(
            "Snapshot holds {} objects and {} change-log entries",
            connection.resource_count(),
            connection.change_count()
        );
        Ok(connection)
    }

    /// Path of the snapshot file, if loaded from disk.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of captured objects.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of change-log entries.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.change_log.len()
    }
}

#[async_trait]
impl DatabaseConnection for SnapshotConnection {
    async fn query_live_definition(&self, resource_type: ResourceType, name: &str) -> Result<Option<String>> {
        let ddl = self.resources.get(&(resource_type, name.to_string())).cloned();
        debug!("Snapshot lookup {resource_type} {name}: {}", if ddl.is_some() { "found" } else { "absent" });
        Ok(ddl)
    }

    async fn query_change_log_entry(&self, id: &str) -> Result<Option<ChangeLogEntry>> {
        Ok(self.change_log.get(id).cloned())
    }

    async fn list_live_resources(&self) -> Result<Vec<LiveResource>> {
        let mut resources: Vec<LiveResource> = self
            .resources
            .keys()
            .map(|(resource_type, name)| LiveResource::new(*resource_type, name.clone()))
            .collect();
        resources.sort();
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
  "resources": [
    { "type": "table", "name": "user", "ddl": "CREATE TABLE `user` (`id` int NOT NULL)" },
    { "type": "materialized_view", "name": "daily_totals", "ddl": "CREATE MATERIALIZED VIEW daily_totals AS SELECT 1" }
  ],
  "change_log": [
    { "id": "init_user", "hash": "abc123" },
    { "id": "seed_roles", "hash": "def456", "content": "INSERT INTO roles VALUES (1);" }
  ]
}"#;

    #[tokio::test]
    async fn test_load_snapshot_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SNAPSHOT.as_bytes()).expect("write snapshot");

        let connection = SnapshotConnection::load(file.path()).await.expect("snapshot should load");
        assert_eq!(connection.resource_count(), 2);
        assert_eq!(connection.change_count(), 2);
        assert_eq!(connection.path(), Some(file.path()));

        let ddl = connection
            .query_live_definition(ResourceType::Table, "user")
            .await
            .expect("lookup should succeed");
        assert!(ddl.is_some_and(|ddl| ddl.starts_with("CREATE TABLE")));

        let missing = connection
            .query_live_definition(ResourceType::View, "user")
            .await
            .expect("lookup should succeed");
        assert!(missing.is_none());

        let entry = connection
            .query_change_log_entry("seed_roles")
            .await
            .expect("lookup should succeed")
            .expect("entry should exist");
        assert_eq!(entry.content.as_deref(), Some("INSERT INTO roles VALUES (1);"));

        let listed = connection.list_live_resources().await.expect("listing should succeed");
        assert_eq!(
            listed,
            vec![
                LiveResource::new(ResourceType::Table, "user"),
                LiveResource::new(ResourceType::MaterializedView, "daily_totals"),
            ]
        );
    }

    #[tokio::test]
    async fn test_boxed_connection() {
        let snapshot = LiveSnapshot {
            resources: Vec::new(),
            change_log: vec![ChangeLogEntry {
                id: String::from("init"),
                hash: String::from("abc"),
                content: None,
            }],
        };
        let connection: Box<dyn DatabaseConnection> = Box::new(SnapshotConnection::from_snapshot(snapshot));

        let entry = connection.query_change_log_entry("init").await.expect("lookup should succeed");
        assert_eq!(entry.map(|e| e.hash), Some(String::from("abc")));
        assert!(connection.query_change_log_entry("other").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn test_missing_snapshot_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = SnapshotConnection::load(dir.path().join("missing.json"))
            .await
            .expect_err("missing file should fail");
        assert!(err.is_lookup());
    }

    #[tokio::test]
    async fn test_invalid_snapshot_type() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"{"resources": [{"type": "sequence", "name": "s", "ddl": ""}]}"#)
            .expect("write snapshot");
        let err = SnapshotConnection::load(file.path()).await.expect_err("unknown type should fail");
        assert!(err.to_string().contains("Failed to parse snapshot file"));
    }
}
