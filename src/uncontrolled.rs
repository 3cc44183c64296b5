//! Live objects no definition declares.
//!
//! A schema under control can still hold objects created by hand. They are
//! listed in the plan report so they can be noticed, and `pull` writes their
//! normalized DDL to disk along with a definition list file, ready to be
//! included from the control file.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::connection::{DatabaseConnection, LiveResource};
use crate::definition::{Definition, DefinitionEntry, DefinitionFile, ResourceType};
use crate::dialect::DialectAdapter;
use crate::error::{ControlError, Result};

/// Name of the definition list file written next to pulled definitions.
pub const PULLED_LIST_FILE: &str = "definitions.yml";

/// One pulled object and the file its DDL was written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PulledResource {
    /// The pulled object.
    #[serde(flatten)]
    pub resource: LiveResource,
    /// Written file, relative to the pull directory.
    pub path: PathBuf,
}

/// Outcome of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Directory definitions were written to.
    pub directory: PathBuf,
    /// Definition list file, when anything was pulled.
    pub list_file: Option<PathBuf>,
    /// Pulled objects, sorted by type then name.
    pub pulled: Vec<PulledResource>,
}

/// Finds live objects of supported types that no resource definition declares.
#[derive(Clone)]
pub struct UncontrolledFinder {
    connection: Arc<dyn DatabaseConnection>,
    adapter: Arc<dyn DialectAdapter>,
    declared: HashSet<(ResourceType, String)>,
}

impl UncontrolledFinder {
    /// Creates a finder for `config`.
    #[must_use]
    pub fn from_config(config: &ControlConfig) -> Self {
        let declared = config
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Resource(resource) => Some((resource.resource_type, resource.name.clone())),
                Definition::Change(_) => None,
            })
            .collect();

        Self {
            connection: Arc::clone(&config.connection),
            adapter: config.adapter(),
            declared,
        }
    }

    /// Returns true if `resource` is not declared and its type is managed by the dialect.
    #[must_use]
    pub fn is_uncontrolled(&self, resource: &LiveResource) -> bool {
        self.adapter.supports(resource.resource_type)
            && !self
                .declared
                .contains(&(resource.resource_type, resource.name.clone()))
    }

    /// Lists uncontrolled live objects, sorted by type then name.
    ///
    /// # Errors
    ///
    /// Returns an error if the live objects cannot be listed.
    pub async fn find(&self) -> Result<Vec<LiveResource>> {
        let mut found: Vec<LiveResource> = self
            .connection
            .list_live_resources()
            .await?
            .into_iter()
            .filter(|resource| self.is_uncontrolled(resource))
            .collect();
        found.sort();
        found.dedup();
        debug!("{} uncontrolled objects", found.len());
        Ok(found)
    }

    /// Writes the normalized DDL of every uncontrolled object under `dir`.
    ///
    /// Each object lands in `<dir>/<type directory>/<name>.sql`, and
    /// `<dir>/definitions.yml` lists them as resource entries. Objects that
    /// disappear between listing and lookup are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup, a normalization or a write fails.
    pub async fn pull(&self, dir: &Path, parallelism: usize) -> Result<PullReport> {
        let found = self.find().await?;
        info!("Pulling {} uncontrolled objects into: {}", found.len(), dir.display());

        let outcomes: Vec<Result<Option<PulledResource>>> = stream::iter(found)
            .map(|resource| self.pull_one(dir, resource))
            .buffered(parallelism.max(1))
            .collect()
            .await;

        let mut pulled = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            if let Some(resource) = outcome? {
                pulled.push(resource);
            }
        }

        let list_file = if pulled.is_empty() {
            None
        } else {
            Some(write_list_file(dir, &pulled).await?)
        };

        Ok(PullReport {
            directory: dir.to_path_buf(),
            list_file,
            pulled,
        })
    }

    async fn pull_one(&self, dir: &Path, resource: LiveResource) -> Result<Option<PulledResource>> {
        let Some(ddl) = self
            .connection
            .query_live_definition(resource.resource_type, &resource.name)
            .await?
        else {
            warn!("{resource} disappeared before it could be pulled");
            return Ok(None);
        };

        let normalized = self.adapter.normalize(resource.resource_type, &ddl)?;
        let path = Path::new(resource.resource_type.directory_name()).join(format!("{}.sql", file_stem(&resource.name)));
        let target = dir.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, format!("{normalized};\n")).await?;
        debug!("Pulled {resource} to {}", target.display());

        Ok(Some(PulledResource { resource, path }))
    }
}

impl std::fmt::Debug for UncontrolledFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UncontrolledFinder")
            .field("adapter", &self.adapter)
            .field("declared", &self.declared.len())
            .finish_non_exhaustive()
    }
}

async fn write_list_file(dir: &Path, pulled: &[PulledResource]) -> Result<PathBuf> {
    let entries: Vec<DefinitionEntry> = pulled
        .iter()
        .map(|p| DefinitionEntry::File(DefinitionFile::Resource { path: p.path.clone() }))
        .collect();
    let yaml = serde_yaml::to_string(&entries)
        .map_err(|e| ControlError::internal(format!("Failed to serialize definition list: {e}")))?;

    let path = dir.join(PULLED_LIST_FILE);
    fs::create_dir_all(dir).await?;
    fs::write(&path, yaml).await?;
    info!("Wrote definition list: {}", path.display());
    Ok(path)
}

/// File stem for an object name; path separators and control characters become `_`.
fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other if other.is_control() => '_',
            other => other,
        })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => format!("_{stem}"),
        _ => stem,
    }
}
