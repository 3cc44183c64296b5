//! Discovery of declared definitions.
//!
//! The control file lists definitions in order. An entry is either a SQL
//! file (resource or change) or the path of a nested list file holding more
//! entries. Relative paths resolve against the file that declares them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dialect::DatabaseLanguage;
use crate::error::{ConfigError, Result};

use super::types::{ChangeDefinition, Definition, ResourceDefinition};

/// One entry of a definition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefinitionEntry {
    /// Path of a nested definition list file.
    Include(PathBuf),
    /// A single SQL file.
    File(DefinitionFile),
}

/// A SQL file entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DefinitionFile {
    /// Resource definition; type and name are read from its CREATE header.
    Resource {
        /// SQL file path.
        path: PathBuf,
    },
    /// Change script.
    Change {
        /// Change id (defaults to the file stem).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// SQL file path.
        path: PathBuf,
    },
}

/// Loads definition lists and the SQL files they reference.
#[derive(Debug)]
pub struct DefinitionLoader {
    /// Language resource names are resolved in.
    language: DatabaseLanguage,
    /// List files currently being expanded, outermost first.
    stack: Vec<PathBuf>,
}

impl DefinitionLoader {
    /// Creates a new loader for definitions written in `language`.
    #[must_use]
    pub const fn new(language: DatabaseLanguage) -> Self {
        Self {
            language,
            stack: Vec::new(),
        }
    }

    /// Loads `entries`, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is missing or unreadable, a list file is
    /// malformed, list files include each other, or a resource file has no
    /// recognizable CREATE header.
    pub fn load(&mut self, entries: &[DefinitionEntry], base_dir: &Path) -> Result<Vec<Definition>> {
        let mut definitions = Vec::new();
        for entry in entries {
            match entry {
                DefinitionEntry::Include(path) => {
                    let nested = self.load_list_file(&base_dir.join(path))?;
                    definitions.extend(nested);
                }
                DefinitionEntry::File(file) => definitions.push(self.load_file(file, base_dir)?),
            }
        }
        Ok(definitions)
    }

    /// Loads a nested list file.
    ///
    /// # Errors
    ///
    /// See [`DefinitionLoader::load`].
    pub fn load_list_file(&mut self, path: &Path) -> Result<Vec<Definition>> {
        let canonical = path.canonicalize().map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;

        if let Some(start) = self.stack.iter().position(|p| *p == canonical) {
            let cycle = self.stack[start..]
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(ConfigError::CircularInclude { cycle }.into());
        }

        debug!("Loading definition list: {}", path.display());
        let content = std::fs::read_to_string(&canonical)?;
        let entries: Vec<DefinitionEntry> = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::parse(format!("Invalid definition list: {e}"), path.display().to_string()))?;

        let base_dir = canonical.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        self.stack.push(canonical);
        let result = self.load(&entries, &base_dir);
        self.stack.pop();

        let definitions = result?;
        info!("Loaded {} definitions from {}", definitions.len(), path.display());
        Ok(definitions)
    }

    fn load_file(&self, file: &DefinitionFile, base_dir: &Path) -> Result<Definition> {
        match file {
            DefinitionFile::Resource { path } => {
                let path = base_dir.join(path);
                let sql = read_sql(&path)?;
                let resource = ResourceDefinition::from_sql(&path, sql, self.language)?;
                debug!("Resource {} {} from {}", resource.resource_type, resource.name, path.display());
                Ok(resource.into())
            }
            DefinitionFile::Change { id, path } => {
                let path = base_dir.join(path);
                let id = match id {
                    Some(id) => id.clone(),
                    None => ChangeDefinition::id_from_path(&path).ok_or_else(|| {
                        ConfigError::validation(
                            format!("cannot derive a change id from {}", path.display()),
                            "definitions",
                        )
                    })?,
                };
                let sql = read_sql(&path)?;
                debug!("Change {id} from {}", path.display());
                Ok(ChangeDefinition::new(id, path, sql).into())
            }
        }
    }
}

fn read_sql(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(std::fs::read_to_string(path)?)
}
