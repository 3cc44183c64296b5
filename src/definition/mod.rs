//! Declared definitions: resources, changes, and how they are discovered.

mod extract;
mod loader;
mod types;

pub use extract::extract_resource_header;
pub use loader::{DefinitionEntry, DefinitionFile, DefinitionLoader};
pub use types::{ChangeDefinition, Definition, DefinitionKind, ResourceDefinition, ResourceType};
