//! Content hashing for change scripts and definition sets.
//!
//! Change scripts are tracked by the SHA-256 of their contents. The same
//! hasher fingerprints the whole declared definition set so that two plan
//! reports can be told apart without diffing them.

use sha2::{Digest, Sha256};

use crate::definition::Definition;

/// Hasher for change contents and definition sets.
#[derive(Debug, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Creates a new content hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hex-encoded SHA-256 of a SQL script.
    #[must_use]
    pub fn hash_sql(&self, sql: &str) -> String {
        hex::encode(Sha256::digest(sql.as_bytes()))
    }

    /// Computes a hash of an ordered definition set.
    ///
    /// The hash changes when a definition is added, removed, reordered, or
    /// when its identity or contents change.
    #[must_use]
    pub fn hash_definitions(&self, definitions: &[Definition]) -> String {
        let mut hasher = Sha256::new();

        for definition in definitions {
            match definition {
                Definition::Resource(resource) => {
                    hasher.update(b"resource\0");
                    hasher.update(resource.resource_type.as_str().as_bytes());
                    hasher.update(b"\0");
                    hasher.update(resource.name.as_bytes());
                    hasher.update(b"\0");
                    hasher.update(self.hash_sql(&resource.sql).as_bytes());
                }
                Definition::Change(change) => {
                    hasher.update(b"change\0");
                    hasher.update(change.id.as_bytes());
                    hasher.update(b"\0");
                    hasher.update(change.hash.as_bytes());
                }
            }
            hasher.update(b"\n");
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ChangeDefinition, ResourceDefinition, ResourceType};

    #[test]
    fn test_sql_hash_known_value() {
        let hasher = ContentHasher::new();
        assert_eq!(
            hasher.hash_sql(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_definition_set_hash_is_order_sensitive() {
        let hasher = ContentHasher::new();
        let table: Definition =
            ResourceDefinition::new(ResourceType::Table, "users", "users.sql", "CREATE TABLE users (id INT)")
                .into();
        let change: Definition = ChangeDefinition::new("seed", "seed.sql", "INSERT INTO users VALUES (1)").into();

        let forward = hasher.hash_definitions(&[table.clone(), change.clone()]);
        let reverse = hasher.hash_definitions(&[change, table.clone()]);

        assert_ne!(forward, reverse);
        assert_eq!(hasher.hash_definitions(&[table.clone()]), hasher.hash_definitions(&[table]));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ContentHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");

        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ContentHasher::hashes_match("abc123", "abc123"));
        assert!(!ContentHasher::hashes_match("abc123", "abc124"));
        assert!(!ContentHasher::hashes_match("abc123", "abc12"));
    }
}
