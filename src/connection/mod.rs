//! Access to the live state of the managed database.
//!
//! Planning only reads: the live definition of each declared resource, the
//! change-log entry of each declared change and the list of objects present
//! on the server. Executing statements is out of scope.

mod snapshot;
mod source;

pub use snapshot::{LiveSnapshot, SnapshotConnection, SnapshotResource};
pub use source::{ChangeLogEntry, DatabaseConnection, LiveResource};

#[cfg(test)]
pub use source::MockDatabaseConnection;
