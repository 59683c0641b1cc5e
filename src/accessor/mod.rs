//! Metadata Accessor
//!
//! The boundary between the comparison engine and a database. An accessor
//! lists objects per kind and returns per-object detail for one database.

pub mod filter;
pub mod snapshot;

pub use filter::NameFilter;
pub use snapshot::SnapshotAccessor;

use crate::error::AccessError;
use crate::schema::{ObjectKind, Script, Table};
use async_trait::async_trait;

/// Read access to one database's schema metadata
#[async_trait]
pub trait Accessor: Send + Sync {
    /// Names of the objects of `kind` that pass `filter`, in listing order
    async fn list_objects(
        &self,
        kind: ObjectKind,
        filter: &NameFilter,
    ) -> Result<Vec<String>, AccessError>;

    /// Full table metadata for a listed table
    async fn get_table_detail(&self, name: &str) -> Result<Table, AccessError>;

    /// Script objects of `kind` (definition included) that pass `filter`
    async fn list_scripts(
        &self,
        kind: ObjectKind,
        filter: &NameFilter,
    ) -> Result<Vec<Script>, AccessError>;
}
