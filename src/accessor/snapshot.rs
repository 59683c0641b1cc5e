//! Snapshot Accessor
//!
//! Serves schema metadata from a JSON snapshot file instead of a live server.

use super::{Accessor, NameFilter};
use crate::error::{AccessError, SyncError, SyncResult};
use crate::schema::{NamedObjects, ObjectKind, SchemaSnapshot, Script, Table};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

pub struct SnapshotAccessor {
    label: String,
    snapshot: SchemaSnapshot,
    tables: NamedObjects<usize>,
}

impl SnapshotAccessor {
    /// Wrap an in-memory snapshot
    pub fn new(label: impl Into<String>, snapshot: SchemaSnapshot) -> SyncResult<Self> {
        let label = label.into();
        let mut tables = NamedObjects::with_capacity(snapshot.tables.len());
        for (i, table) in snapshot.tables.iter().enumerate() {
            if tables.insert(table.name.clone(), i).is_err() {
                return Err(SyncError::Snapshot {
                    path: label,
                    message: format!("table {} appears more than once", table.name),
                });
            }
        }

        Ok(Self {
            label,
            snapshot,
            tables,
        })
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: &Path) -> SyncResult<Self> {
        let label = path.display().to_string();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SyncError::Snapshot {
                path: label.clone(),
                message: e.to_string(),
            })?;

        let snapshot: SchemaSnapshot =
            serde_json::from_str(&raw).map_err(|e| SyncError::Snapshot {
                path: label.clone(),
                message: e.to_string(),
            })?;

        info!(
            "Loaded snapshot {}: {} tables, {} scripts, checksum {}",
            label,
            snapshot.tables.len(),
            snapshot.scripts.len(),
            snapshot.checksum()
        );

        Self::new(label, snapshot)
    }

    pub fn snapshot(&self) -> &SchemaSnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl Accessor for SnapshotAccessor {
    async fn list_objects(
        &self,
        kind: ObjectKind,
        filter: &NameFilter,
    ) -> Result<Vec<String>, AccessError> {
        let names: Vec<String> = match kind {
            ObjectKind::Table => self
                .tables
                .names()
                .filter(|n| filter.matches(n))
                .map(str::to_string)
                .collect(),
            _ => self
                .snapshot
                .scripts_of(kind)
                .filter(|s| filter.matches(&s.name))
                .map(|s| s.name.clone())
                .collect(),
        };

        debug!("{}: listed {} {} objects", self.label, names.len(), kind);
        Ok(names)
    }

    async fn get_table_detail(&self, name: &str) -> Result<Table, AccessError> {
        self.tables
            .get(name)
            .and_then(|&i| self.snapshot.tables.get(i))
            .cloned()
            .ok_or_else(|| AccessError::NotFound(format!("table {} in {}", name, self.label)))
    }

    async fn list_scripts(
        &self,
        kind: ObjectKind,
        filter: &NameFilter,
    ) -> Result<Vec<Script>, AccessError> {
        if kind == ObjectKind::Table {
            return Err(AccessError::Fatal("tables are not script objects".to_string()));
        }

        Ok(self
            .snapshot
            .scripts_of(kind)
            .filter(|s| filter.matches(&s.name))
            .cloned()
            .collect())
    }
}
