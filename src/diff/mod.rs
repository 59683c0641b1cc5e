//! Schema Diff Engine
//!
//! Pure comparison of two schema captures into ordered DDL. Nothing in
//! here performs I/O or can fail.

pub mod ddl;
pub mod script;
pub mod table;

pub use script::ScriptDiffer;
pub use table::TableDiffer;

/// What a result does to the destination object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Drop,
    Alter,
}

/// One generated statement for one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub name: String,
    pub change: ChangeKind,
    pub sql: String,
}

impl DiffResult {
    pub fn new(name: impl Into<String>, change: ChangeKind, sql: String) -> Self {
        Self {
            name: name.into(),
            change,
            sql,
        }
    }
}
