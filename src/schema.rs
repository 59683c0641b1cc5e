//! Schema Model
//!
//! In-memory representation of the database objects the engine compares:
//! tables (with columns, indexes and constraints) and script objects
//! (views, functions, procedures, triggers).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Categories of schema objects, in the order they are compared and emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Function,
    Procedure,
    Trigger,
}

impl ObjectKind {
    /// Every kind, in fixed category order
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Table,
        ObjectKind::View,
        ObjectKind::Function,
        ObjectKind::Procedure,
        ObjectKind::Trigger,
    ];

    /// SQL keyword used in `CREATE`/`DROP` statements
    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Trigger => "TRIGGER",
        }
    }

    /// Routine bodies contain `;` and must be replayed under a custom delimiter
    pub fn needs_delimiter(self) -> bool {
        matches!(
            self,
            ObjectKind::Function | ObjectKind::Procedure | ObjectKind::Trigger
        )
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.keyword())
    }
}

/// Table representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }
}

/// Column representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Declared type including length/precision, e.g. `varchar(255)`
    pub data_type: String,
    pub nullable: bool,
    /// Raw SQL literal or expression as stored by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// e.g. `auto_increment`, `on update CURRENT_TIMESTAMP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub ordinal_position: u32,
}

impl Column {
    /// Attribute equality, ignoring position
    pub fn same_definition(&self, other: &Column) -> bool {
        self.data_type == other.data_type
            && self.nullable == other.nullable
            && self.default_value == other.default_value
            && self.extra == other.extra
            && self.comment == other.comment
    }
}

/// Index kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Primary,
    Unique,
    Plain,
    Fulltext,
}

/// Index representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
}

/// Named table constraint (primary and unique keys are modelled as indexes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub name: String,
    #[serde(flatten)]
    pub definition: ConstraintDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConstraintDef {
    #[serde(rename_all = "camelCase")]
    ForeignKey {
        columns: Vec<String>,
        referenced_table: String,
        referenced_columns: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_delete: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        on_update: Option<String>,
    },
    Check { expression: String },
}

/// View, function, procedure or trigger, compared by its stored definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub kind: ObjectKind,
    pub name: String,
    pub definition: String,
}

/// Name-keyed collection that remembers listing order
#[derive(Debug, Clone)]
pub struct NamedObjects<T> {
    order: Vec<String>,
    items: HashMap<String, T>,
}

impl<T> NamedObjects<T> {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            items: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: Vec::with_capacity(capacity),
            items: HashMap::with_capacity(capacity),
        }
    }

    /// Insert an object; returns it back if the name is already taken
    pub fn insert(&mut self, name: String, item: T) -> Result<(), T> {
        if self.items.contains_key(&name) {
            return Err(item);
        }
        self.order.push(name.clone());
        self.items.insert(name, item);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names in listing order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Objects in listing order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.order
            .iter()
            .filter_map(|name| self.items.get(name).map(|item| (name.as_str(), item)))
    }
}

impl<T> Default for NamedObjects<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Full schema capture as stored in a snapshot file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub scripts: Vec<Script>,
}

impl SchemaSnapshot {
    /// Content checksum, stable across runs for the same snapshot
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();

        for table in &self.tables {
            hasher.update(format!("T:{}", table.name).as_bytes());
            for col in &table.columns {
                hasher.update(
                    format!(
                        "C:{}:{}:{}:{:?}:{:?}:{:?}:{}",
                        col.name,
                        col.data_type,
                        col.nullable,
                        col.default_value,
                        col.extra,
                        col.comment,
                        col.ordinal_position
                    )
                    .as_bytes(),
                );
            }
            for idx in &table.indexes {
                hasher.update(
                    format!("I:{}:{:?}:{}", idx.name, idx.kind, idx.columns.join(",")).as_bytes(),
                );
            }
            for con in &table.constraints {
                hasher.update(format!("K:{}:{:?}", con.name, con.definition).as_bytes());
            }
            if let Some(comment) = &table.comment {
                hasher.update(format!("M:{}", comment).as_bytes());
            }
        }

        for script in &self.scripts {
            hasher.update(format!("S:{}:{}:", script.kind, script.name).as_bytes());
            hasher.update(script.definition.as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }

    pub fn scripts_of(&self, kind: ObjectKind) -> impl Iterator<Item = &Script> {
        self.scripts.iter().filter(move |s| s.kind == kind)
    }
}
