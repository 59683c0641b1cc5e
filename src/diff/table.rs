//! Table Differ
//!
//! Structural comparison of tables: columns, indexes, constraints and the
//! table comment. All changes to one table are merged into a single
//! `ALTER TABLE`.

use super::ddl::Ddl;
use super::{ChangeKind, DiffResult};
use crate::schema::{Column, NamedObjects, Table};
use std::collections::{HashMap, HashSet};

/// Clauses for one table, bucketed by the order they must be applied in
#[derive(Debug, Default)]
struct AlterClauses {
    drop_constraints: Vec<String>,
    drop_indexes: Vec<String>,
    drop_columns: Vec<String>,
    modify_columns: Vec<String>,
    add_columns: Vec<String>,
    add_indexes: Vec<String>,
    add_constraints: Vec<String>,
    options: Vec<String>,
}

impl AlterClauses {
    fn into_ordered(self) -> Vec<String> {
        let mut clauses = self.drop_constraints;
        clauses.extend(self.drop_indexes);
        clauses.extend(self.drop_columns);
        clauses.extend(self.modify_columns);
        clauses.extend(self.add_columns);
        clauses.extend(self.add_indexes);
        clauses.extend(self.add_constraints);
        clauses.extend(self.options);
        clauses
    }
}

pub struct TableDiffer;

impl TableDiffer {
    /// Compare two table sets. Creates and alters follow source listing
    /// order, drops follow destination listing order.
    pub fn diff(src: &NamedObjects<Table>, dst: &NamedObjects<Table>) -> Vec<DiffResult> {
        let mut results = Vec::new();

        for (name, table) in src.iter() {
            match dst.get(name) {
                None => results.push(DiffResult::new(
                    name,
                    ChangeKind::Create,
                    Ddl::create_table(table),
                )),
                Some(existing) => {
                    if let Some(sql) = Self::diff_table(table, existing) {
                        results.push(DiffResult::new(name, ChangeKind::Alter, sql));
                    }
                }
            }
        }

        for name in dst.names() {
            if !src.contains(name) {
                results.push(DiffResult::new(name, ChangeKind::Drop, Ddl::drop_table(name)));
            }
        }

        results
    }

    /// `ALTER TABLE` turning `dst` into `src`, or `None` when they already agree
    pub fn diff_table(src: &Table, dst: &Table) -> Option<String> {
        let mut clauses = AlterClauses::default();

        Self::diff_columns(src, dst, &mut clauses);
        Self::diff_indexes(src, dst, &mut clauses);
        Self::diff_constraints(src, dst, &mut clauses);

        if src.comment != dst.comment {
            let comment = src.comment.as_deref().unwrap_or("");
            clauses
                .options
                .push(format!("COMMENT = {}", Ddl::string_literal(comment)));
        }

        let ordered = clauses.into_ordered();
        if ordered.is_empty() {
            None
        } else {
            Some(Ddl::alter_table(&src.name, &ordered))
        }
    }

    fn diff_columns(src: &Table, dst: &Table, clauses: &mut AlterClauses) {
        let src_cols = Self::in_ordinal_order(&src.columns);
        let dst_cols = Self::in_ordinal_order(&dst.columns);

        let src_names: HashSet<&str> = src_cols.iter().map(|c| c.name.as_str()).collect();
        let dst_names: HashSet<&str> = dst_cols.iter().map(|c| c.name.as_str()).collect();

        // Relative position among the columns both sides share, so that an
        // added or dropped column does not shift everything after it
        let src_rank = Self::shared_rank(&src_cols, &dst_names);
        let dst_rank = Self::shared_rank(&dst_cols, &src_names);

        for col in &dst_cols {
            if !src_names.contains(col.name.as_str()) {
                clauses
                    .drop_columns
                    .push(format!("DROP COLUMN {}", Ddl::ident(&col.name)));
            }
        }

        // Modifies run before adds, so a moved column may only be anchored
        // to a column that already exists on the destination
        let mut previous: Option<&str> = None;
        let mut previous_shared: Option<&str> = None;
        for col in &src_cols {
            let name = col.name.as_str();
            match dst.column(name) {
                None => clauses.add_columns.push(format!(
                    "ADD COLUMN {} {}",
                    Ddl::column_definition(col),
                    Ddl::position(previous)
                )),
                Some(existing) => {
                    let moved = src_rank.get(name) != dst_rank.get(name);
                    if moved || !col.same_definition(existing) {
                        let mut clause = format!("MODIFY COLUMN {}", Ddl::column_definition(col));
                        if moved {
                            clause.push(' ');
                            clause.push_str(&Ddl::position(previous_shared));
                        }
                        clauses.modify_columns.push(clause);
                    }
                    previous_shared = Some(name);
                }
            }
            previous = Some(name);
        }
    }

    fn diff_indexes(src: &Table, dst: &Table, clauses: &mut AlterClauses) {
        for idx in &dst.indexes {
            match src.index(&idx.name) {
                None => clauses.drop_indexes.push(Ddl::drop_index(idx)),
                // Index definitions cannot be altered in place
                Some(wanted) if wanted.columns != idx.columns || wanted.kind != idx.kind => {
                    clauses.drop_indexes.push(Ddl::drop_index(idx));
                    clauses
                        .add_indexes
                        .push(format!("ADD {}", Ddl::index_definition(wanted)));
                }
                Some(_) => {}
            }
        }

        for idx in &src.indexes {
            if dst.index(&idx.name).is_none() {
                clauses
                    .add_indexes
                    .push(format!("ADD {}", Ddl::index_definition(idx)));
            }
        }
    }

    fn diff_constraints(src: &Table, dst: &Table, clauses: &mut AlterClauses) {
        for con in &dst.constraints {
            match src.constraint(&con.name) {
                None => clauses.drop_constraints.push(Ddl::drop_constraint(con)),
                Some(wanted) if wanted.definition != con.definition => {
                    clauses.drop_constraints.push(Ddl::drop_constraint(con));
                    clauses
                        .add_constraints
                        .push(format!("ADD {}", Ddl::constraint_definition(wanted)));
                }
                Some(_) => {}
            }
        }

        for con in &src.constraints {
            if dst.constraint(&con.name).is_none() {
                clauses
                    .add_constraints
                    .push(format!("ADD {}", Ddl::constraint_definition(con)));
            }
        }
    }

    fn in_ordinal_order(columns: &[Column]) -> Vec<&Column> {
        let mut cols: Vec<&Column> = columns.iter().collect();
        cols.sort_by_key(|c| c.ordinal_position);
        cols
    }

    fn shared_rank<'a>(columns: &[&'a Column], other: &HashSet<&str>) -> HashMap<&'a str, usize> {
        columns
            .iter()
            .copied()
            .filter(|c| other.contains(c.name.as_str()))
            .enumerate()
            .map(|(rank, c)| (c.name.as_str(), rank))
            .collect()
    }
}
