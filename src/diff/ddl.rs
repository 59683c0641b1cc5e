//! DDL rendering
//!
//! Renders MySQL DDL fragments and statements from the schema model.

use crate::schema::{Column, Constraint, ConstraintDef, Index, IndexKind, ObjectKind, Table};

pub struct Ddl;

impl Ddl {
    /// Backtick-quote an identifier
    pub fn ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Single-quote a string literal
    pub fn string_literal(value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    pub fn column_list(columns: &[String]) -> String {
        let cols: Vec<String> = columns.iter().map(|c| Self::ident(c)).collect();
        format!("({})", cols.join(", "))
    }

    /// Full column definition as used by `CREATE TABLE`, `ADD` and `MODIFY`
    pub fn column_definition(col: &Column) -> String {
        let mut def = format!("{} {}", Self::ident(&col.name), col.data_type);
        def.push_str(if col.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &col.default_value {
            def.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(extra) = col.extra.as_deref().filter(|e| !e.is_empty()) {
            def.push(' ');
            def.push_str(extra);
        }
        if let Some(comment) = &col.comment {
            def.push_str(&format!(" COMMENT {}", Self::string_literal(comment)));
        }
        def
    }

    /// `FIRST` or `AFTER <prev>`
    pub fn position(previous: Option<&str>) -> String {
        match previous {
            None => "FIRST".to_string(),
            Some(prev) => format!("AFTER {}", Self::ident(prev)),
        }
    }

    pub fn index_definition(idx: &Index) -> String {
        let cols = Self::column_list(&idx.columns);
        match idx.kind {
            IndexKind::Primary => format!("PRIMARY KEY {}", cols),
            IndexKind::Unique => format!("UNIQUE KEY {} {}", Self::ident(&idx.name), cols),
            IndexKind::Fulltext => format!("FULLTEXT KEY {} {}", Self::ident(&idx.name), cols),
            IndexKind::Plain => format!("KEY {} {}", Self::ident(&idx.name), cols),
        }
    }

    pub fn drop_index(idx: &Index) -> String {
        match idx.kind {
            IndexKind::Primary => "DROP PRIMARY KEY".to_string(),
            _ => format!("DROP INDEX {}", Self::ident(&idx.name)),
        }
    }

    pub fn constraint_definition(con: &Constraint) -> String {
        match &con.definition {
            ConstraintDef::ForeignKey {
                columns,
                referenced_table,
                referenced_columns,
                on_delete,
                on_update,
            } => {
                let mut sql = format!(
                    "CONSTRAINT {} FOREIGN KEY {} REFERENCES {} {}",
                    Self::ident(&con.name),
                    Self::column_list(columns),
                    Self::ident(referenced_table),
                    Self::column_list(referenced_columns)
                );
                if let Some(action) = on_delete {
                    sql.push_str(&format!(" ON DELETE {}", action));
                }
                if let Some(action) = on_update {
                    sql.push_str(&format!(" ON UPDATE {}", action));
                }
                sql
            }
            ConstraintDef::Check { expression } => {
                format!("CONSTRAINT {} CHECK ({})", Self::ident(&con.name), expression)
            }
        }
    }

    pub fn drop_constraint(con: &Constraint) -> String {
        match con.definition {
            ConstraintDef::ForeignKey { .. } => format!("DROP FOREIGN KEY {}", Self::ident(&con.name)),
            ConstraintDef::Check { .. } => format!("DROP CHECK {}", Self::ident(&con.name)),
        }
    }

    pub fn create_table(table: &Table) -> String {
        let mut columns: Vec<&Column> = table.columns.iter().collect();
        columns.sort_by_key(|c| c.ordinal_position);
        let mut lines: Vec<String> = columns.into_iter().map(Self::column_definition).collect();

        // Primary key first, the way the server prints it
        let (primary, others): (Vec<&Index>, Vec<&Index>) = table
            .indexes
            .iter()
            .partition(|i| i.kind == IndexKind::Primary);
        lines.extend(primary.into_iter().map(Self::index_definition));
        lines.extend(others.into_iter().map(Self::index_definition));
        lines.extend(table.constraints.iter().map(Self::constraint_definition));

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            Self::ident(&table.name),
            lines.join(",\n  ")
        );
        if let Some(comment) = &table.comment {
            sql.push_str(&format!(" COMMENT={}", Self::string_literal(comment)));
        }
        sql.push(';');
        sql
    }

    pub fn drop_table(name: &str) -> String {
        format!("DROP TABLE {};", Self::ident(name))
    }

    pub fn alter_table(name: &str, clauses: &[String]) -> String {
        format!("ALTER TABLE {}\n  {};", Self::ident(name), clauses.join(",\n  "))
    }

    /// Stored definition, terminated with `terminator`
    pub fn create_script(kind: ObjectKind, name: &str, definition: &str, terminator: &str) -> String {
        let body = definition.trim_end().trim_end_matches(';').trim_end();
        let starts_with_create = body
            .get(..6)
            .map(|head| head.eq_ignore_ascii_case("create"))
            .unwrap_or(false);

        if kind == ObjectKind::View && !starts_with_create {
            format!("CREATE VIEW {} AS {}{}", Self::ident(name), body.trim_start(), terminator)
        } else {
            format!("{}{}", body, terminator)
        }
    }

    pub fn drop_script(kind: ObjectKind, name: &str, terminator: &str) -> String {
        format!("DROP {} IF EXISTS {}{}", kind.keyword(), Self::ident(name), terminator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ident_escapes_backticks() {
        assert_eq!(Ddl::ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_column_definition() {
        let mut col = column("created_at", "timestamp", 4);
        col.nullable = false;
        col.default_value = Some("CURRENT_TIMESTAMP".to_string());
        col.extra = Some("on update CURRENT_TIMESTAMP".to_string());
        col.comment = Some("row's creation".to_string());

        assert_eq!(
            Ddl::column_definition(&col),
            "`created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP on update CURRENT_TIMESTAMP COMMENT 'row''s creation'"
        );
    }

    #[test]
    fn test_create_table() {
        let mut table = users_table();
        table.constraints.push(Constraint {
            name: "chk_name".to_string(),
            definition: ConstraintDef::Check {
                expression: "char_length(`name`) > 0".to_string(),
            },
        });
        table.comment = Some("accounts".to_string());

        let expected = "CREATE TABLE `users` (\n  \
            `id` int(11) NOT NULL auto_increment,\n  \
            `email` varchar(255) NOT NULL,\n  \
            `name` varchar(100) NULL,\n  \
            PRIMARY KEY (`id`),\n  \
            UNIQUE KEY `uk_email` (`email`),\n  \
            CONSTRAINT `chk_name` CHECK (char_length(`name`) > 0)\n\
            ) COMMENT='accounts';";
        assert_eq!(Ddl::create_table(&table), expected);
    }

    #[test]
    fn test_create_table_uses_ordinal_order() {
        let mut table = users_table();
        table.columns.reverse();
        table.indexes.clear();

        assert_eq!(
            Ddl::create_table(&table),
            "CREATE TABLE `users` (\n  \
             `id` int(11) NOT NULL auto_increment,\n  \
             `email` varchar(255) NOT NULL,\n  \
             `name` varchar(100) NULL\n\
             );"
        );
    }

    #[test]
    fn test_foreign_key_definition() {
        let fk = Constraint {
            name: "fk_orders_user".to_string(),
            definition: ConstraintDef::ForeignKey {
                columns: vec!["user_id".to_string()],
                referenced_table: "users".to_string(),
                referenced_columns: vec!["id".to_string()],
                on_delete: Some("CASCADE".to_string()),
                on_update: None,
            },
        };
        assert_eq!(
            Ddl::constraint_definition(&fk),
            "CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE"
        );
        assert_eq!(Ddl::drop_constraint(&fk), "DROP FOREIGN KEY `fk_orders_user`");
    }

    #[test]
    fn test_view_body_is_wrapped() {
        assert_eq!(
            Ddl::create_script(ObjectKind::View, "v", "select 1 AS `one`", ";"),
            "CREATE VIEW `v` AS select 1 AS `one`;"
        );
        assert_eq!(
            Ddl::create_script(ObjectKind::View, "v", "CREATE VIEW `v` AS select 1;", ";"),
            "CREATE VIEW `v` AS select 1;"
        );
    }

    #[test]
    fn test_routine_uses_custom_terminator() {
        let def = "CREATE PROCEDURE `p`()\nBEGIN\n  SELECT 1;\nEND\n";
        assert_eq!(
            Ddl::create_script(ObjectKind::Procedure, "p", def, "$$"),
            "CREATE PROCEDURE `p`()\nBEGIN\n  SELECT 1;\nEND$$"
        );
        assert_eq!(
            Ddl::drop_script(ObjectKind::Procedure, "p", "$$"),
            "DROP PROCEDURE IF EXISTS `p`$$"
        );
    }
}
