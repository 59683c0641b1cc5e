//! Script Differ
//!
//! Views, functions, procedures and triggers are compared by their stored
//! definition text. None of them is altered in place: a changed object is
//! dropped and created again.

use super::ddl::Ddl;
use super::{ChangeKind, DiffResult};
use crate::schema::{NamedObjects, ObjectKind, Script};

pub struct ScriptDiffer;

impl ScriptDiffer {
    /// Statement terminator for `kind` given the custom routine delimiter
    pub fn terminator(kind: ObjectKind, delimiter: &str) -> &str {
        if kind.needs_delimiter() {
            delimiter
        } else {
            ";"
        }
    }

    /// Compare two script sets of the same kind
    pub fn diff(
        kind: ObjectKind,
        src: &NamedObjects<Script>,
        dst: &NamedObjects<Script>,
        delimiter: &str,
    ) -> Vec<DiffResult> {
        let terminator = Self::terminator(kind, delimiter);
        let mut results = Vec::new();

        for (name, script) in src.iter() {
            match dst.get(name) {
                None => results.push(Self::create(kind, script, terminator)),
                // Exact comparison, whitespace and case included
                Some(existing) if existing.definition != script.definition => {
                    results.push(DiffResult::new(
                        name,
                        ChangeKind::Drop,
                        Ddl::drop_script(kind, name, terminator),
                    ));
                    results.push(Self::create(kind, script, terminator));
                }
                Some(_) => {}
            }
        }

        for name in dst.names() {
            if !src.contains(name) {
                results.push(DiffResult::new(
                    name,
                    ChangeKind::Drop,
                    Ddl::drop_script(kind, name, terminator),
                ));
            }
        }

        results
    }

    fn create(kind: ObjectKind, script: &Script, terminator: &str) -> DiffResult {
        DiffResult::new(
            &script.name,
            ChangeKind::Create,
            Ddl::create_script(kind, &script.name, &script.definition, terminator),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::script;

    fn set(kind: ObjectKind, items: &[(&str, &str)]) -> NamedObjects<Script> {
        let mut objects = NamedObjects::new();
        for (name, def) in items {
            objects.insert(name.to_string(), script(kind, name, def)).unwrap();
        }
        objects
    }

    const PROC_V1: &str = "CREATE PROCEDURE `archive`()\nBEGIN\n  DELETE FROM logs WHERE ts < NOW();\nEND";
    const PROC_V2: &str = "CREATE PROCEDURE `archive`()\nBEGIN\n  DELETE FROM logs WHERE ts < NOW() - INTERVAL 1 DAY;\nEND";

    #[test]
    fn test_identical_scripts_produce_nothing() {
        let procs = set(ObjectKind::Procedure, &[("archive", PROC_V1)]);
        assert!(ScriptDiffer::diff(ObjectKind::Procedure, &procs, &procs.clone(), "$$").is_empty());
    }

    #[test]
    fn test_changed_body_is_drop_then_create() {
        let src = set(ObjectKind::Procedure, &[("archive", PROC_V2)]);
        let dst = set(ObjectKind::Procedure, &[("archive", PROC_V1)]);

        let results = ScriptDiffer::diff(ObjectKind::Procedure, &src, &dst, "$$");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].change, ChangeKind::Drop);
        assert_eq!(results[0].sql, "DROP PROCEDURE IF EXISTS `archive`$$");
        assert_eq!(results[1].change, ChangeKind::Create);
        assert_eq!(results[1].sql, format!("{}$$", PROC_V2));
    }

    #[test]
    fn test_whitespace_difference_counts() {
        let src = set(ObjectKind::View, &[("v", "select 1")]);
        let dst = set(ObjectKind::View, &[("v", "select  1")]);
        assert_eq!(ScriptDiffer::diff(ObjectKind::View, &src, &dst, "$$").len(), 2);
    }

    #[test]
    fn test_views_use_plain_terminator() {
        let src = set(ObjectKind::View, &[("v_new", "select 1")]);
        let dst = set(ObjectKind::View, &[("v_old", "select 2")]);

        let results = ScriptDiffer::diff(ObjectKind::View, &src, &dst, "$$");
        assert_eq!(
            results,
            vec![
                DiffResult::new("v_new", ChangeKind::Create, "CREATE VIEW `v_new` AS select 1;".to_string()),
                DiffResult::new("v_old", ChangeKind::Drop, "DROP VIEW IF EXISTS `v_old`;".to_string()),
            ]
        );
    }

    #[test]
    fn test_trigger_drop_uses_delimiter() {
        let dst = set(ObjectKind::Trigger, &[("trg_audit", "CREATE TRIGGER trg_audit ...")]);
        let results = ScriptDiffer::diff(ObjectKind::Trigger, &NamedObjects::new(), &dst, "//");
        assert_eq!(results[0].sql, "DROP TRIGGER IF EXISTS `trg_audit`//");
    }
}
