//! Row differencer: turns param differences into an edit script

use crate::param::{Param, ParamBank, Row};
use crate::script::{single_line, EditScript, Statement};
use std::collections::HashSet;
use tracing::debug;

/// Edit script produced by a diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowDiff {
    pub script: EditScript,
    /// True when some row had no counterpart in the old snapshot; such
    /// scripts need missing rows seeded before they are applied
    pub had_additions: bool,
}

impl RowDiff {
    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    pub fn merge(&mut self, other: RowDiff) {
        self.script.append(other.script);
        self.had_additions |= other.had_additions;
    }
}

/// Emit statements turning `old` into `new`
///
/// Rows are visited in `new` order and only the first row per id counts. A
/// row missing from `old` is compared against `old`'s default row for that
/// id. Neither snapshot is modified.
pub fn diff_rows(old: &Param, new: &Param, param_name: &str) -> RowDiff {
    let mut diff = RowDiff::default();
    let mut seen: HashSet<i32> = HashSet::new();

    for row in &new.rows {
        if !seen.insert(row.id) {
            continue;
        }

        let synthesized;
        let old_row = match old.row(row.id) {
            Some(existing) => existing,
            None => {
                synthesized = old.default_row(row.id);
                diff.had_additions = true;
                &synthesized
            }
        };

        diff_row(old_row, row, new, param_name, &mut diff.script);
    }

    debug!(param = %param_name, statements = diff.script.len(), "diffed param");
    diff
}

fn diff_row(old_row: &Row, row: &Row, schema: &Param, param_name: &str, script: &mut EditScript) {
    let name = single_line(&row.name);
    if name != single_line(&old_row.name) {
        script.push(Statement::name(param_name, row.id, name));
    }

    for (idx, value) in row.values.iter().enumerate() {
        let Some(field) = schema.fields.get(idx) else {
            break;
        };
        let changed = match old_row.values.get(idx) {
            Some(old_value) => !value.same_as(old_value),
            None => true,
        };
        if changed {
            script.push(Statement::field(
                param_name,
                row.id,
                &field.name,
                value.canonical(),
            ));
        }
    }
}

/// Diff every param present in both banks, in name order
///
/// `target` plays the old snapshot and `reference` the new one, so applying
/// the script to `target` moves it towards `reference`.
pub fn diff_banks(target: &ParamBank, reference: &ParamBank) -> RowDiff {
    let mut diff = RowDiff::default();

    for (name, old) in &target.params {
        let Some(new) = reference.get(name) else {
            debug!(param = %name, "param missing from reference, skipped");
            continue;
        };
        diff.merge(diff_rows(old, new, name));
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{FieldDef, FieldType, FieldValue};
    use crate::script::{apply_script, seed_missing_rows};

    fn schema() -> Vec<FieldDef> {
        let mut reference = FieldDef::new("replaceSpEffectId", FieldType::S32);
        reference.minimum = -1.0;
        vec![reference, FieldDef::new("pad", FieldType::Dummy8)]
    }

    fn row(id: i32, name: &str, reference: i64, pad: Vec<u8>) -> Row {
        Row {
            id,
            name: name.to_string(),
            values: vec![FieldValue::Int(reference), FieldValue::Bytes(pad)],
        }
    }

    fn param(rows: Vec<Row>) -> Param {
        let mut param = Param::new("SpEffectParam", schema());
        param.rows = rows;
        param
    }

    #[test]
    fn test_new_row_diffed_against_default() {
        let old = param(vec![row(1, "", 20, vec![0])]);
        let new = param(vec![row(1, "", 20, vec![0]), row(7, "", 3, vec![0])]);

        let diff = diff_rows(&old, &new, "SpEffectParam");

        assert!(diff.had_additions);
        assert_eq!(
            diff.script.to_string(),
            "param SpEffectParam: id 7: replaceSpEffectId: = 3;\n"
        );
        assert!(old.row(7).is_none());
    }

    #[test]
    fn test_default_row_diffs_clean_against_itself() {
        let old = param(vec![row(1, "Template", 20, vec![5, 5])]);
        let fresh = old.default_row(9);
        let snapshot = param(vec![fresh]);

        let diff = diff_rows(&snapshot, &snapshot, "SpEffectParam");

        assert!(diff.is_empty());
        assert!(!diff.had_additions);
    }

    #[test]
    fn test_name_change_ignores_carriage_returns() {
        let old = param(vec![row(1, "Poison\r", 0, vec![0])]);
        let same = param(vec![row(1, "Poison", 0, vec![0])]);
        let renamed = param(vec![row(1, "Toxic\r", 0, vec![0])]);

        assert!(diff_rows(&old, &same, "SpEffectParam").is_empty());
        assert_eq!(
            diff_rows(&old, &renamed, "SpEffectParam").script.to_string(),
            "param SpEffectParam: id 1: Name: = Toxic;\n"
        );
    }

    #[test]
    fn test_multiline_name_stays_on_one_line() {
        let old = param(vec![row(1, "Poison", 0, vec![0])]);
        let new = param(vec![row(1, "line1\nline2", 0, vec![0])]);

        let diff = diff_rows(&old, &new, "SpEffectParam");
        let text = diff.script.to_string();

        assert_eq!(text, "param SpEffectParam: id 1: Name: = line1 line2;\n");
        assert_eq!(EditScript::parse(&text).unwrap(), diff.script);
    }

    #[test]
    fn test_bytes_compared_canonically() {
        let old = param(vec![row(1, "", 0, vec![0, 0])]);
        let new = param(vec![row(1, "", 0, vec![0, 1])]);

        let diff = diff_rows(&old, &new, "SpEffectParam");

        assert_eq!(
            diff.script.to_string(),
            "param SpEffectParam: id 1: pad: = [0|1];\n"
        );
    }

    #[test]
    fn test_duplicate_ids_first_wins() {
        let old = param(vec![row(1, "", 0, vec![0])]);
        let new = param(vec![row(1, "", 4, vec![0]), row(1, "", 8, vec![0])]);

        let diff = diff_rows(&old, &new, "SpEffectParam");

        assert_eq!(diff.script.len(), 1);
        assert!(diff.script.to_string().contains("= 4;"));
    }

    #[test]
    fn test_bank_diff_replays_onto_target() {
        let mut target = ParamBank::new();
        target.insert(param(vec![row(1, "A", 0, vec![0]), row(2, "B", 5, vec![0])]));
        let mut reference = ParamBank::new();
        reference.insert(param(vec![
            row(1, "A", 0, vec![0]),
            row(2, "Bee", 6, vec![1]),
            row(3, "C", 9, vec![0]),
        ]));

        let diff = diff_banks(&target, &reference);
        assert!(diff.had_additions);

        let script = crate::script::EditScript::parse(&diff.script.to_string()).unwrap();
        seed_missing_rows(&mut target, &script);
        apply_script(&mut target, &script).unwrap();

        assert!(diff_banks(&target, &reference).is_empty());
    }
}
