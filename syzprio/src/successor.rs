//! Externally supplied successor-probability tables (spec.md §4.4).
//!
//! These are produced offline (see `bin/seq_ingest.rs` and
//! `bin/mix_probabilities.rs`) and loaded at startup. The wire format is a
//! JSON object of objects: `{ "<caller>": { "<callee>": <probability>, ... },
//! ... }`. Two key dialects are supported depending on how the caller/callee
//! keys were produced upstream.

use std::collections::HashMap;

use syzprio_core::{SyscallId, Target};

use crate::error::SuccessorTableError;

/// How the JSON's keys map onto this crate's dense [`SyscallId`] space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDialect {
    /// Keys are kernel call numbers (`NR`); each is fanned out through
    /// [`Target::ids_for_nr`] to every syscall ID that shares it.
    DongTing,
    /// Keys are already internal [`SyscallId`]s; rows/entries naming an
    /// ID the target doesn't know, or doesn't consider generatable, are
    /// dropped.
    DongTingSyzk,
}

/// Successor probabilities keyed by internal syscall ID, in the same ID
/// space as [`crate::choice_table::ChoiceTable`].
#[derive(Debug, Clone, Default)]
pub struct SuccessorTable {
    rows: HashMap<SyscallId, HashMap<SyscallId, f64>>,
}

impl SuccessorTable {
    /// Parses `json` (the format produced by the offline tools) according
    /// to `dialect`, translating keys through `target`.
    pub fn from_json(json: &str, dialect: KeyDialect, target: &Target) -> Result<Self, SuccessorTableError> {
        let raw: HashMap<String, HashMap<String, f64>> = serde_json::from_str(json)?;
        if raw.is_empty() {
            return Err(SuccessorTableError::EmptyJson);
        }

        let mut rows: HashMap<SyscallId, HashMap<SyscallId, f64>> = HashMap::new();
        match dialect {
            KeyDialect::DongTing => {
                for (caller_nr, callees) in &raw {
                    let Ok(caller_nr) = caller_nr.parse::<i64>() else { continue };
                    for &caller_id in target.ids_for_nr(caller_nr) {
                        let row = rows.entry(caller_id).or_default();
                        for (callee_nr, &prob) in callees {
                            let Ok(callee_nr) = callee_nr.parse::<i64>() else { continue };
                            for &callee_id in target.ids_for_nr(callee_nr) {
                                *row.entry(callee_id).or_insert(0.0) += prob;
                            }
                        }
                    }
                }
            }
            KeyDialect::DongTingSyzk => {
                for (caller_id, callees) in &raw {
                    let Ok(caller_id) = caller_id.parse::<SyscallId>() else { continue };
                    if !target.syscall(caller_id).is_some_and(|s| s.generatable()) {
                        continue;
                    }
                    let row = rows.entry(caller_id).or_default();
                    for (callee_id, &prob) in callees {
                        let Ok(callee_id) = callee_id.parse::<SyscallId>() else { continue };
                        if !target.syscall(callee_id).is_some_and(|s| s.generatable()) {
                            continue;
                        }
                        *row.entry(callee_id).or_insert(0.0) += prob;
                    }
                }
            }
        }

        Ok(Self { rows })
    }

    /// Builds a table directly from already-translated rows, bypassing
    /// JSON parsing (used by the "mix" offline tool and by tests).
    pub fn from_rows(rows: HashMap<SyscallId, HashMap<SyscallId, f64>>) -> Self {
        Self { rows }
    }

    pub fn probability(&self, caller: SyscallId, callee: SyscallId) -> f64 {
        self.rows.get(&caller).and_then(|row| row.get(&callee)).copied().unwrap_or(0.0)
    }

    pub fn row(&self, caller: SyscallId) -> Option<&HashMap<SyscallId, f64>> {
        self.rows.get(&caller)
    }

    pub fn rows(&self) -> &HashMap<SyscallId, HashMap<SyscallId, f64>> {
        &self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syzprio_core::Syscall;

    fn target() -> Target {
        Target::new(vec![
            Syscall::new(0, 1, "open"),
            Syscall::new(1, 2, "read"),
            Syscall::new(2, 2, "read$variant"),
        ])
    }

    #[test]
    fn dong_ting_fans_out_nr_to_every_id() {
        let t = target();
        let json = r#"{"1": {"2": 0.5}}"#;
        let table = SuccessorTable::from_json(json, KeyDialect::DongTing, &t).unwrap();
        assert_eq!(table.probability(0, 1), 0.5);
        assert_eq!(table.probability(0, 2), 0.5);
    }

    #[test]
    fn dong_ting_syzk_drops_unknown_ids() {
        let t = target();
        let json = r#"{"0": {"1": 0.3, "99": 0.7}}"#;
        let table = SuccessorTable::from_json(json, KeyDialect::DongTingSyzk, &t).unwrap();
        assert_eq!(table.probability(0, 1), 0.3);
        assert_eq!(table.probability(0, 99), 0.0);
    }

    #[test]
    fn empty_json_is_an_error() {
        let t = target();
        let err = SuccessorTable::from_json("{}", KeyDialect::DongTingSyzk, &t).unwrap_err();
        assert!(matches!(err, SuccessorTableError::EmptyJson));
    }
}
