//! Identity-keyed merge engine shared by every content kind
//!
//! A [`MergeStrategy`] describes one kind of mergeable entry: how to derive its
//! identity key, when two entries are equal, and how an existing entry takes on
//! an incoming entry's contents. [`merge_entries`] and [`diff_entries`] run the
//! same match/compare/apply loop for every kind.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use tracing::debug;

/// What to do with an incoming entry that matches an existing one but differs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace the existing entry's contents
    #[default]
    Overwrite,
    /// Leave the existing entry untouched
    IgnoreConflicting,
}

/// Per-call merge configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub policy: ConflictPolicy,
    /// Produce a reduced "only-new" artifact instead of mutating the target
    pub diff_mode: bool,
}

impl MergeOptions {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            diff_mode: false,
        }
    }

    pub fn diff() -> Self {
        Self {
            policy: ConflictPolicy::Overwrite,
            diff_mode: true,
        }
    }
}

/// Kind of a change log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// An entry was added to an existing sub-resource
    Added,
    /// An existing entry took on the incoming entry's contents
    Updated,
    /// An entry was dropped from a diff artifact because upstream already has it
    Removed,
    /// No matching sub-resource existed, so a whole new one was appended
    Appended,
}

/// A single change log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub description: String,
}

impl Change {
    pub fn added(entry: &str, container: &str) -> Self {
        Self {
            kind: ChangeKind::Added,
            description: format!("Added {} to {}", entry, container),
        }
    }

    pub fn updated(entry: &str, container: &str) -> Self {
        Self {
            kind: ChangeKind::Updated,
            description: format!("Updated {} in {}", entry, container),
        }
    }

    pub fn removed(entry: &str, container: &str) -> Self {
        Self {
            kind: ChangeKind::Removed,
            description: format!("Removed {} from {}", entry, container),
        }
    }

    pub fn appended(entry: &str, container: &str) -> Self {
        Self {
            kind: ChangeKind::Appended,
            description: format!("Added {} to {}", entry, container),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

/// Ordered list of changes made by a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    changes: Vec<Change>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn extend(&mut self, other: ChangeLog) {
        self.changes.extend(other.changes);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Number of records of the given kind
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// Result of a merge that did not fail
///
/// Callers must not persist anything for [`MergeOutcome::Unchanged`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Changed(ChangeLog),
}

impl MergeOutcome {
    /// Collapse an empty log into `Unchanged`
    pub fn from_log(log: ChangeLog) -> Self {
        if log.is_empty() {
            MergeOutcome::Unchanged
        } else {
            MergeOutcome::Changed(log)
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, MergeOutcome::Changed(_))
    }

    pub fn log(&self) -> Option<&ChangeLog> {
        match self {
            MergeOutcome::Changed(log) => Some(log),
            MergeOutcome::Unchanged => None,
        }
    }

    /// Number of records of the given kind (zero when unchanged)
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.log().map_or(0, |log| log.count(kind))
    }
}

/// Capabilities one entry kind supplies to the merge engine
pub trait MergeStrategy {
    type Entry;
    type Key: Eq + Hash;

    /// Identity key; name keys are expected to be case-folded here
    fn key(entry: &Self::Entry) -> Self::Key;

    /// Short human-readable label such as `Entry ID 100`
    fn describe(entry: &Self::Entry) -> String;

    /// Semantic equality between an existing and an incoming entry
    fn equals(existing: &Self::Entry, incoming: &Self::Entry) -> bool;

    /// Make `existing` take on the mutable contents of `incoming`
    fn apply_update(existing: &mut Self::Entry, incoming: Self::Entry);

    /// Restore canonical order after entries were added or replaced
    fn sort(_entries: &mut [Self::Entry]) {}
}

/// Merge `incoming` into `target` in input order, logging each change
///
/// Later duplicates of an identity key within `incoming` are ignored.
pub fn merge_entries<S: MergeStrategy>(
    target: &mut Vec<S::Entry>,
    incoming: Vec<S::Entry>,
    policy: ConflictPolicy,
    container: &str,
    log: &mut ChangeLog,
) {
    let mut seen: HashSet<S::Key> = HashSet::new();
    let mut touched = false;

    for entry in incoming {
        let key = S::key(&entry);
        if seen.contains(&key) {
            debug!(entry = %S::describe(&entry), "ignoring duplicate incoming entry");
            continue;
        }

        match target.iter().position(|e| S::key(e) == key) {
            None => {
                log.push(Change::added(&S::describe(&entry), container));
                target.push(entry);
                touched = true;
            }
            Some(idx) => {
                if S::equals(&target[idx], &entry) {
                    debug!(entry = %S::describe(&entry), "identical entry, nothing to do");
                } else if policy == ConflictPolicy::IgnoreConflicting {
                    debug!(entry = %S::describe(&entry), "conflicting entry ignored");
                } else {
                    log.push(Change::updated(&S::describe(&entry), container));
                    S::apply_update(&mut target[idx], entry);
                    touched = true;
                }
            }
        }
        seen.insert(key);
    }

    if touched {
        S::sort(target);
    }
}

/// Drop later entries whose identity key repeats an earlier one
pub fn dedup_first_wins<S: MergeStrategy>(entries: Vec<S::Entry>) -> Vec<S::Entry> {
    let mut seen: HashSet<S::Key> = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let fresh = seen.insert(S::key(entry));
            if !fresh {
                debug!(entry = %S::describe(entry), "ignoring duplicate incoming entry");
            }
            fresh
        })
        .collect()
}

/// Strip from `incoming` every entry that `reference` already holds unchanged
///
/// Nothing in `reference` is modified. The returned list keeps input order.
pub fn diff_entries<S: MergeStrategy>(
    reference: &[S::Entry],
    incoming: Vec<S::Entry>,
    container: &str,
    log: &mut ChangeLog,
) -> Vec<S::Entry> {
    let mut seen: HashSet<S::Key> = HashSet::new();
    let mut kept = Vec::with_capacity(incoming.len());

    for entry in incoming {
        let key = S::key(&entry);
        if seen.contains(&key) {
            continue;
        }

        let duplicate = reference
            .iter()
            .find(|e| S::key(e) == key)
            .is_some_and(|existing| S::equals(existing, &entry));

        if duplicate {
            log.push(Change::removed(&S::describe(&entry), container));
        } else {
            kept.push(entry);
        }
        seen.insert(key);
    }

    kept
}
