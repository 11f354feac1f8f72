//! Text bank merging
//!
//! Text banks hold localized strings keyed by integer id. Incoming entries come
//! either from exported fragment files or from manual `Name:Id:Text` arguments;
//! both go through the same match/compare/apply steps.

use crate::container::{Body, Container};
use crate::error::{Error, Result};
use crate::merge::{merge_entries, ChangeLog, MergeOptions, MergeOutcome, MergeStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

/// Literal used by exported fragments to encode a null text value
pub const NULL_TEXT: &str = "%null%";

/// A bank of text entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBank {
    /// Bank title, e.g. `AccessoryName`
    pub name: String,
    pub entries: Vec<TextEntry>,
}

impl TextBank {
    pub fn get(&self, id: i32) -> Option<&TextEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// A single text string; `None` is distinct from the empty string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    pub id: i32,
    pub text: Option<String>,
}

impl TextEntry {
    pub fn new(id: i32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: Some(text.into()),
        }
    }

    pub fn null(id: i32) -> Self {
        Self { id, text: None }
    }
}

/// Normalize a text value read from a fragment
///
/// Carriage returns are dropped and the [`NULL_TEXT`] literal becomes `None`.
pub fn normalize_text(raw: Option<String>) -> Option<String> {
    let text = raw?.replace('\r', "");
    if text == NULL_TEXT {
        None
    } else {
        Some(text)
    }
}

/// Contents of an exported text fragment file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Bank title embedded in the export, if any
    #[serde(default)]
    pub title: Option<String>,
    pub entries: Vec<TextEntry>,
}

/// A fragment together with the file name it was read from
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingText {
    pub file_name: String,
    pub fragment: TextFragment,
}

impl IncomingText {
    /// File name up to its first dot, e.g. `AccessoryName` for `AccessoryName.fmg.json`
    pub fn base_name(&self) -> &str {
        base_name(&self.file_name)
    }
}

/// A manually specified entry in `Name: Id: Text` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntry {
    pub bank: String,
    pub id: i32,
    pub text: String,
}

impl FromStr for ManualEntry {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(3, ':').collect();
        if parts.len() != 3 {
            return Err(Error::ManualEntry {
                input: s.to_string(),
                reason: format!("expected 3 fields, found {}", parts.len()),
            });
        }

        let id = parts[1].trim().parse::<i32>().map_err(|e| Error::ManualEntry {
            input: s.to_string(),
            reason: format!("invalid id '{}': {}", parts[1].trim(), e),
        })?;

        Ok(Self {
            bank: parts[0].trim().to_string(),
            id,
            text: parts[2].trim().to_string(),
        })
    }
}

/// Parse every manual entry, failing on the first malformed one
pub fn parse_manual_entries<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<ManualEntry>> {
    inputs.iter().map(|s| s.as_ref().parse()).collect()
}

struct TextStrategy;

impl MergeStrategy for TextStrategy {
    type Entry = TextEntry;
    type Key = i32;

    fn key(entry: &TextEntry) -> i32 {
        entry.id
    }

    fn describe(entry: &TextEntry) -> String {
        format!("Entry ID {}", entry.id)
    }

    fn equals(existing: &TextEntry, incoming: &TextEntry) -> bool {
        existing.text == incoming.text
    }

    fn apply_update(existing: &mut TextEntry, incoming: TextEntry) {
        existing.text = incoming.text;
    }
}

/// Merge exported fragments into the text banks of `container`
///
/// Each fragment selects its bank by base file name, then by embedded title.
/// A fragment whose bank does not exist aborts the whole merge.
pub fn merge_text_fragments(
    container: &mut Container,
    incoming: Vec<IncomingText>,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let mut log = ChangeLog::new();

    for item in incoming {
        let idx = find_bank(container, item.base_name())
            .or_else(|| {
                item.fragment
                    .title
                    .as_deref()
                    .and_then(|title| find_bank(container, title))
            })
            .ok_or_else(|| Error::BankNotFound {
                name: item.base_name().to_string(),
                container: container.label(),
            })?;

        let entries = item
            .fragment
            .entries
            .into_iter()
            .map(|e| TextEntry {
                id: e.id,
                text: normalize_text(e.text),
            })
            .collect();

        if let Body::Text(bank) = &mut container.sub_resources[idx].body {
            merge_entries::<TextStrategy>(
                &mut bank.entries,
                entries,
                options.policy,
                &item.file_name,
                &mut log,
            );
        }
        info!(fragment = %item.file_name, "merged text fragment");
    }

    Ok(MergeOutcome::from_log(log))
}

/// Apply already-parsed manual entries to the text banks of `container`
pub fn apply_manual_entries(
    container: &mut Container,
    entries: &[ManualEntry],
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let mut log = ChangeLog::new();

    for entry in entries {
        let idx = find_bank(container, &entry.bank).ok_or_else(|| Error::BankNotFound {
            name: entry.bank.clone(),
            container: container.label(),
        })?;

        let sub = &mut container.sub_resources[idx];
        let label = sub.file_name().to_string();
        if let Body::Text(bank) = &mut sub.body {
            merge_entries::<TextStrategy>(
                &mut bank.entries,
                vec![TextEntry::new(entry.id, entry.text.clone())],
                options.policy,
                &label,
                &mut log,
            );
        }
    }

    Ok(MergeOutcome::from_log(log))
}

/// Index of the text bank whose title or base file name matches `name`, ignoring case
fn find_bank(container: &Container, name: &str) -> Option<usize> {
    container.sub_resources.iter().position(|sub| match &sub.body {
        Body::Text(bank) => {
            bank.name.eq_ignore_ascii_case(name)
                || base_name(sub.file_name()).eq_ignore_ascii_case(name)
        }
        _ => false,
    })
}

fn base_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::SubResource;
    use crate::merge::{ChangeKind, ConflictPolicy};
    use std::path::PathBuf;

    fn container_with_bank(entries: Vec<TextEntry>) -> Container {
        let mut container = Container::new(PathBuf::from("item.msgbnd.dcx"));
        container.sub_resources.push(SubResource {
            name: "N:\\GR\\data\\INTERROOT_win64\\msg\\engUS\\Spells.fmg".to_string(),
            id: 3,
            flags: 0x40,
            body: Body::Text(TextBank {
                name: "SpellName".to_string(),
                entries,
            }),
        });
        container
    }

    fn fragment(file_name: &str, entries: Vec<TextEntry>) -> IncomingText {
        IncomingText {
            file_name: file_name.to_string(),
            fragment: TextFragment {
                title: None,
                entries,
            },
        }
    }

    fn bank(container: &Container) -> &TextBank {
        match &container.sub_resources[0].body {
            Body::Text(bank) => bank,
            _ => panic!("expected text bank"),
        }
    }

    #[test]
    fn test_update_and_add() {
        let mut container = container_with_bank(vec![TextEntry::new(100, "Fire")]);
        let incoming = fragment(
            "Spells.fmg.json",
            vec![TextEntry::new(100, "Flame"), TextEntry::new(200, "Ice")],
        );

        let outcome =
            merge_text_fragments(&mut container, vec![incoming], &MergeOptions::default()).unwrap();

        assert_eq!(outcome.count(ChangeKind::Updated), 1);
        assert_eq!(outcome.count(ChangeKind::Added), 1);
        assert_eq!(bank(&container).get(100).unwrap().text.as_deref(), Some("Flame"));
        assert_eq!(bank(&container).get(200).unwrap().text.as_deref(), Some("Ice"));
    }

    #[test]
    fn test_second_merge_is_unchanged() {
        let mut container = container_with_bank(vec![TextEntry::new(100, "Fire")]);
        let incoming = fragment("spells.json", vec![TextEntry::new(100, "Flame")]);

        let first = merge_text_fragments(
            &mut container,
            vec![incoming.clone()],
            &MergeOptions::default(),
        )
        .unwrap();
        let second =
            merge_text_fragments(&mut container, vec![incoming], &MergeOptions::default()).unwrap();

        assert!(first.is_changed());
        assert_eq!(second, MergeOutcome::Unchanged);
    }

    #[test]
    fn test_bank_selected_by_title() {
        let mut container = container_with_bank(Vec::new());
        let mut incoming = fragment("export_01.json", vec![TextEntry::new(5, "Bolt")]);
        incoming.fragment.title = Some("spellname".to_string());

        let outcome =
            merge_text_fragments(&mut container, vec![incoming], &MergeOptions::default()).unwrap();

        assert_eq!(outcome.count(ChangeKind::Added), 1);
    }

    #[test]
    fn test_missing_bank_is_fatal() {
        let mut container = container_with_bank(Vec::new());
        let incoming = fragment("WeaponName.json", vec![TextEntry::new(1, "Sword")]);

        let err = merge_text_fragments(&mut container, vec![incoming], &MergeOptions::default())
            .unwrap_err();

        assert!(matches!(err, Error::BankNotFound { .. }));
    }

    #[test]
    fn test_null_differs_from_empty() {
        let mut container = container_with_bank(vec![TextEntry::new(1, "")]);
        let incoming = fragment(
            "Spells.json",
            vec![TextEntry {
                id: 1,
                text: Some(NULL_TEXT.to_string()),
            }],
        );

        let outcome =
            merge_text_fragments(&mut container, vec![incoming], &MergeOptions::default()).unwrap();

        assert_eq!(outcome.count(ChangeKind::Updated), 1);
        assert_eq!(bank(&container).get(1), Some(&TextEntry::null(1)));
    }

    #[test]
    fn test_ignore_conflicts() {
        let mut container = container_with_bank(vec![TextEntry::new(100, "Fire")]);
        let incoming = fragment("Spells.json", vec![TextEntry::new(100, "Flame")]);
        let options = MergeOptions::new(ConflictPolicy::IgnoreConflicting);

        let outcome = merge_text_fragments(&mut container, vec![incoming], &options).unwrap();

        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(bank(&container).get(100).unwrap().text.as_deref(), Some("Fire"));
    }

    #[test]
    fn test_parse_manual_entry() {
        let entry: ManualEntry = "SpellName: 6200: Amulet: of Defenestration".parse().unwrap();
        assert_eq!(entry.bank, "SpellName");
        assert_eq!(entry.id, 6200);
        assert_eq!(entry.text, "Amulet: of Defenestration");
    }

    #[test]
    fn test_parse_manual_entry_errors() {
        assert!("SpellName:6200".parse::<ManualEntry>().is_err());
        assert!("SpellName:abc:Text".parse::<ManualEntry>().is_err());
        assert!(parse_manual_entries(&["Spells:1:a", "Spells:x:b"]).is_err());
    }

    #[test]
    fn test_apply_manual_entries() {
        let mut container = container_with_bank(vec![TextEntry::new(1, "Old")]);
        let entries = parse_manual_entries(&["spells:1:New", "SpellName:2:Added"]).unwrap();

        let outcome =
            apply_manual_entries(&mut container, &entries, &MergeOptions::default()).unwrap();

        let log = outcome.log().unwrap();
        assert_eq!(log.count(ChangeKind::Updated), 1);
        assert_eq!(log.count(ChangeKind::Added), 1);
        assert_eq!(
            log.iter().next().unwrap().description,
            "Updated Entry ID 1 in Spells.fmg"
        );
    }
}
