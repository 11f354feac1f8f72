//! Animation bank merging and partial-bank diffing

use crate::container::{successor_slot, Body, Container, ResourceKind, SubResource};
use crate::error::{Error, Result};
use crate::merge::{
    dedup_first_wins, diff_entries, merge_entries, Change, ChangeLog, MergeOptions, MergeOutcome,
    MergeStrategy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Suffix carried by banks produced in diff mode
pub const PARTIAL_SUFFIX: &str = ".partial";

/// A bank of animation clips, kept sorted by clip id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationBank {
    pub clips: Vec<Clip>,
}

impl AnimationBank {
    pub fn get(&self, id: i64) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }
}

/// One animation clip with its timed events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: i64,
    #[serde(default)]
    pub file_name: Option<String>,
    pub frame_count: u32,
    pub events: Vec<ClipEvent>,
}

/// A timed event inside a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEvent {
    pub event_type: i32,
    pub start_time: f32,
    pub end_time: f32,
    #[serde(default)]
    pub params: Vec<u8>,
}

/// An animation bank read from an incoming file
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingAnimation {
    /// File name, possibly carrying [`PARTIAL_SUFFIX`]
    pub file_name: String,
    pub bank: AnimationBank,
}

impl IncomingAnimation {
    /// Name of the bank this file targets, without the partial suffix
    pub fn bank_name(&self) -> &str {
        self.file_name
            .strip_suffix(PARTIAL_SUFFIX)
            .unwrap_or(&self.file_name)
    }
}

/// Filtered copy of an incoming bank holding only clips upstream lacks
#[derive(Debug, Clone, PartialEq)]
pub struct PartialBank {
    /// Target bank name; written out as `<name>.partial`
    pub name: String,
    pub bank: AnimationBank,
}

impl PartialBank {
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, PARTIAL_SUFFIX)
    }
}

/// Outcome of an animation merge or diff
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationMerge {
    pub outcome: MergeOutcome,
    /// Diff-mode artifacts; always empty when merging
    pub partials: Vec<PartialBank>,
}

struct ClipStrategy;

impl MergeStrategy for ClipStrategy {
    type Entry = Clip;
    type Key = i64;

    fn key(entry: &Clip) -> i64 {
        entry.id
    }

    fn describe(entry: &Clip) -> String {
        format!("Animation ID {}", entry.id)
    }

    fn equals(existing: &Clip, incoming: &Clip) -> bool {
        existing == incoming
    }

    fn apply_update(existing: &mut Clip, incoming: Clip) {
        *existing = incoming;
    }

    fn sort(entries: &mut [Clip]) {
        entries.sort_by_key(|c| c.id);
    }
}

/// Merge incoming animation banks into `container`, or diff them against it
///
/// When merging, a bank with no matching sub-resource is appended whole as a
/// new sub-resource. In diff mode the container is left untouched and every
/// clip already present upstream unchanged is stripped from a copy of the
/// incoming bank; a copy left with no clips is discarded.
pub fn merge_animations(
    container: &mut Container,
    incoming: Vec<IncomingAnimation>,
    options: &MergeOptions,
) -> Result<AnimationMerge> {
    let mut log = ChangeLog::new();
    let mut partials = Vec::new();

    for item in incoming {
        let name = item.bank_name().to_string();
        let position = container.position_by_file_name(ResourceKind::Animation, &name);

        match position {
            Some(idx) => {
                let Body::Animation(existing) = &mut container.sub_resources[idx].body else {
                    continue;
                };

                if options.diff_mode {
                    let mut file_log = ChangeLog::new();
                    let kept = diff_entries::<ClipStrategy>(
                        &existing.clips,
                        item.bank.clips,
                        &name,
                        &mut file_log,
                    );
                    let stripped = !file_log.is_empty();
                    log.extend(file_log);

                    if !stripped {
                        debug!(bank = %name, "no clips match upstream, no partial produced");
                    } else if kept.is_empty() {
                        log.push(Change::removed("all animations", &name));
                    } else {
                        partials.push(PartialBank {
                            name,
                            bank: AnimationBank { clips: kept },
                        });
                    }
                } else {
                    merge_entries::<ClipStrategy>(
                        &mut existing.clips,
                        item.bank.clips,
                        options.policy,
                        &name,
                        &mut log,
                    );
                }
            }
            None if options.diff_mode => {
                debug!(bank = %name, "no upstream bank to diff against");
            }
            None => {
                let slot = successor_slot(container, ResourceKind::Animation)
                    .ok_or(Error::EmptyContainer(ResourceKind::Animation.as_str()))?;
                let sub_name = slot.name_for(&name);
                let mut bank = AnimationBank {
                    clips: dedup_first_wins::<ClipStrategy>(item.bank.clips),
                };
                ClipStrategy::sort(&mut bank.clips);

                info!(name = %sub_name, id = slot.id, "appending new animation bank");
                log.push(Change::appended(&sub_name, &container.label()));
                container.sub_resources.push(SubResource {
                    name: sub_name,
                    id: slot.id,
                    flags: slot.flags,
                    body: Body::Animation(bank),
                });
            }
        }
    }

    Ok(AnimationMerge {
        outcome: MergeOutcome::from_log(log),
        partials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ChangeKind, ConflictPolicy};
    use std::path::PathBuf;

    fn clip(id: i64, frames: u32) -> Clip {
        Clip {
            id,
            file_name: None,
            frame_count: frames,
            events: vec![ClipEvent {
                event_type: 0,
                start_time: 0.0,
                end_time: 0.5,
                params: vec![1, 2],
            }],
        }
    }

    fn anim_container(clips: Vec<Clip>) -> Container {
        let mut container = Container::new(PathBuf::from("c0000.anibnd.dcx"));
        container.sub_resources.push(SubResource {
            name: "N:\\GR\\data\\chr\\c0000\\tae\\a00.tae".to_string(),
            id: 5000000,
            flags: 0x40,
            body: Body::Animation(AnimationBank { clips }),
        });
        container
    }

    fn incoming(file_name: &str, clips: Vec<Clip>) -> IncomingAnimation {
        IncomingAnimation {
            file_name: file_name.to_string(),
            bank: AnimationBank { clips },
        }
    }

    fn clips(container: &Container, idx: usize) -> &[Clip] {
        match &container.sub_resources[idx].body {
            Body::Animation(bank) => &bank.clips,
            _ => panic!("expected animation bank"),
        }
    }

    #[test]
    fn test_merge_keeps_clips_sorted() {
        let mut container = anim_container(vec![clip(10, 30), clip(30, 30)]);
        let files = vec![incoming("A00.tae", vec![clip(20, 15), clip(5, 15)])];

        let result = merge_animations(&mut container, files, &MergeOptions::default()).unwrap();

        assert_eq!(result.outcome.count(ChangeKind::Added), 2);
        let ids: Vec<i64> = clips(&container, 0).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 10, 20, 30]);
    }

    #[test]
    fn test_merge_updates_changed_clip() {
        let mut container = anim_container(vec![clip(10, 30)]);
        let files = vec![incoming("a00.tae.partial", vec![clip(10, 45)])];

        let result = merge_animations(&mut container, files, &MergeOptions::default()).unwrap();

        assert_eq!(result.outcome.count(ChangeKind::Updated), 1);
        assert_eq!(clips(&container, 0)[0].frame_count, 45);
    }

    #[test]
    fn test_ignore_conflicts_leaves_clip() {
        let mut container = anim_container(vec![clip(10, 30)]);
        let files = vec![incoming("a00.tae", vec![clip(10, 45)])];
        let options = MergeOptions::new(ConflictPolicy::IgnoreConflicting);

        let result = merge_animations(&mut container, files, &options).unwrap();

        assert_eq!(result.outcome.count(ChangeKind::Updated), 0);
        assert_eq!(clips(&container, 0)[0].frame_count, 30);
    }

    #[test]
    fn test_unknown_bank_appended() {
        let mut container = anim_container(vec![clip(10, 30)]);
        let files = vec![incoming("a01.tae", vec![clip(2, 1), clip(1, 1)])];

        let result = merge_animations(&mut container, files, &MergeOptions::default()).unwrap();

        assert_eq!(result.outcome.count(ChangeKind::Appended), 1);
        let added = &container.sub_resources[1];
        assert_eq!(added.name, "N:\\GR\\data\\chr\\c0000\\tae\\a01.tae");
        assert_eq!(added.id, 5000001);
        assert_eq!(added.flags, 0x40);
        assert_eq!(clips(&container, 1)[0].id, 1);
    }

    #[test]
    fn test_diff_discards_fully_matching_bank() {
        let mut container = anim_container(vec![clip(5, 30)]);
        let files = vec![incoming("a00.tae", vec![clip(5, 30)])];

        let result = merge_animations(&mut container, files, &MergeOptions::diff()).unwrap();

        assert!(result.partials.is_empty());
        assert_eq!(result.outcome.count(ChangeKind::Removed), 2);
        assert_eq!(clips(&container, 0).len(), 1);
    }

    #[test]
    fn test_diff_keeps_only_new_or_changed() {
        let before = anim_container(vec![clip(5, 30), clip(6, 30)]);
        let mut container = before.clone();
        let files = vec![incoming("a00.tae", vec![clip(5, 30), clip(6, 12), clip(7, 1)])];

        let result = merge_animations(&mut container, files, &MergeOptions::diff()).unwrap();

        assert_eq!(result.partials.len(), 1);
        let partial = &result.partials[0];
        assert_eq!(partial.file_name(), "a00.tae.partial");
        for kept in &partial.bank.clips {
            assert!(clips(&before, 0).iter().all(|c| c != kept));
        }
        let ids: Vec<i64> = partial.bank.clips.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![6, 7]);
        assert_eq!(container.sub_resources, before.sub_resources);
    }

    #[test]
    fn test_appended_bank_drops_duplicate_ids() {
        let mut container = anim_container(vec![clip(10, 30)]);
        let files = vec![incoming("a01.tae", vec![clip(1, 10), clip(1, 99), clip(0, 5)])];

        merge_animations(&mut container, files, &MergeOptions::default()).unwrap();

        let appended: Vec<(i64, u32)> = clips(&container, 1)
            .iter()
            .map(|c| (c.id, c.frame_count))
            .collect();
        assert_eq!(appended, vec![(0, 5), (1, 10)]);
    }

    #[test]
    fn test_diff_of_empty_bank_is_unchanged() {
        let mut container = anim_container(vec![clip(5, 30)]);
        let files = vec![incoming("a00.tae", Vec::new())];

        let result = merge_animations(&mut container, files, &MergeOptions::diff()).unwrap();

        assert_eq!(result.outcome, MergeOutcome::Unchanged);
        assert!(result.partials.is_empty());
    }

    #[test]
    fn test_append_requires_existing_bank() {
        let mut container = Container::new(PathBuf::from("empty.anibnd"));
        let files = vec![incoming("a00.tae", vec![clip(1, 1)])];

        let err = merge_animations(&mut container, files, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyContainer(_)));
    }
}
