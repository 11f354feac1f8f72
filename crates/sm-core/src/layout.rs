//! Texture-atlas layout merging

use crate::container::{successor_slot, Body, Container, ResourceKind, SubResource};
use crate::error::{Error, Result};
use crate::merge::{
    dedup_first_wins, merge_entries, Change, ChangeLog, MergeOptions, MergeOutcome, MergeStrategy,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// An atlas layout: named regions of one texture sheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Atlas {
    /// Texture sheet the regions refer to
    #[serde(default)]
    pub image_path: String,
    pub sub_textures: Vec<SubTexture>,
}

impl Atlas {
    pub fn find(&self, name: &str) -> Option<&SubTexture> {
        self.sub_textures
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// A named region of an atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTexture {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default)]
    pub half: bool,
}

impl SubTexture {
    fn same_geometry(&self, other: &SubTexture) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.width == other.width
            && self.height == other.height
            && self.half == other.half
    }
}

/// A layout read from an incoming `.layout` file
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingLayout {
    pub file_name: String,
    pub atlas: Atlas,
}

struct SubTextureStrategy;

impl MergeStrategy for SubTextureStrategy {
    type Entry = SubTexture;
    type Key = String;

    fn key(entry: &SubTexture) -> String {
        entry.name.to_lowercase()
    }

    fn describe(entry: &SubTexture) -> String {
        format!("SubTexture {}", entry.name)
    }

    fn equals(existing: &SubTexture, incoming: &SubTexture) -> bool {
        existing.same_geometry(incoming)
    }

    fn apply_update(existing: &mut SubTexture, incoming: SubTexture) {
        existing.x = incoming.x;
        existing.y = incoming.y;
        existing.width = incoming.width;
        existing.height = incoming.height;
        existing.half = incoming.half;
    }

    fn sort(entries: &mut [SubTexture]) {
        entries.sort_by_cached_key(|s| s.name.to_lowercase());
    }
}

/// Merge incoming layouts into the layouts of `container`
///
/// Layouts with no matching sub-resource are appended whole. Diff mode does not
/// apply to layouts and is ignored.
pub fn merge_layouts(
    container: &mut Container,
    incoming: Vec<IncomingLayout>,
    options: &MergeOptions,
) -> Result<MergeOutcome> {
    let mut log = ChangeLog::new();

    for item in incoming {
        match container.position_by_file_name(ResourceKind::Layout, &item.file_name) {
            Some(idx) => {
                let sub = &mut container.sub_resources[idx];
                let label = sub.file_name().to_string();
                if let Body::Layout(atlas) = &mut sub.body {
                    merge_entries::<SubTextureStrategy>(
                        &mut atlas.sub_textures,
                        item.atlas.sub_textures,
                        options.policy,
                        &label,
                        &mut log,
                    );
                }
            }
            None => {
                let slot = successor_slot(container, ResourceKind::Layout)
                    .ok_or(Error::EmptyContainer(ResourceKind::Layout.as_str()))?;
                let sub_name = slot.name_for(&item.file_name);
                let mut atlas = Atlas {
                    image_path: item.atlas.image_path,
                    sub_textures: dedup_first_wins::<SubTextureStrategy>(item.atlas.sub_textures),
                };
                SubTextureStrategy::sort(&mut atlas.sub_textures);

                info!(name = %sub_name, id = slot.id, "appending new layout");
                log.push(Change::appended(&sub_name, &container.label()));
                container.sub_resources.push(SubResource {
                    name: sub_name,
                    id: slot.id,
                    flags: slot.flags,
                    body: Body::Layout(atlas),
                });
            }
        }
    }

    Ok(MergeOutcome::from_log(log))
}
