//! Raw texture pack merging
//!
//! A texture pack is flat: each texture is itself the merged entry. Image bytes
//! are opaque, so a name match always counts as a conflict.

use crate::merge::{merge_entries, ChangeLog, MergeOptions, MergeOutcome, MergeStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Framing a pack was stored with; replicated when the pack is written back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Zlib,
}

/// A flat pack of named textures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TexturePack {
    pub textures: Vec<Texture>,
    #[serde(skip)]
    pub compression: Compression,
}

impl TexturePack {
    pub fn find(&self, name: &str) -> Option<&Texture> {
        self.textures
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// A named image blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub name: String,
    pub format: u8,
    pub flags: u8,
    pub data: Vec<u8>,
}

/// An image read from an incoming `.dds` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingTexture {
    /// File stem of the image
    pub name: String,
    pub data: Vec<u8>,
}

struct TextureStrategy;

impl MergeStrategy for TextureStrategy {
    type Entry = Texture;
    type Key = String;

    fn key(entry: &Texture) -> String {
        entry.name.to_lowercase()
    }

    fn describe(entry: &Texture) -> String {
        format!("Texture {}", entry.name)
    }

    fn equals(_existing: &Texture, _incoming: &Texture) -> bool {
        false
    }

    fn apply_update(existing: &mut Texture, incoming: Texture) {
        existing.name = incoming.name;
        existing.data = incoming.data;
    }
}

/// Format and flag bytes for textures added to `pack`, copied from its last texture
fn successor_format(pack: &TexturePack) -> (u8, u8) {
    match pack.textures.last() {
        Some(last) => (last.format, last.flags),
        None => {
            warn!("texture pack is empty, new textures get zero format and flags");
            (0, 0)
        }
    }
}

/// Merge incoming images into `pack`
///
/// `label` names the pack in change log records.
pub fn merge_textures(
    pack: &mut TexturePack,
    incoming: Vec<IncomingTexture>,
    options: &MergeOptions,
    label: &str,
) -> MergeOutcome {
    let (format, flags) = successor_format(pack);
    let entries = incoming
        .into_iter()
        .map(|t| Texture {
            name: t.name,
            format,
            flags,
            data: t.data,
        })
        .collect();

    let mut log = ChangeLog::new();
    merge_entries::<TextureStrategy>(&mut pack.textures, entries, options.policy, label, &mut log);
    MergeOutcome::from_log(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ChangeKind, ConflictPolicy};

    fn pack() -> TexturePack {
        TexturePack {
            textures: vec![Texture {
                name: "tex_a".to_string(),
                format: 102,
                flags: 0,
                data: vec![1, 2, 3],
            }],
            compression: Compression::Zlib,
        }
    }

    fn image(name: &str, data: &[u8]) -> IncomingTexture {
        IncomingTexture {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_update_and_add() {
        let mut pack = pack();
        let incoming = vec![image("tex_a", &[9, 9]), image("tex_b", &[4])];

        let outcome = merge_textures(&mut pack, incoming, &MergeOptions::default(), "menu.tpf");

        assert_eq!(outcome.count(ChangeKind::Updated), 1);
        assert_eq!(outcome.count(ChangeKind::Added), 1);
        assert_eq!(pack.find("tex_a").unwrap().data, vec![9, 9]);
        let added = pack.find("TEX_B").unwrap();
        assert_eq!(added.format, 102);
        assert_eq!(pack.compression, Compression::Zlib);
    }

    #[test]
    fn test_identical_bytes_still_update() {
        let mut pack = pack();
        let outcome = merge_textures(
            &mut pack,
            vec![image("TEX_A", &[1, 2, 3])],
            &MergeOptions::default(),
            "menu.tpf",
        );
        assert_eq!(outcome.count(ChangeKind::Updated), 1);
    }

    #[test]
    fn test_ignore_conflicts() {
        let mut pack = pack();
        let options = MergeOptions::new(ConflictPolicy::IgnoreConflicting);

        let outcome = merge_textures(&mut pack, vec![image("tex_a", &[7])], &options, "menu.tpf");

        assert_eq!(outcome, MergeOutcome::Unchanged);
        assert_eq!(pack.find("tex_a").unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_pack_uses_zero_format() {
        let mut pack = TexturePack::default();
        merge_textures(&mut pack, vec![image("first", &[1])], &MergeOptions::default(), "x.tpf");
        assert_eq!(pack.textures[0].format, 0);
    }
}
