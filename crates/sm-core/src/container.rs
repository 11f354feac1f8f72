//! Container and sub-resource types

use crate::anim::AnimationBank;
use crate::layout::Atlas;
use crate::text::TextBank;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An ordered list of named, id'd sub-resources loaded from one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pub sub_resources: Vec<SubResource>,
    /// File this container was loaded from
    #[serde(skip)]
    pub source_path: PathBuf,
}

impl Container {
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            sub_resources: Vec::new(),
            source_path,
        }
    }

    pub fn len(&self) -> usize {
        self.sub_resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_resources.is_empty()
    }

    /// File name used to label changes made to this container
    pub fn label(&self) -> String {
        display_name(&self.source_path)
    }

    /// Index of the first sub-resource of `kind` whose file name matches, ignoring case
    pub fn position_by_file_name(&self, kind: ResourceKind, file_name: &str) -> Option<usize> {
        self.sub_resources
            .iter()
            .position(|s| s.kind() == kind && s.file_name().eq_ignore_ascii_case(file_name))
    }
}

/// One independently decodable unit inside a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubResource {
    /// Path-like name, e.g. `N:\GR\data\Menu\a00.tae`
    pub name: String,
    pub id: i32,
    pub flags: u8,
    pub body: Body,
}

impl SubResource {
    pub fn kind(&self) -> ResourceKind {
        self.body.kind()
    }

    /// Last component of the path-like name
    pub fn file_name(&self) -> &str {
        match self.name.rfind(['\\', '/']) {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// Everything before the last separator, separator included
    pub fn directory(&self) -> &str {
        match self.name.rfind(['\\', '/']) {
            Some(idx) => &self.name[..=idx],
            None => "",
        }
    }
}

/// Decoded contents of a sub-resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Body {
    Text(TextBank),
    Animation(AnimationBank),
    Layout(Atlas),
    Raw(Vec<u8>),
}

impl Body {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Body::Text(_) => ResourceKind::Text,
            Body::Animation(_) => ResourceKind::Animation,
            Body::Layout(_) => ResourceKind::Layout,
            Body::Raw(_) => ResourceKind::Raw,
        }
    }
}

/// Structural kind of a sub-resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Text,
    Animation,
    Layout,
    Raw,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Text => "text bank",
            ResourceKind::Animation => "animation bank",
            ResourceKind::Layout => "layout",
            ResourceKind::Raw => "raw file",
        }
    }
}

/// Id, flags and directory for a sub-resource about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: i32,
    pub flags: u8,
    directory: String,
}

impl Slot {
    /// Full sub-resource name for `file_name` placed next to its siblings
    pub fn name_for(&self, file_name: &str) -> String {
        format!("{}{}", self.directory, file_name)
    }
}

/// Derive where a new sub-resource of `kind` goes
///
/// Flags are copied from the last existing sub-resource of that kind, the id is
/// one past the highest id of that kind, and the directory is taken from the
/// first one. Returns `None` when the container has nothing of that kind.
pub fn successor_slot(container: &Container, kind: ResourceKind) -> Option<Slot> {
    let mut same_kind = container.sub_resources.iter().filter(|s| s.kind() == kind);
    let first = same_kind.next()?;

    let mut last = first;
    let mut highest = first.id;
    for sub in same_kind {
        highest = highest.max(sub.id);
        last = sub;
    }

    Some(Slot {
        id: highest + 1,
        flags: last.flags,
        directory: first.directory().to_string(),
    })
}

/// File name of a path as a display string
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, id: i32, flags: u8) -> SubResource {
        SubResource {
            name: name.to_string(),
            id,
            flags,
            body: Body::Raw(Vec::new()),
        }
    }

    #[test]
    fn test_file_name_and_directory() {
        let sub = raw("N:\\GR\\data\\chr\\c0000.tae", 1, 0);
        assert_eq!(sub.file_name(), "c0000.tae");
        assert_eq!(sub.directory(), "N:\\GR\\data\\chr\\");

        let bare = raw("c0000.tae", 1, 0);
        assert_eq!(bare.file_name(), "c0000.tae");
        assert_eq!(bare.directory(), "");
    }

    #[test]
    fn test_successor_slot() {
        let mut container = Container::new(PathBuf::from("c0000.anibnd"));
        container.sub_resources.push(raw("N:\\data\\a.bin", 7, 0x40));
        container.sub_resources.push(raw("N:\\data\\b.bin", 3, 0x02));

        let slot = successor_slot(&container, ResourceKind::Raw).unwrap();
        assert_eq!(slot.id, 8);
        assert_eq!(slot.flags, 0x02);
        assert_eq!(slot.name_for("c.bin"), "N:\\data\\c.bin");
    }

    #[test]
    fn test_successor_slot_missing_kind() {
        let mut container = Container::new(PathBuf::from("menu.sblytbnd"));
        container.sub_resources.push(raw("a.bin", 1, 0));
        assert!(successor_slot(&container, ResourceKind::Layout).is_none());
    }

    #[test]
    fn test_position_by_file_name_ignores_case() {
        let mut container = Container::new(PathBuf::from("x.bnd"));
        container.sub_resources.push(raw("N:\\data\\Icons.bin", 1, 0));
        assert_eq!(
            container.position_by_file_name(ResourceKind::Raw, "icons.BIN"),
            Some(0)
        );
        assert_eq!(
            container.position_by_file_name(ResourceKind::Text, "icons.bin"),
            None
        );
    }
}
