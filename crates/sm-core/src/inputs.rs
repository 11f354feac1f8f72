//! Discovery of incoming files from command-line paths

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Extensions accepted for exported text fragments
pub const TEXT_EXTENSIONS: &[&str] = &[".json"];
/// Extensions accepted for animation banks and partial banks
pub const ANIMATION_EXTENSIONS: &[&str] = &[".tae", ".tae.partial"];
/// Extensions accepted for atlas layouts
pub const LAYOUT_EXTENSIONS: &[&str] = &[".layout"];
/// Extensions accepted for raw images
pub const TEXTURE_EXTENSIONS: &[&str] = &[".dds"];
/// Extensions accepted for row-edit CSVs
pub const CSV_EXTENSIONS: &[&str] = &[".csv", ".txt"];
/// Extensions accepted for edit scripts
pub const SCRIPT_EXTENSIONS: &[&str] = &[".txt", ".massedit"];

/// Files accepted for a merge, plus the paths that were skipped
#[derive(Debug, Clone, Default)]
pub struct InputSet {
    pub files: Vec<PathBuf>,
    /// Missing paths and files with an unexpected extension
    pub skipped: Vec<PathBuf>,
}

/// Whether the file name of `path` ends with one of `extensions`, ignoring case
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext))
}

/// Expand `paths` into the files to merge
///
/// A directory contributes its direct children with an accepted extension,
/// in file name order. Anything else that is not an existing file with an
/// accepted extension is skipped with a warning.
pub fn collect_inputs<P: AsRef<Path>>(paths: &[P], extensions: &[&str]) -> Result<InputSet> {
    let mut set = InputSet::default();

    for path in paths {
        let path = path.as_ref();

        if path.is_dir() {
            for entry in WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                accept(entry.path(), extensions, &mut set);
            }
        } else {
            accept(path, extensions, &mut set);
        }
    }

    Ok(set)
}

fn accept(path: &Path, extensions: &[&str], set: &mut InputSet) {
    if path.is_file() && has_extension(path, extensions) {
        set.files.push(path.to_path_buf());
    } else {
        warn!(path = %path.display(), "could not open input file, skipping");
        set.skipped.push(path.to_path_buf());
    }
}
