//! Backup-safe writing of mutated files
//!
//! The new bytes go to `<dest>.tmp` first. Any file already at the destination
//! is then renamed to `<dest>.prev`, replacing an older backup, and the
//! temporary file takes its place. If a step fails the backup stays where it
//! is and the error is returned.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Suffix of the most recent prior revision of a written file
pub const BACKUP_SUFFIX: &str = ".prev";

/// Suffix of the transient file written before the final rename
pub const TEMP_SUFFIX: &str = ".tmp";

/// Where a file loaded from `original` should be written
///
/// With no output path the original is overwritten. An output directory
/// receives a file with the original's name; any other output path is used
/// verbatim.
pub fn resolve_destination(original: &Path, output: Option<&Path>) -> Result<PathBuf> {
    match output {
        None => Ok(original.to_path_buf()),
        Some(out) if out.is_dir() => {
            let file_name = original
                .file_name()
                .ok_or_else(|| Error::InvalidPath(original.to_path_buf()))?;
            Ok(out.join(file_name))
        }
        Some(out) => Ok(out.to_path_buf()),
    }
}

/// `path` with `suffix` appended to its file name
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `bytes` for a file loaded from `original`, keeping a `.prev` backup
///
/// Returns the path written.
pub fn persist(bytes: &[u8], original: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let dest = resolve_destination(original, output)?;
    let temp = with_suffix(&dest, TEMP_SUFFIX);
    let backup = with_suffix(&dest, BACKUP_SUFFIX);

    fs::write(&temp, bytes).map_err(|e| discard_temp(&temp, &temp, e))?;

    if dest.exists() {
        if backup.exists() {
            fs::remove_file(&backup).map_err(|e| discard_temp(&temp, &backup, e))?;
        }
        fs::rename(&dest, &backup).map_err(|e| discard_temp(&temp, &backup, e))?;
        debug!(backup = %backup.display(), "backed up previous revision");
    }

    fs::rename(&temp, &dest).map_err(|e| discard_temp(&temp, &dest, e))?;

    info!(path = %dest.display(), bytes = bytes.len(), "wrote file");
    Ok(dest)
}

/// Remove the transient file after a failed step and wrap the cause
fn discard_temp(temp: &Path, failed: &Path, source: io::Error) -> Error {
    let _ = fs::remove_file(temp);
    Error::Persist {
        path: failed.to_path_buf(),
        source,
    }
}

/// Write a side artifact into `dir` without touching any backup
pub fn write_artifact(bytes: &[u8], dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    fs::write(&path, bytes).map_err(|e| Error::Persist {
        path: path.clone(),
        source: e,
    })?;
    info!(path = %path.display(), "wrote artifact");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("item.msgbnd.dcx");
        fs::write(&original, b"old").unwrap();

        let written = persist(b"new", &original, None).unwrap();

        assert_eq!(written, original);
        assert_eq!(fs::read(&original).unwrap(), b"new");
        assert_eq!(fs::read(dir.path().join("item.msgbnd.dcx.prev")).unwrap(), b"old");
        assert!(!dir.path().join("item.msgbnd.dcx.tmp").exists());
    }

    #[test]
    fn test_stale_backup_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("menu.tpf");
        fs::write(&original, b"v2").unwrap();
        fs::write(dir.path().join("menu.tpf.prev"), b"v1").unwrap();

        persist(b"v3", &original, None).unwrap();

        assert_eq!(fs::read(dir.path().join("menu.tpf.prev")).unwrap(), b"v2");
    }

    #[test]
    fn test_output_directory_uses_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let original = dir.path().join("c0000.anibnd.dcx");
        fs::write(&original, b"old").unwrap();

        let written = persist(b"new", &original, Some(out.path())).unwrap();

        assert_eq!(written, out.path().join("c0000.anibnd.dcx"));
        assert_eq!(fs::read(&original).unwrap(), b"old");
        assert!(!dir.path().join("c0000.anibnd.dcx.prev").exists());
    }

    #[test]
    fn test_output_file_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.bin");
        let target = dir.path().join("renamed.bin");

        let written = persist(b"data", &original, Some(&target)).unwrap();

        assert_eq!(written, target);
        assert_eq!(fs::read(&target).unwrap(), b"data");
    }

    #[test]
    fn test_failed_write_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no_such_dir").join("file.bin");

        let err = persist(b"data", &missing, None).unwrap_err();
        assert!(matches!(err, Error::Persist { .. }));
    }

    #[test]
    fn test_failed_backup_keeps_original_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("menu.tpf");
        fs::write(&original, b"v1").unwrap();
        // A stale backup that cannot be removed as a file
        let backup = dir.path().join("menu.tpf.prev");
        fs::create_dir(&backup).unwrap();
        fs::write(backup.join("keep"), b"x").unwrap();

        let err = persist(b"v2", &original, None).unwrap_err();

        assert!(matches!(err, Error::Persist { ref path, .. } if *path == backup));
        assert_eq!(fs::read(&original).unwrap(), b"v1");
        assert!(!dir.path().join("menu.tpf.tmp").exists());
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("dir/menu.tpf.dcx"), BACKUP_SUFFIX),
            PathBuf::from("dir/menu.tpf.dcx.prev")
        );
    }
}
