use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use same_file::is_same_file;
use walkdir::WalkDir;

use crate::error::{is_disk_full, SyncError};

fn create_dir_error(path: &Path, e: std::io::Error) -> SyncError {
    if is_disk_full(&e) {
        return SyncError::DiskFull {
            path: path.to_path_buf(),
        };
    }
    SyncError::CreateDirFailed {
        path: path.to_path_buf(),
        source: e,
    }
}

/// Create a directory and any missing parents; existing directories are fine
pub fn ensure_dir(path: &Path) -> Result<(), SyncError> {
    fs::create_dir_all(path).map_err(|e| create_dir_error(path, e))
}

/// Apply source permissions and access/modification times to `dst`
fn apply_metadata(src_meta: &Metadata, dst: &Path) -> Result<(), SyncError> {
    let metadata_error = |e| SyncError::MetadataFailed {
        path: dst.to_path_buf(),
        source: e,
    };

    fs::set_permissions(dst, src_meta.permissions()).map_err(metadata_error)?;

    let atime = FileTime::from_last_access_time(src_meta);
    let mtime = FileTime::from_last_modification_time(src_meta);
    filetime::set_file_times(dst, atime, mtime).map_err(metadata_error)
}

fn canonical(path: &Path) -> Result<PathBuf, SyncError> {
    path.canonicalize().map_err(|e| SyncError::MetadataFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Copy a single file from src to dst, overwriting dst and preserving metadata
///
/// Fails with [`SyncError::SameFile`] when dst already refers to src, since
/// opening dst for writing would truncate the source.
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64, SyncError> {
    if matches!(is_same_file(src, dst), Ok(true)) {
        return Err(SyncError::SameFile {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            ensure_dir(parent)?;
        }
    }

    let bytes = fs::copy(src, dst).map_err(|e| {
        if is_disk_full(&e) {
            return SyncError::DiskFull {
                path: dst.to_path_buf(),
            };
        }
        SyncError::CopyFailed {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
            source: e,
        }
    })?;

    let src_meta = fs::metadata(src).map_err(|e| SyncError::MetadataFailed {
        path: src.to_path_buf(),
        source: e,
    })?;
    apply_metadata(&src_meta, dst)?;

    Ok(bytes)
}

/// Merge-copy a directory tree, returns (files_copied, bytes_copied)
///
/// Files at colliding relative paths are overwritten; anything present only
/// in `dst` is left alone. Symlinks are followed. The walk visits contents
/// before their directory so a directory's metadata is applied once nothing
/// else will be written into it.
pub fn copy_directory(src: &Path, dst: &Path) -> Result<(u64, u64), SyncError> {
    let mut files_copied = 0u64;
    let mut bytes_copied = 0u64;

    if matches!(is_same_file(src, dst), Ok(true)) {
        return Err(SyncError::SameFile {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    ensure_dir(dst)?;

    let src_root = canonical(src)?;
    let dst_root = canonical(dst)?;
    if dst_root.starts_with(&src_root) {
        return Err(SyncError::DestinationInsideSource {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    for entry in WalkDir::new(src).follow_links(true).contents_first(true) {
        let entry = entry.map_err(|e| SyncError::Walk {
            root: src.to_path_buf(),
            source: e,
        })?;

        let src_path = entry.path();
        let relative = src_path.strip_prefix(src).unwrap_or(src_path);
        let dst_path = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            ensure_dir(&dst_path)?;
            let src_meta = entry.metadata().map_err(|e| SyncError::Walk {
                root: src.to_path_buf(),
                source: e,
            })?;
            apply_metadata(&src_meta, &dst_path)?;
        } else if file_type.is_file() {
            let bytes = copy_file(src_path, &dst_path)?;
            tracing::debug!("Copied file {} to {}", src_path.display(), dst_path.display());
            files_copied += 1;
            bytes_copied += bytes;
        } else {
            tracing::warn!(
                "Skipping {}: neither a file nor a directory",
                src_path.display()
            );
        }
    }

    Ok((files_copied, bytes_copied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== copy_file tests ====================

    #[test]
    fn test_copy_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        std::fs::write(&src, "hello").unwrap();
        let dst = temp.path().join("out").join("nested").join("a.txt");

        let bytes = copy_file(&src, &dst).unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");
    }

    #[test]
    fn test_copy_file_overwrites() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dst = temp.path().join("b.txt");
        std::fs::write(&src, "new").unwrap();
        std::fs::write(&dst, "old content").unwrap();

        copy_file(&src, &dst).unwrap();

        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_copy_file_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dst = temp.path().join("b.txt");
        std::fs::write(&src, "same").unwrap();

        copy_file(&src, &dst).unwrap();
        copy_file(&src, &dst).unwrap();

        assert_eq!(std::fs::read(&dst).unwrap(), std::fs::read(&src).unwrap());
    }

    #[test]
    fn test_copy_file_preserves_mtime() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.txt");
        let dst = temp.path().join("b.txt");
        std::fs::write(&src, "timed").unwrap();
        let stamp = FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&src, stamp).unwrap();

        copy_file(&src, &dst).unwrap();

        let meta = std::fs::metadata(&dst).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), stamp);
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let src = temp.path().join("run.sh");
        let dst = temp.path().join("copy.sh");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o750)).unwrap();

        copy_file(&src, &dst).unwrap();

        let mode = std::fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn test_copy_file_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = copy_file(&temp.path().join("nope"), &temp.path().join("dst"));
        assert!(matches!(result, Err(SyncError::CopyFailed { .. })));
    }

    // ==================== copy_directory tests ====================

    #[test]
    fn test_copy_directory_nested() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("sub").join("deeper")).unwrap();
        std::fs::create_dir_all(src.join("empty")).unwrap();
        std::fs::write(src.join("top.txt"), "t").unwrap();
        std::fs::write(src.join("sub").join("deeper").join("leaf.txt"), "leaf").unwrap();
        let dst = temp.path().join("dst");

        let (files, bytes) = copy_directory(&src, &dst).unwrap();

        assert_eq!(files, 2);
        assert_eq!(bytes, 5);
        assert!(dst.join("top.txt").is_file());
        assert!(dst.join("sub").join("deeper").join("leaf.txt").is_file());
        assert!(dst.join("empty").is_dir());
    }

    #[test]
    fn test_copy_directory_merges_into_existing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(src.join("a.txt"), "from source").unwrap();
        std::fs::write(src.join("shared.txt"), "source wins").unwrap();
        std::fs::write(dst.join("b.txt"), "dest only").unwrap();
        std::fs::write(dst.join("shared.txt"), "stale").unwrap();

        let (files, _) = copy_directory(&src, &dst).unwrap();

        assert_eq!(files, 2);
        assert_eq!(std::fs::read_to_string(dst.join("a.txt")).unwrap(), "from source");
        assert_eq!(std::fs::read_to_string(dst.join("b.txt")).unwrap(), "dest only");
        assert_eq!(
            std::fs::read_to_string(dst.join("shared.txt")).unwrap(),
            "source wins"
        );
    }

    #[test]
    fn test_copy_directory_empty_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let dst = temp.path().join("dst");

        let (files, bytes) = copy_directory(&src, &dst).unwrap();

        assert_eq!((files, bytes), (0, 0));
        assert!(dst.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_follows_symlinks() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside.txt");
        std::fs::write(&outside, "linked").unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink(&outside, src.join("link.txt")).unwrap();
        let dst = temp.path().join("dst");

        copy_directory(&src, &dst).unwrap();

        let copied = dst.join("link.txt");
        assert!(!std::fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "linked");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_broken_symlink_is_fatal() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone"), src.join("dangling")).unwrap();
        let dst = temp.path().join("dst");

        let result = copy_directory(&src, &dst);

        assert!(matches!(result, Err(SyncError::Walk { .. })));
    }

    #[test]
    fn test_copy_directory_file_in_place_of_subdir_is_fatal() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("sub").join("x.txt"), "x").unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(dst.join("sub"), "a file where a dir should go").unwrap();

        let result = copy_directory(&src, &dst);

        assert!(result.is_err());
        assert_eq!(
            std::fs::read_to_string(dst.join("sub")).unwrap(),
            "a file where a dir should go"
        );
    }

    #[test]
    fn test_copy_file_onto_itself_keeps_content() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("x.txt");
        std::fs::write(&src, "precious").unwrap();

        let result = copy_file(&src, &temp.path().join(".").join("x.txt"));

        assert!(matches!(result, Err(SyncError::SameFile { .. })));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "precious");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_file_through_symlink_to_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("bashrc");
        std::fs::write(&src, "export EDITOR=vi").unwrap();
        let dst = temp.path().join(".bashrc");
        std::os::unix::fs::symlink(&src, &dst).unwrap();

        let result = copy_file(&src, &dst);

        assert!(matches!(result, Err(SyncError::SameFile { .. })));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "export EDITOR=vi");
    }

    #[test]
    fn test_copy_directory_onto_itself_keeps_content() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("f.txt"), "keep me").unwrap();

        let result = copy_directory(&dir, &temp.path().join(".").join("d"));

        assert!(matches!(result, Err(SyncError::SameFile { .. })));
        assert_eq!(std::fs::read_to_string(dir.join("f.txt")).unwrap(), "keep me");
    }

    #[test]
    fn test_copy_directory_into_own_subdirectory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tree");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("f.txt"), "f").unwrap();

        let result = copy_directory(&src, &src.join("nested"));

        assert!(matches!(
            result,
            Err(SyncError::DestinationInsideSource { .. })
        ));
        assert!(!src.join("nested").join("f.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_directory_file_linked_back_to_source() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(src.join("conf"), "original").unwrap();
        std::os::unix::fs::symlink(src.join("conf"), dst.join("conf")).unwrap();

        let result = copy_directory(&src, &dst);

        assert!(matches!(result, Err(SyncError::SameFile { .. })));
        assert_eq!(std::fs::read_to_string(src.join("conf")).unwrap(), "original");
    }

    // ==================== ensure_dir tests ====================

    #[test]
    fn test_ensure_dir_existing_is_ok() {
        let temp = TempDir::new().unwrap();
        ensure_dir(temp.path()).unwrap();
        ensure_dir(&temp.path().join("a").join("b")).unwrap();
        ensure_dir(&temp.path().join("a").join("b")).unwrap();
        assert!(temp.path().join("a").join("b").is_dir());
    }
}
