//! Write-then-rename helpers.
//!
//! Content is written to a [`tempfile`] in the target's directory and
//! persisted over the final name. A failed write removes its temporary; a
//! crash leaves at most a stray `.xgo-tmp-*` file next to the target, never
//! a truncated file under the target's name.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::error::CacheError;

/// Prefix of temporary files created next to their targets.
pub const TMP_PREFIX: &str = ".xgo-tmp-";

fn parent_of(target: &Path) -> Result<&Path, CacheError> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    Ok(parent)
}

fn temp_in(parent: &Path) -> Result<NamedTempFile, CacheError> {
    Builder::new()
        .prefix(TMP_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| CacheError::io(parent, e))
}

fn persist<F>(tmp: NamedTempFile<F>, target: &Path) -> Result<(), CacheError> {
    tmp.persist(target)
        .map(drop)
        .map_err(|e| CacheError::io(target, e.error))
}

/// Atomically replaces `target` with `data`.
pub fn write_atomic(target: &Path, data: &[u8]) -> Result<(), CacheError> {
    let mut tmp = temp_in(parent_of(target)?)?;
    tmp.write_all(data)
        .and_then(|_| tmp.as_file().sync_data())
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    persist(tmp, target)
}

/// Atomically replaces `target` with a copy of `source`, permissions included.
pub fn copy_atomic(source: &Path, target: &Path) -> Result<(), CacheError> {
    let mut tmp = temp_in(parent_of(target)?)?;
    let mut src = File::open(source).map_err(|e| CacheError::io(source, e))?;
    let perms = src
        .metadata()
        .map_err(|e| CacheError::io(source, e))?
        .permissions();
    std::io::copy(&mut src, tmp.as_file_mut()).map_err(|e| CacheError::io(source, e))?;
    tmp.as_file()
        .set_permissions(perms)
        .map_err(|e| CacheError::io(tmp.path(), e))?;
    persist(tmp, target)
}

/// Atomically replaces `target` with a symbolic link to `link_target`.
#[cfg(unix)]
pub fn symlink_atomic(link_target: &Path, target: &Path) -> Result<(), CacheError> {
    let parent = parent_of(target)?;
    let tmp = Builder::new()
        .prefix(TMP_PREFIX)
        .make_in(parent, |path| std::os::unix::fs::symlink(link_target, path))
        .map_err(|e| CacheError::io(parent, e))?;
    persist(tmp, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn write_creates_parents_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a/b/c.txt");
        write_atomic(&target, b"hello").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("f");
        write_atomic(&target, b"one").unwrap();
        write_atomic(&target, b"two").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"two");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        write_atomic(&dir.path().join("x"), b"1").unwrap();
        copy_atomic(&dir.path().join("x"), &dir.path().join("y")).unwrap();
        let stray: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TMP_PREFIX))
            .collect();
        assert!(stray.is_empty());
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/compile");
        assert!(copy_atomic(&dir.path().join("missing"), &target).is_err());
        assert!(!target.exists());
        let left: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .collect();
        assert!(left.is_empty(), "stray files: {left:?}");
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_exec_bit() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("go");
        std::fs::write(&src, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o755)).unwrap();
        let dst = dir.path().join("bin/go");
        copy_atomic(&src, &dst).unwrap();
        let mode = std::fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("link");
        std::fs::write(&target, "old").unwrap();
        symlink_atomic(Path::new("elsewhere"), &target).unwrap();
        assert_eq!(
            std::fs::read_link(&target).unwrap(),
            PathBuf::from("elsewhere")
        );
    }
}
