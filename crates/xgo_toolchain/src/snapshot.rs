//! Writable snapshot of an installed toolchain.
//!
//! The installed toolchain is mirrored into a private directory that the
//! patch stage may freely modify. Repeated syncs only copy entries whose
//! source changed since the previous sync, tracked by a [`SyncManifest`]
//! stored next to the snapshot. Each file is written through a sibling
//! temporary and renamed into place, and the manifest is saved last, so an
//! interrupted sync is simply redone by the next one.
//!
//! Directories that disappear from the source are removed from the snapshot
//! once the deleted files leave them empty. A directory still holding files
//! that the patch stage added is kept.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, trace};
use walkdir::WalkDir;
use xgo_cache::atomic::copy_atomic;
use xgo_cache::{FileRecord, FileStamp, SourceEntry, SourceHasher, SyncManifest};
use xgo_common::ContentHash;

use crate::error::ToolchainError;

/// Top-level directories of a Go installation that building and running the
/// compiler never reads.
const DEFAULT_EXCLUDED: &[&str] = &[".git", "test", "doc", "api"];

/// Counts of what a sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries copied from the source.
    pub copied: usize,
    /// Entries whose stamp was refreshed without copying.
    pub restamped: usize,
    /// Entries removed because they disappeared from the source.
    pub removed: usize,
    /// Entries left untouched.
    pub unchanged: usize,
}

/// Path of the sync manifest for a snapshot at `dest_root`:
/// a `<name>.sync.json` sibling of the snapshot directory.
pub fn manifest_path_for(dest_root: &Path) -> PathBuf {
    let name = dest_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    dest_root.with_file_name(format!("{name}.sync.json"))
}

/// Mirrors a toolchain tree into a private, writable directory.
pub struct ToolchainSnapshot {
    excluded: Vec<PathBuf>,
}

impl Default for ToolchainSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolchainSnapshot {
    /// A snapshot that skips the Go installation's test, doc and api trees.
    pub fn new() -> Self {
        Self {
            excluded: DEFAULT_EXCLUDED.iter().map(PathBuf::from).collect(),
        }
    }

    /// A snapshot that skips the given relative paths instead.
    pub fn with_excluded(excluded: Vec<PathBuf>) -> Self {
        Self { excluded }
    }

    /// Syncs `source_root` into `dest_root`.
    ///
    /// Only new or changed source entries are copied; entries deleted from
    /// the source are removed from the snapshot. Files added to the snapshot
    /// by other stages (the patch set) are never touched because they are
    /// not in the manifest. Any unreadable source entry is a hard error.
    pub fn sync(&self, source_root: &Path, dest_root: &Path) -> Result<SyncReport, ToolchainError> {
        let manifest_path = manifest_path_for(dest_root);
        let mut manifest = SyncManifest::load(&manifest_path, source_root)
            .unwrap_or_else(|| SyncManifest::new(source_root));

        let (dirs, entries) = self.scan(source_root)?;
        let changes =
            SourceHasher::detect_changes(source_root, dest_root, &entries, &manifest)?;
        debug!(
            new = changes.new_files.len(),
            modified = changes.modified_files.len(),
            touched = changes.touched_files.len(),
            deleted = changes.deleted_files.len(),
            "snapshot change set"
        );

        std::fs::create_dir_all(dest_root).map_err(|e| ToolchainError::io(dest_root, e))?;
        for dir in &dirs {
            let dest = dest_root.join(dir);
            std::fs::create_dir_all(&dest).map_err(|e| ToolchainError::io(&dest, e))?;
        }

        let by_rel: std::collections::HashMap<&Path, &SourceEntry> =
            entries.iter().map(|e| (e.rel.as_path(), e)).collect();

        let to_copy: Vec<&SourceEntry> = changes
            .to_copy()
            .filter_map(|rel| by_rel.get(rel.as_path()).copied())
            .collect();
        let copied: Vec<(PathBuf, FileRecord)> = to_copy
            .par_iter()
            .map(|entry| copy_entry(source_root, dest_root, entry))
            .collect::<Result<_, _>>()?;

        let report = SyncReport {
            copied: copied.len(),
            restamped: changes.touched_files.len(),
            removed: changes.deleted_files.len(),
            unchanged: changes.unchanged_files.len(),
        };

        for (rel, record) in copied {
            manifest.files.insert(rel, record);
        }
        for rel in &changes.touched_files {
            if let (Some(record), Some(entry)) =
                (manifest.files.get_mut(rel), by_rel.get(rel.as_path()))
            {
                record.stamp = entry.stamp;
            }
        }
        for rel in &changes.deleted_files {
            let dest = dest_root.join(rel);
            match std::fs::remove_file(&dest) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ToolchainError::io(&dest, e)),
            }
            manifest.files.remove(rel);
        }
        prune_empty_dirs(dest_root, &dirs, &changes.deleted_files);

        if !changes.is_empty() {
            manifest.save(&manifest_path)?;
        }

        info!(
            source = %source_root.display(),
            dest = %dest_root.display(),
            copied = report.copied,
            removed = report.removed,
            "toolchain snapshot synced"
        );
        Ok(report)
    }

    /// Lists directories and non-directory entries under `root`, relative
    /// to it, skipping excluded subtrees.
    fn scan(&self, root: &Path) -> Result<(Vec<PathBuf>, Vec<SourceEntry>), ToolchainError> {
        let mut dirs = Vec::new();
        let mut entries = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| match e.path().strip_prefix(root) {
                Ok(rel) => !self.excluded.iter().any(|x| rel == x.as_path()),
                Err(_) => true,
            });

        for entry in walker {
            let entry = entry?;
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }
            let rel = rel.to_path_buf();
            let file_type = entry.file_type();
            if file_type.is_dir() {
                dirs.push(rel);
                continue;
            }
            let meta = entry
                .path()
                .symlink_metadata()
                .map_err(|e| ToolchainError::io(entry.path(), e))?;
            let symlink = if file_type.is_symlink() {
                Some(
                    std::fs::read_link(entry.path())
                        .map_err(|e| ToolchainError::io(entry.path(), e))?,
                )
            } else {
                None
            };
            entries.push(SourceEntry {
                rel,
                stamp: FileStamp::from_metadata(&meta),
                symlink,
            });
        }

        Ok((dirs, entries))
    }
}

/// Removes the now-empty snapshot directories that held `deleted` files and
/// no longer exist in the source.
fn prune_empty_dirs(dest_root: &Path, source_dirs: &[PathBuf], deleted: &[PathBuf]) {
    let keep: HashSet<&Path> = source_dirs.iter().map(PathBuf::as_path).collect();
    let mut candidates: Vec<&Path> = deleted
        .iter()
        .flat_map(|rel| rel.ancestors().skip(1))
        .filter(|dir| !dir.as_os_str().is_empty() && !keep.contains(dir))
        .collect();
    // deepest first so a parent is tried after its children
    candidates.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    candidates.dedup();
    for dir in candidates {
        let path = dest_root.join(dir);
        if let Err(e) = std::fs::remove_dir(&path) {
            trace!(dir = %path.display(), "kept snapshot directory: {e}");
        }
    }
}

fn copy_entry(
    source_root: &Path,
    dest_root: &Path,
    entry: &SourceEntry,
) -> Result<(PathBuf, FileRecord), ToolchainError> {
    let src = source_root.join(&entry.rel);
    let dest = dest_root.join(&entry.rel);

    if let Some(target) = &entry.symlink {
        link_entry(target, &dest)?;
        return Ok((
            entry.rel.clone(),
            FileRecord {
                stamp: entry.stamp,
                content_hash: ContentHash::from_bytes(target.as_os_str().as_encoded_bytes()),
                symlink: Some(target.clone()),
            },
        ));
    }

    copy_atomic(&src, &dest)?;
    let content_hash = SourceHasher::hash_file(&src)?;
    Ok((
        entry.rel.clone(),
        FileRecord {
            stamp: entry.stamp,
            content_hash,
            symlink: None,
        },
    ))
}

#[cfg(unix)]
fn link_entry(target: &Path, dest: &Path) -> Result<(), ToolchainError> {
    Ok(xgo_cache::atomic::symlink_atomic(target, dest)?)
}

#[cfg(not(unix))]
fn link_entry(_target: &Path, dest: &Path) -> Result<(), ToolchainError> {
    Err(ToolchainError::UnsupportedSymlink {
        path: dest.to_path_buf(),
    })
}
