//! Source file stamping and change detection for snapshot syncs.
//!
//! Compares the current listing of a toolchain tree against the sync
//! manifest and categorizes every entry as new, modified, touched (stamp
//! changed, content identical), deleted, or unchanged. Only new and modified
//! entries are copied; touched entries just get their stamp refreshed.

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use xgo_common::ContentHash;

use crate::error::CacheError;
use crate::manifest::SyncManifest;

/// Cheap change indicator for a file: its size and modification time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FileStamp {
    /// File length in bytes.
    pub len: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u64,
}

impl FileStamp {
    /// Builds a stamp from file metadata. Platforms without modification
    /// times stamp `0`, which degrades to content-hash comparison.
    pub fn from_metadata(meta: &Metadata) -> Self {
        let modified_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            len: meta.len(),
            modified_ns,
        }
    }
}

/// One entry of the current source listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the toolchain root.
    pub rel: PathBuf,
    /// Stamp of the source entry (of the link itself for symlinks).
    pub stamp: FileStamp,
    /// Link target when the entry is a symbolic link.
    pub symlink: Option<PathBuf>,
}

/// Result of comparing a source listing against the sync manifest.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Entries that are not present in the manifest.
    pub new_files: Vec<PathBuf>,

    /// Entries whose content, link target, or destination copy changed.
    pub modified_files: Vec<PathBuf>,

    /// Entries whose stamp changed but whose content hash did not.
    pub touched_files: Vec<PathBuf>,

    /// Entries present in the manifest but no longer in the source.
    pub deleted_files: Vec<PathBuf>,

    /// Entries whose stamp matches the manifest.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if nothing needs copying, restamping, or deleting.
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.modified_files.is_empty()
            && self.touched_files.is_empty()
            && self.deleted_files.is_empty()
    }

    /// Entries that must be copied from the source.
    pub fn to_copy(&self) -> impl Iterator<Item = &PathBuf> {
        self.new_files.iter().chain(self.modified_files.iter())
    }
}

/// Utility for hashing source files and detecting changes.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the content hash of a single file.
    pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
        ContentHash::from_file(path).map_err(|e| CacheError::io(path, e))
    }

    /// Compares the current source listing against `manifest`.
    ///
    /// An entry whose destination copy has disappeared is reported as
    /// modified even when the source is unchanged, so a damaged snapshot
    /// heals on the next sync. Unreadable source files are a hard error.
    pub fn detect_changes(
        source_root: &Path,
        dest_root: &Path,
        entries: &[SourceEntry],
        manifest: &SyncManifest,
    ) -> Result<ChangeSet, CacheError> {
        let mut cs = ChangeSet::default();

        for entry in entries {
            let Some(record) = manifest.files.get(&entry.rel) else {
                cs.new_files.push(entry.rel.clone());
                continue;
            };

            if std::fs::symlink_metadata(dest_root.join(&entry.rel)).is_err() {
                cs.modified_files.push(entry.rel.clone());
            } else if entry.symlink.is_some() || record.symlink.is_some() {
                if entry.symlink == record.symlink {
                    cs.unchanged_files.push(entry.rel.clone());
                } else {
                    cs.modified_files.push(entry.rel.clone());
                }
            } else if entry.stamp == record.stamp {
                cs.unchanged_files.push(entry.rel.clone());
            } else if Self::hash_file(&source_root.join(&entry.rel))? == record.content_hash {
                cs.touched_files.push(entry.rel.clone());
            } else {
                cs.modified_files.push(entry.rel.clone());
            }
        }

        let current: HashSet<&PathBuf> = entries.iter().map(|e| &e.rel).collect();
        cs.deleted_files = manifest
            .files
            .keys()
            .filter(|p| !current.contains(p))
            .cloned()
            .collect();

        // Sort for deterministic ordering
        cs.new_files.sort();
        cs.modified_files.sort();
        cs.touched_files.sort();
        cs.unchanged_files.sort();
        cs.deleted_files.sort();

        Ok(cs)
    }
}
