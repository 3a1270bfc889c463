//! Manifest of what a toolchain snapshot was synced from.
//!
//! Stored as JSON next to the snapshot (not inside it, so the toolchain tree
//! itself stays byte-identical to its source). Records, per relative path,
//! the source file's stamp and content hash at the time it was copied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use xgo_common::ContentHash;

use crate::atomic::write_atomic;
use crate::error::CacheError;
use crate::hasher::FileStamp;

/// Current manifest format version. Increment on breaking changes.
pub const SYNC_MANIFEST_VERSION: u32 = 1;

/// Per-snapshot sync state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncManifest {
    /// Manifest format version.
    pub format_version: u32,

    /// The toolchain root the snapshot was copied from.
    pub source_root: PathBuf,

    /// Per-entry state keyed by path relative to the toolchain root.
    pub files: BTreeMap<PathBuf, FileRecord>,
}

/// Recorded state of one synced entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Size and modification time of the source when it was copied.
    pub stamp: FileStamp,

    /// Content hash of the source when it was copied. Unused for symlinks.
    pub content_hash: ContentHash,

    /// Link target when the entry is a symbolic link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink: Option<PathBuf>,
}

impl SyncManifest {
    /// Creates an empty manifest for a snapshot of `source_root`.
    pub fn new(source_root: &Path) -> Self {
        Self {
            format_version: SYNC_MANIFEST_VERSION,
            source_root: source_root.to_path_buf(),
            files: BTreeMap::new(),
        }
    }

    /// Loads the manifest at `path`.
    ///
    /// Returns `None` if the file is missing, unparsable, of another format
    /// version, or was recorded for a different source root. Any of those
    /// means every file is treated as new and recopied.
    pub fn load(path: &Path, source_root: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        let manifest: Self = serde_json::from_str(&content).ok()?;
        (manifest.format_version == SYNC_MANIFEST_VERSION && manifest.source_root == source_root)
            .then_some(manifest)
    }

    /// Atomically saves the manifest to `path`.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        write_atomic(path, &json)
    }
}
