//! The fixed set of source additions applied to a synced instance.
//!
//! Each entry copies a file or a directory tree from the patch source root
//! into the instance. A destination file whose content already matches is
//! left alone, so re-patching an already-patched tree writes nothing.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;
use xgo_cache::atomic::copy_atomic;
use xgo_cache::SourceHasher;

use crate::error::ToolchainError;

/// One source addition or replacement, paths relative to the patch source
/// root (`from`) and the instance root (`to`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchEntry {
    /// A single file.
    File {
        /// Path inside the patch source root.
        from: PathBuf,
        /// Path inside the instance root.
        to: PathBuf,
    },
    /// Every file under a directory, mirrored with the same layout.
    Tree {
        /// Directory inside the patch source root.
        from: PathBuf,
        /// Directory inside the instance root.
        to: PathBuf,
    },
}

impl PatchEntry {
    fn file(from: &str, to: &str) -> Self {
        Self::File {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        }
    }

    fn tree(from: &str, to: &str) -> Self {
        Self::Tree {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        }
    }

    fn source(&self) -> &Path {
        match self {
            Self::File { from, .. } | Self::Tree { from, .. } => from,
        }
    }
}

/// Counts of what applying a patch set did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Files written because they were missing or differed.
    pub written: usize,
    /// Files already identical to the patch source.
    pub unchanged: usize,
}

/// An ordered list of [`PatchEntry`] values.
#[derive(Debug, Clone)]
pub struct PatchSet {
    entries: Vec<PatchEntry>,
}

impl PatchSet {
    /// A patch set with the given entries, applied in order.
    pub fn new(entries: Vec<PatchEntry>) -> Self {
        Self { entries }
    }

    /// The patch set every instance receives: the injection engine compiled
    /// into the compiler, the compiler hook calling it, and the runtime and
    /// testing entry points that the rewritten functions link against.
    pub fn standard() -> Self {
        Self::new(vec![
            PatchEntry::tree("patch", "src/cmd/compile/internal/xgo_rewrite_internal/patch"),
            PatchEntry::file("compile/noder_hook.go", "src/cmd/compile/internal/noder/xgo_hook.go"),
            PatchEntry::file("runtime/xgo_trap.go", "src/runtime/xgo_trap.go"),
            PatchEntry::file("testing/xgo_test_start.go", "src/testing/xgo_test_start.go"),
        ])
    }

    /// The entries, in application order.
    pub fn entries(&self) -> &[PatchEntry] {
        &self.entries
    }

    /// Applies every entry from `patch_src` onto `dest_root`.
    ///
    /// All sources are checked before anything is written; a missing one is
    /// [`ToolchainError::MissingPatchSource`] and leaves `dest_root` as it was.
    pub fn apply(&self, dest_root: &Path, patch_src: &Path) -> Result<PatchReport, ToolchainError> {
        for entry in &self.entries {
            let src = patch_src.join(entry.source());
            let present = match entry {
                PatchEntry::File { .. } => src.is_file(),
                PatchEntry::Tree { .. } => src.is_dir(),
            };
            if !present {
                return Err(ToolchainError::MissingPatchSource { path: src });
            }
        }

        let mut report = PatchReport::default();
        for entry in &self.entries {
            match entry {
                PatchEntry::File { from, to } => {
                    place(&patch_src.join(from), &dest_root.join(to), &mut report)?;
                }
                PatchEntry::Tree { from, to } => {
                    let src_dir = patch_src.join(from);
                    for item in WalkDir::new(&src_dir).sort_by_file_name() {
                        let item = item?;
                        if !item.file_type().is_file() {
                            continue;
                        }
                        let Ok(rel) = item.path().strip_prefix(&src_dir) else {
                            continue;
                        };
                        place(item.path(), &dest_root.join(to).join(rel), &mut report)?;
                    }
                }
            }
        }

        info!(
            dest = %dest_root.display(),
            written = report.written,
            unchanged = report.unchanged,
            "patch set applied"
        );
        Ok(report)
    }
}

fn place(src: &Path, dest: &Path, report: &mut PatchReport) -> Result<(), ToolchainError> {
    if dest.is_file() && SourceHasher::hash_file(dest)? == SourceHasher::hash_file(src)? {
        report.unchanged += 1;
        return Ok(());
    }
    debug!(file = %dest.display(), "writing patch file");
    copy_atomic(src, dest)?;
    report.written += 1;
    Ok(())
}
