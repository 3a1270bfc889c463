//! Build identity of the patched compiler binary.
//!
//! The compiler's own output is not content-addressed by its inputs from the
//! caller's point of view, so the only safe way to reuse previously compiled
//! packages is to know the compiler did not change. The identity is derived
//! from the binary itself, never from source hashes.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use xgo_common::ContentHash;

use crate::atomic::write_atomic;
use crate::error::CacheError;

/// Opaque fingerprint of a built compiler binary.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BuildIdentity(ContentHash);

impl BuildIdentity {
    /// Fingerprints the binary at `path`.
    pub fn of_binary(path: &Path) -> Result<Self, CacheError> {
        ContentHash::from_file(path)
            .map(Self)
            .map_err(|e| CacheError::io(path, e))
    }
}

impl fmt::Display for BuildIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The side file recording the identity of the last compiler build.
pub struct BuildIdRecord {
    path: PathBuf,
}

impl BuildIdRecord {
    /// Uses `path` (normally `compile.buildid.txt`) as the record.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the recorded identity.
    ///
    /// Returns `Ok(None)` if the record does not exist or does not parse; a
    /// corrupt record is treated as absent so the next comparison reports a
    /// change. Other read errors propagate.
    pub fn load(&self) -> Result<Option<BuildIdentity>, CacheError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim().parse().ok().map(BuildIdentity)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&self.path, e)),
        }
    }

    /// Persists `id` as the recorded identity.
    pub fn store(&self, id: BuildIdentity) -> Result<(), CacheError> {
        write_atomic(&self.path, id.to_string().as_bytes())
    }

    /// Fingerprints `binary` and compares it with the recorded identity.
    ///
    /// On mismatch or when no prior record exists, stores the new identity and
    /// returns `true`: every artifact built by the previous compiler must be
    /// rebuilt. Returns `false` when the identity is unchanged.
    pub fn compare_and_update(&self, binary: &Path) -> Result<bool, CacheError> {
        let current = BuildIdentity::of_binary(binary)?;
        let previous = self.load()?;
        if previous == Some(current) {
            debug!(build_id = %current, "compiler build identity unchanged");
            return Ok(false);
        }
        debug!(
            previous = ?previous.map(|p| p.to_string()),
            current = %current,
            "compiler build identity changed"
        );
        self.store(current)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PathBuf, BuildIdRecord) {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("compile");
        let record = BuildIdRecord::new(dir.path().join("compile.buildid.txt"));
        (dir, bin, record)
    }

    #[test]
    fn first_build_reports_changed() {
        let (_dir, bin, record) = setup();
        std::fs::write(&bin, b"compiler v1").unwrap();
        assert!(record.compare_and_update(&bin).unwrap());
        assert!(record.load().unwrap().is_some());
    }

    #[test]
    fn unchanged_binary_reports_unchanged() {
        let (_dir, bin, record) = setup();
        std::fs::write(&bin, b"compiler v1").unwrap();
        assert!(record.compare_and_update(&bin).unwrap());
        // rebuilt from unchanged source: identical bytes
        std::fs::write(&bin, b"compiler v1").unwrap();
        assert!(!record.compare_and_update(&bin).unwrap());
    }

    #[test]
    fn edited_binary_reports_changed_again() {
        let (_dir, bin, record) = setup();
        std::fs::write(&bin, b"compiler v1").unwrap();
        record.compare_and_update(&bin).unwrap();
        std::fs::write(&bin, b"compiler v2").unwrap();
        assert!(record.compare_and_update(&bin).unwrap());
        assert!(!record.compare_and_update(&bin).unwrap());
    }

    #[test]
    fn corrupt_record_counts_as_absent() {
        let (dir, bin, record) = setup();
        std::fs::write(&bin, b"compiler").unwrap();
        std::fs::write(dir.path().join("compile.buildid.txt"), "not a hash").unwrap();
        assert!(record.load().unwrap().is_none());
        assert!(record.compare_and_update(&bin).unwrap());
    }

    #[test]
    fn record_is_hex_text() {
        let (dir, bin, record) = setup();
        std::fs::write(&bin, b"compiler").unwrap();
        record.compare_and_update(&bin).unwrap();
        let text = std::fs::read_to_string(dir.path().join("compile.buildid.txt")).unwrap();
        assert_eq!(text.len(), 32);
        assert_eq!(text, ContentHash::from_bytes(b"compiler").to_string());
    }

    #[test]
    fn missing_binary_errors() {
        let (_dir, bin, record) = setup();
        let err = record.compare_and_update(&bin).unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }
}
