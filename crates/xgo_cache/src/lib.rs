//! Build-identity and snapshot bookkeeping for the private toolchain cache.
//!
//! [`BuildIdRecord`] decides whether the patched compiler changed since the
//! last run, which forces every downstream package to rebuild.
//! [`SyncManifest`] and [`SourceHasher`] let the snapshot stage skip files
//! whose source has not changed. [`atomic`] holds the write-then-rename
//! helpers every stage uses so that no half-written file is ever visible
//! under its final name.

#![warn(missing_docs)]

pub mod atomic;
pub mod build_id;
pub mod error;
pub mod hasher;
pub mod manifest;

pub use build_id::{BuildIdRecord, BuildIdentity};
pub use error::CacheError;
pub use hasher::{ChangeSet, FileStamp, SourceEntry, SourceHasher};
pub use manifest::{FileRecord, SyncManifest};
