//! Shared foundational types for the xgo instrumentation toolchain.
//!
//! Content hashing, path-derived cache identities, Go version handling and
//! interned identifiers used by every other crate in the workspace.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod path_sum;
pub mod version;

pub use hash::{ContentHash, ParseHashError};
pub use ident::{Ident, Interner};
pub use path_sum::path_sum;
pub use version::{GoVersion, VersionError, SUPPORTED_GO};
