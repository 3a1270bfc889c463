//! Cache-root layout and optional `config.toml` settings for xgo.
//!
//! [`XgoHome`] locates the private cache root, [`InstanceLayout`] names every
//! path the build pipeline reads or writes for one toolchain, and
//! [`Settings`] carries the user's defaults from `<root>/config.toml`.

#![warn(missing_docs)]

pub mod error;
pub mod layout;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use layout::{InstanceLayout, XgoHome};
pub use loader::{load_settings, load_settings_from_str};
pub use types::*;
