//! # parley-settings
//!
//! Configuration for the Parley chat service, loaded from three layers
//! (lowest to highest priority):
//!
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **Settings file**: `~/.parley/settings.json` or an explicit path,
//!    deep-merged over the defaults
//! 3. **Environment**: `PARLEY_*` variables
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings_from_path, settings_path,
};
pub use types::{ChatSettings, LoggingSettings, ParleySettings, ServerSettings};
