//! # scanlens-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ScanlensSettings::default()`]
//! 2. **Settings file**: `~/.scanlens/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `SCANLENS_*` and `CLOUDFLARE_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{InferenceSettings, LoggingSettings, ScanlensSettings, ServerSettings};
