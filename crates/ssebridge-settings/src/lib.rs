//! # ssebridge-settings
//!
//! Layered configuration for the SSE stdio bridge.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`BridgeSettings::default()`]
//! 2. **User file**: `~/.ssebridge/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SSEBRIDGE_*` overrides (highest priority)
//!
//! The CLI surface stays a single positional URL; everything tunable lives here.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
