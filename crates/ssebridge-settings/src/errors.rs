//! Settings error types.

use thiserror::Error;

/// Errors raised while loading or validating [`BridgeSettings`].
///
/// [`BridgeSettings`]: crate::BridgeSettings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON or has the wrong shape.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value parsed but is unusable (zero period, zero threshold).
    #[error("invalid settings value for {field}: {reason}")]
    InvalidValue {
        /// Dotted camelCase path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
