//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.
//!
//! ```json
//! {
//!   "transport": { "postTimeoutMs": 5000 },
//!   "liveness": { "idleThresholdMs": 60000 }
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the bridge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// HTTP/SSE timing.
    pub transport: TransportSettings,
    /// Liveness monitor timing and thresholds.
    pub liveness: LivenessSettings,
    /// Bridge behaviour switches.
    pub bridge: BehaviorSettings,
    /// Diagnostic logging.
    pub logging: LoggingSettings,
}

impl BridgeSettings {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("transport.postTimeoutMs", self.transport.post_timeout_ms),
            ("liveness.intervalMs", self.liveness.interval_ms),
            ("liveness.idleThresholdMs", self.liveness.idle_threshold_ms),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(SettingsError::InvalidValue {
                    field,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if self.liveness.max_unanswered_pings == 0 {
            return Err(SettingsError::InvalidValue {
                field: "liveness.maxUnansweredPings",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Outbound POST and handshake timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Upper bound for a single POST, in milliseconds.
    pub post_timeout_ms: u64,
    /// How long after opening the stream the handshake may take before
    /// troubleshooting diagnostics are emitted.
    pub handshake_grace_ms: u64,
}

impl TransportSettings {
    /// POST timeout as a [`Duration`].
    pub fn post_timeout(&self) -> Duration {
        Duration::from_millis(self.post_timeout_ms)
    }

    /// Handshake grace period as a [`Duration`].
    pub fn handshake_grace(&self) -> Duration {
        Duration::from_millis(self.handshake_grace_ms)
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            post_timeout_ms: 10_000,
            handshake_grace_ms: 10_000,
        }
    }
}

/// Liveness monitor configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivenessSettings {
    /// Tick period in milliseconds.
    pub interval_ms: u64,
    /// Inbound silence, in milliseconds, before synthetic pings start.
    pub idle_threshold_ms: u64,
    /// Consecutive unanswered pings before the unresponsive warning.
    pub max_unanswered_pings: u32,
}

impl LivenessSettings {
    /// Tick period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Idle threshold as a [`Duration`].
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}

impl Default for LivenessSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            idle_threshold_ms: 30_000,
            max_unanswered_pings: 5,
        }
    }
}

/// Behaviour switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviorSettings {
    /// Mirror failed client requests as JSON-RPC error replies on stdout.
    pub mirror_errors: bool,
    /// Stop the bridge when stdin reaches end of file.
    pub exit_on_input_close: bool,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            mirror_errors: true,
            exit_on_input_close: true,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
