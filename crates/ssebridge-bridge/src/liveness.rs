//! Liveness monitor.
//!
//! Runs on every timer tick. While the session is not ready it only logs
//! where the bridge is waiting. Once ready, inbound silence past the idle
//! threshold yields one synthetic ping per tick, which the caller submits
//! through the normal outbound path.

use std::time::Duration;

use ssebridge_core::{LivenessCounter, OutboundRequest, Session, SessionState};
use ssebridge_settings::LivenessSettings;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Idle detection and ping synthesis.
pub struct LivenessMonitor {
    interval: Duration,
    idle_threshold: Duration,
    max_unanswered: u32,
    counter: LivenessCounter,
}

impl LivenessMonitor {
    /// Monitor configured from settings.
    pub fn new(settings: &LivenessSettings) -> Self {
        Self {
            interval: settings.interval(),
            idle_threshold: settings.idle_threshold(),
            max_unanswered: settings.max_unanswered_pings,
            counter: LivenessCounter::default(),
        }
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Pings sent since the last inbound event.
    pub fn unanswered(&self) -> u32 {
        self.counter.count()
    }

    /// An inbound event arrived.
    pub fn on_inbound(&mut self) {
        self.counter.reset();
    }

    /// Evaluate the session; returns a ping to submit when the server has
    /// been silent for too long.
    pub fn tick(&mut self, session: &Session, now: Instant) -> Option<OutboundRequest> {
        match session.state() {
            SessionState::Init | SessionState::Connecting => {
                info!("waiting for the event stream to open");
                None
            }
            SessionState::Disconnected => {
                info!("event stream disconnected; waiting (restart to reconnect)");
                None
            }
            SessionState::ConnectedNoSession => {
                info!("connected; waiting for session identifier");
                None
            }
            SessionState::Ready => self.probe(session.idle_for(now)),
        }
    }

    fn probe(&mut self, idle: Duration) -> Option<OutboundRequest> {
        if idle < self.idle_threshold {
            return None;
        }
        let unanswered = self.counter.record_ping();
        let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
        debug!(idle_ms, unanswered, "server idle; sending liveness ping");
        if self.counter.take_warning(self.max_unanswered) {
            warn!(
                idle_ms,
                unanswered,
                "remote server may be unresponsive: no events after repeated pings"
            );
        }
        Some(OutboundRequest::liveness_ping())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
