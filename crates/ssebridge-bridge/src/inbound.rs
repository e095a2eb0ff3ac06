//! Inbound forwarder: server pushes to stdout lines.

use ssebridge_core::handshake::{self, Resolved};
use ssebridge_core::{InboundEvent, Session, SessionId};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Line-oriented protocol output. Every record is followed by a single
/// newline and flushed immediately.
pub struct OutputWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> OutputWriter<W> {
    /// Wrap a writer (normally stdout).
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one record.
    pub async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Record an inbound event on the session and render its output line.
///
/// `endpoint` events additionally go through handshake resolution. Every
/// event, the handshake included, is forwarded.
pub fn forward(session: &mut Session, event: &InboundEvent, now: Instant) -> String {
    session.touch(now);
    debug!(event = %event.event_name, bytes = event.payload.len(), "inbound event");
    if event.is_handshake() {
        let _ = observe_handshake(session, event);
    }
    event.to_output_line()
}

/// Try to resolve the session identifier from an `endpoint` event.
///
/// Returns the identifier when this event set it. Once an identifier is
/// known, later handshakes are logged and ignored.
pub fn observe_handshake(session: &mut Session, event: &InboundEvent) -> Option<SessionId> {
    if let Some(existing) = session.identifier() {
        info!(session_id = %existing, "session already resolved; ignoring endpoint event");
        return None;
    }
    match handshake::resolve(&event.payload) {
        Some(Resolved { session_id, strategy }) => {
            let _ = session.resolve(session_id.clone());
            info!(session_id = %session_id, strategy, "session ready");
            Some(session_id)
        }
        None => {
            warn!(
                payload = %event.payload,
                "could not extract a session identifier from endpoint event; outbound \
                 messages stay blocked"
            );
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
