//! Connection manager.
//!
//! The subscription runs in its own task and reports back over a channel as
//! [`ConnectionSignal`]s, so the event loop stays the only owner of
//! [`Session`]. There is no reconnect: the first error or end of stream leaves
//! the bridge disconnected until restart.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ssebridge_core::{InboundEvent, Session, SessionState, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::transport::EventSource;

/// What the subscription task observed.
#[derive(Debug)]
pub enum ConnectionSignal {
    /// The server accepted the subscription.
    Opened,
    /// One server push.
    Event(InboundEvent),
    /// The subscription failed to open or broke mid-stream.
    Failed(TransportError),
    /// The server ended the stream cleanly.
    Closed,
}

/// Run the subscription, forwarding everything it sees into `tx`.
///
/// The task ends after the first failure, at end of stream, or as soon as the
/// receiver is gone.
pub fn spawn_subscription(
    source: Arc<dyn EventSource>,
    url: Url,
    tx: mpsc::Sender<ConnectionSignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = match source.subscribe(&url).await {
            Ok(stream) => stream,
            Err(err) => {
                let _ = tx.send(ConnectionSignal::Failed(err)).await;
                return;
            }
        };
        if tx.send(ConnectionSignal::Opened).await.is_err() {
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    if tx.send(ConnectionSignal::Event(event)).await.is_err() {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(ConnectionSignal::Failed(err)).await;
                    return;
                }
            }
        }
        let _ = tx.send(ConnectionSignal::Closed).await;
    })
}

/// Connectivity transitions and their diagnostics.
pub struct ConnectionManager {
    sse_url: Url,
    handshake_grace: Duration,
    troubleshooting_emitted: bool,
}

impl ConnectionManager {
    /// Manager for the subscription at `sse_url`.
    pub fn new(sse_url: Url, handshake_grace: Duration) -> Self {
        Self {
            sse_url,
            handshake_grace,
            troubleshooting_emitted: false,
        }
    }

    /// The subscription URL.
    pub fn sse_url(&self) -> &Url {
        &self.sse_url
    }

    /// The subscription is about to be requested.
    pub fn begin(&self, session: &mut Session, now: Instant) -> SessionState {
        info!(url = %self.sse_url, "opening event stream");
        session.begin_connecting(now)
    }

    /// The server accepted the subscription.
    pub fn on_open(&mut self, session: &mut Session, now: Instant) -> SessionState {
        let elapsed = session.since_open_requested(now).unwrap_or_default();
        let state = session.on_open(now);
        self.troubleshooting_emitted = false;
        info!(
            url = %self.sse_url,
            elapsed_ms = millis(elapsed),
            %state,
            "event stream open"
        );
        state
    }

    /// The subscription failed or ended.
    pub fn on_lost(
        &mut self,
        session: &mut Session,
        now: Instant,
        cause: Option<&TransportError>,
    ) -> SessionState {
        let was_connected = session.is_connected();
        let connected_ms = session.connected_for(now).map_or(0, millis);
        let state = session.on_error();
        match cause {
            Some(err) => error!(
                url = %self.sse_url,
                error = %err,
                was_connected,
                connected_ms,
                "event stream lost; continuing disconnected (restart to reconnect)"
            ),
            None => error!(
                url = %self.sse_url,
                was_connected,
                connected_ms,
                "event stream closed by server; continuing disconnected (restart to reconnect)"
            ),
        }
        if session.identifier().is_none() && self.past_grace(session, now) {
            self.troubleshoot(session, now);
        }
        state
    }

    /// Any inbound event ends the current error burst.
    pub fn on_activity(&mut self) {
        self.troubleshooting_emitted = false;
    }

    /// Periodic check for a stream that opened but never produced a session.
    pub fn check_handshake_grace(&mut self, session: &Session, now: Instant) {
        if session.is_connected()
            && session.identifier().is_none()
            && self.past_grace(session, now)
        {
            self.troubleshoot(session, now);
        }
    }

    fn past_grace(&self, session: &Session, now: Instant) -> bool {
        session
            .since_open_requested(now)
            .is_some_and(|elapsed| elapsed >= self.handshake_grace)
    }

    fn troubleshoot(&mut self, session: &Session, now: Instant) {
        if self.troubleshooting_emitted {
            debug!("troubleshooting already reported for this burst");
            return;
        }
        self.troubleshooting_emitted = true;
        let elapsed = session.since_open_requested(now).unwrap_or_default();
        warn!(
            url = %self.sse_url,
            elapsed_ms = millis(elapsed),
            grace_ms = millis(self.handshake_grace),
            state = %session.state(),
            "no session identifier received. Check that the server is running and serves \
             this path, that it sends an `endpoint` event carrying `session_id`, and that no \
             proxy is buffering the event stream"
        );
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ssebridge_core::SessionId;
    use ssebridge_core::logging::capture_logs;
    use std::sync::Mutex;
    use tracing::Level;

    use crate::transport::EventStream;

    const GRACE: Duration = Duration::from_secs(10);

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Url::parse("http://localhost:8080/sse").unwrap(), GRACE)
    }

    struct ScriptedSource {
        items: Mutex<Option<Vec<Result<InboundEvent, TransportError>>>>,
    }

    impl ScriptedSource {
        fn new(items: Vec<Result<InboundEvent, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(Some(items)),
            })
        }
    }

    #[async_trait]
    impl EventSource for ScriptedSource {
        async fn subscribe(&self, _url: &Url) -> Result<EventStream, TransportError> {
            let items = self
                .items
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| TransportError::ConnectionRefused("already used".into()))?;
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    async fn collect(source: Arc<dyn EventSource>) -> Vec<ConnectionSignal> {
        let (tx, mut rx) = mpsc::channel(16);
        let url = Url::parse("http://localhost/sse").unwrap();
        spawn_subscription(source, url, tx).await.unwrap();
        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        signals
    }

    // ── subscription task ──

    #[tokio::test]
    async fn subscription_reports_open_events_and_close() {
        let source = ScriptedSource::new(vec![
            Ok(InboundEvent::new("endpoint", "/messages/?session_id=a")),
            Ok(InboundEvent::new("", "{}")),
        ]);
        let signals = collect(source).await;
        assert_eq!(signals.len(), 4);
        assert!(matches!(signals[0], ConnectionSignal::Opened));
        assert!(matches!(&signals[1], ConnectionSignal::Event(e) if e.is_handshake()));
        assert!(matches!(&signals[2], ConnectionSignal::Event(e) if e.is_default()));
        assert!(matches!(signals[3], ConnectionSignal::Closed));
    }

    #[tokio::test]
    async fn subscription_stops_at_first_error() {
        let source = ScriptedSource::new(vec![
            Err(TransportError::Stream("reset".into())),
            Ok(InboundEvent::new("", "never delivered")),
        ]);
        let signals = collect(source).await;
        assert_eq!(signals.len(), 2);
        assert!(matches!(signals[1], ConnectionSignal::Failed(TransportError::Stream(_))));
    }

    #[tokio::test]
    async fn subscribe_failure_is_single_signal() {
        let source = ScriptedSource::new(Vec::new());
        let _ = source.items.lock().unwrap().take();
        let signals = collect(source).await;
        assert_eq!(signals.len(), 1);
        assert!(matches!(
            signals[0],
            ConnectionSignal::Failed(TransportError::ConnectionRefused(_))
        ));
    }

    // ── transitions ──

    #[test]
    fn open_then_lost() {
        let (logs, _guard) = capture_logs();
        let start = Instant::now();
        let mut session = Session::new(start);
        let mut mgr = manager();

        assert_eq!(mgr.begin(&mut session, start), SessionState::Connecting);
        let state = mgr.on_open(&mut session, start + Duration::from_millis(250));
        assert_eq!(state, SessionState::ConnectedNoSession);
        assert!(logs.has_field("elapsed_ms", "250"));

        let state = mgr.on_lost(&mut session, start + Duration::from_secs(1), None);
        assert_eq!(state, SessionState::Disconnected);
        assert!(logs.has_event(Level::ERROR, "closed by server"));
        assert!(logs.has_field("connected_ms", "750"));
    }

    #[test]
    fn early_loss_skips_troubleshooting() {
        let (logs, _guard) = capture_logs();
        let start = Instant::now();
        let mut session = Session::new(start);
        let mut mgr = manager();
        let _ = mgr.begin(&mut session, start);

        let err = TransportError::ConnectionRefused("os error 111".into());
        let _ = mgr.on_lost(&mut session, start + Duration::from_secs(1), Some(&err));
        assert!(logs.has_event(Level::ERROR, "event stream lost"));
        assert!(!logs.has_message("no session identifier"));
    }

    #[test]
    fn late_loss_without_session_troubleshoots_once() {
        let (logs, _guard) = capture_logs();
        let start = Instant::now();
        let mut session = Session::new(start);
        let mut mgr = manager();
        let _ = mgr.begin(&mut session, start);
        let _ = mgr.on_open(&mut session, start);

        let late = start + GRACE + Duration::from_secs(1);
        mgr.check_handshake_grace(&session, late);
        let _ = mgr.on_lost(&mut session, late, Some(&TransportError::Stream("eof".into())));
        assert_eq!(logs.count_matching("no session identifier"), 1);
    }

    #[test]
    fn resolved_session_never_troubleshoots() {
        let (logs, _guard) = capture_logs();
        let start = Instant::now();
        let mut session = Session::new(start);
        let mut mgr = manager();
        let _ = mgr.begin(&mut session, start);
        let _ = mgr.on_open(&mut session, start);
        assert!(session.resolve(SessionId::new("abc")));

        let late = start + GRACE * 3;
        mgr.check_handshake_grace(&session, late);
        let _ = mgr.on_lost(&mut session, late, None);
        assert!(!logs.has_message("no session identifier"));
    }

    #[test]
    fn activity_rearms_troubleshooting() {
        let (logs, _guard) = capture_logs();
        let start = Instant::now();
        let mut session = Session::new(start);
        let mut mgr = manager();
        let _ = mgr.begin(&mut session, start);
        let _ = mgr.on_open(&mut session, start);

        let late = start + GRACE;
        mgr.check_handshake_grace(&session, late);
        mgr.check_handshake_grace(&session, late);
        mgr.on_activity();
        mgr.check_handshake_grace(&session, late);
        assert_eq!(logs.count_matching("no session identifier"), 2);
    }
}
