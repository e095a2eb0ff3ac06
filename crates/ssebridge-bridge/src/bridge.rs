//! The session bridge event loop.
//!
//! [`Bridge::run`] owns the [`Session`], the liveness counter and stdout.
//! Network work happens in spawned tasks that report back, so every state
//! mutation happens on this one loop and nothing needs a lock.

use std::sync::Arc;

use ssebridge_core::{Endpoints, InboundEvent, OutboundRequest, Session};
use ssebridge_settings::BridgeSettings;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionManager, ConnectionSignal, spawn_subscription};
use crate::inbound::{self, OutputWriter};
use crate::liveness::LivenessMonitor;
use crate::outbound::{self, Delivery, OutboundForwarder};
use crate::providers::ReqwestTransport;
use crate::transport::{EventSource, MessagePoster};

/// Buffered signals between the subscription task and the loop.
const SIGNAL_BUFFER: usize = 64;

/// Why [`Bridge::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown token was cancelled.
    Shutdown,
    /// Stdin reached end of file.
    InputClosed,
}

/// A configured, not yet running bridge.
pub struct Bridge {
    endpoints: Endpoints,
    settings: BridgeSettings,
    source: Arc<dyn EventSource>,
    poster: Arc<dyn MessagePoster>,
}

impl Bridge {
    /// Bridge over explicit transport providers.
    pub fn new(
        endpoints: Endpoints,
        settings: BridgeSettings,
        source: Arc<dyn EventSource>,
        poster: Arc<dyn MessagePoster>,
    ) -> Self {
        Self {
            endpoints,
            settings,
            source,
            poster,
        }
    }

    /// Bridge over the `reqwest` transport.
    pub fn with_reqwest(endpoints: Endpoints, settings: BridgeSettings) -> Self {
        let transport = Arc::new(ReqwestTransport::new());
        Self::new(endpoints, settings, transport.clone(), transport)
    }

    /// Run until shutdown or (if configured) end of input.
    ///
    /// On return the subscription task has been aborted and any POSTs still
    /// in flight are abandoned.
    pub async fn run<R, W>(self, input: R, output: W, shutdown: CancellationToken) -> ExitReason
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Self {
            endpoints,
            settings,
            source,
            poster,
        } = self;

        let now = Instant::now();
        let mut state = LoopState {
            session: Session::new(now),
            connection: ConnectionManager::new(
                endpoints.sse_url().clone(),
                settings.transport.handshake_grace(),
            ),
            outbound: OutboundForwarder::new(
                poster,
                endpoints.clone(),
                settings.transport.post_timeout(),
            ),
            liveness: LivenessMonitor::new(&settings.liveness),
            output: OutputWriter::new(output),
            in_flight: JoinSet::new(),
            mirror_errors: settings.bridge.mirror_errors,
            shutdown: shutdown.clone(),
        };

        let (tx, mut signals) = mpsc::channel(SIGNAL_BUFFER);
        let _ = state.connection.begin(&mut state.session, now);
        let subscription = spawn_subscription(source, state.connection.sse_url().clone(), tx);

        let period = state.liveness.interval();
        let mut ticker = interval_at(now + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut lines = input.lines();
        let mut input_open = true;
        let exit_on_input_close = settings.bridge.exit_on_input_close;

        info!(
            base = %endpoints.base(),
            messages = %endpoints.messages_base(),
            "bridge started"
        );

        let reason = loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break ExitReason::Shutdown,

                Some(signal) = signals.recv() => state.on_signal(signal).await,

                Some(joined) = state.in_flight.join_next(), if !state.in_flight.is_empty() => {
                    state.on_delivery(joined).await;
                }

                line = lines.next_line(), if input_open => match line {
                    Ok(Some(line)) => state.on_input(&line).await,
                    Ok(None) => {
                        info!("input closed");
                        if exit_on_input_close {
                            break ExitReason::InputClosed;
                        }
                        input_open = false;
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                        error!(error = %err, "skipping unreadable input line");
                    }
                    Err(err) => {
                        error!(error = %err, "input read failed; no further input will be read");
                        if exit_on_input_close {
                            break ExitReason::InputClosed;
                        }
                        input_open = false;
                    }
                },

                _ = ticker.tick() => state.on_tick(),
            }
        };

        subscription.abort();
        let abandoned = state.in_flight.len();
        state.in_flight.abort_all();
        info!(?reason, abandoned, state = %state.session.state(), "bridge stopped");
        reason
    }
}

/// Everything the loop owns.
struct LoopState<W> {
    session: Session,
    connection: ConnectionManager,
    outbound: OutboundForwarder,
    liveness: LivenessMonitor,
    output: OutputWriter<W>,
    in_flight: JoinSet<Delivery>,
    mirror_errors: bool,
    shutdown: CancellationToken,
}

impl<W: AsyncWrite + Unpin> LoopState<W> {
    async fn on_signal(&mut self, signal: ConnectionSignal) {
        let now = Instant::now();
        match signal {
            ConnectionSignal::Opened => {
                let _ = self.connection.on_open(&mut self.session, now);
            }
            ConnectionSignal::Event(event) => self.on_event(&event, now).await,
            ConnectionSignal::Failed(err) => {
                let _ = self.connection.on_lost(&mut self.session, now, Some(&err));
            }
            ConnectionSignal::Closed => {
                let _ = self.connection.on_lost(&mut self.session, now, None);
            }
        }
    }

    async fn on_event(&mut self, event: &InboundEvent, now: Instant) {
        self.connection.on_activity();
        self.liveness.on_inbound();
        let line = inbound::forward(&mut self.session, event, now);
        self.emit(&line).await;
    }

    async fn on_input(&mut self, line: &str) {
        let Some(request) = OutboundRequest::from_input(line) else {
            debug!("ignoring blank input line");
            return;
        };
        self.submit(request).await;
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        self.connection.check_handshake_grace(&self.session, now);
        if let Some(ping) = self.liveness.tick(&self.session, now) {
            // Pings are never mirrored, so a drop needs no output.
            if let Err(dropped) = self.outbound.submit(ping, &self.session, &mut self.in_flight) {
                debug!(reason = %dropped.reason, "liveness ping dropped");
            }
        }
    }

    async fn submit(&mut self, request: OutboundRequest) {
        let Err(dropped) = self.outbound.submit(request, &self.session, &mut self.in_flight) else {
            return;
        };
        if self.mirror_errors {
            if let Some(reply) = dropped.error_reply() {
                self.emit(&reply).await;
            }
        }
    }

    async fn on_delivery(&mut self, joined: Result<Delivery, JoinError>) {
        match joined {
            Ok(delivery) => {
                if let Some(line) = outbound::report(&delivery, self.mirror_errors) {
                    self.emit(&line).await;
                }
            }
            Err(err) if err.is_cancelled() => debug!("POST task cancelled"),
            Err(err) => error!(error = %err, "POST task failed"),
        }
    }

    /// Write one output line, giving up if shutdown is requested mid-write.
    async fn emit(&mut self, line: &str) {
        tokio::select! {
            () = self.shutdown.cancelled() => {
                debug!("output write abandoned on shutdown");
            }
            result = self.output.write_line(line) => {
                if let Err(err) = result {
                    warn!(error = %err, "failed to write to output");
                }
            }
        }
    }
}
