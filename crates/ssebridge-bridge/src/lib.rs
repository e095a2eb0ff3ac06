//! # ssebridge-bridge
//!
//! The session bridge runtime. One event loop owns all mutable state and
//! services four sources: the SSE subscription, stdin lines, completed POSTs
//! and the liveness timer.
//!
//! - **Transport**: [`EventSource`] / [`MessagePoster`] capability traits and
//!   their `reqwest` implementation
//! - **Connection**: subscription task and connectivity diagnostics
//! - **Inbound / Outbound**: event-to-line rendering, gated POST dispatch
//! - **Liveness**: idle detection and synthetic pings
//! - **Shutdown**: signal handling via `CancellationToken`

#![deny(unsafe_code)]

pub mod bridge;
pub mod connection;
pub mod inbound;
pub mod liveness;
pub mod outbound;
pub mod providers;
pub mod shutdown;
pub mod transport;

pub use bridge::{Bridge, ExitReason};
pub use providers::ReqwestTransport;
pub use shutdown::ShutdownCoordinator;
pub use transport::{EventSource, EventStream, MessagePoster, PostResponse};
