//! # ssebridge
//!
//! Bridges a newline-delimited stdio protocol to a server that only speaks
//! SSE (`GET <base>/sse`) plus HTTP POST (`<base>/messages/?session_id=`).
//! Stdout carries protocol messages only; diagnostics go to stderr.

#![deny(unsafe_code)]

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use ssebridge_bridge::{Bridge, ShutdownCoordinator};
use ssebridge_core::Endpoints;
use ssebridge_core::logging::init_subscriber;
use ssebridge_settings::{BridgeSettings, load_settings, settings_path};
use tokio::io::BufReader;
use tracing::{info, warn};

/// Exit code for a missing or invalid URL argument.
const EXIT_USAGE: u8 = 1;

/// Bridge stdin/stdout to an SSE + HTTP POST server.
#[derive(Parser, Debug)]
#[command(name = "ssebridge", about = "Bridge stdin/stdout to an SSE server")]
struct Cli {
    /// Server base URL, e.g. `http://localhost:8080`.
    url: String,
}

/// Parse arguments and validate the base URL.
///
/// URL problems are reported as clap errors so they print with the usage.
fn parse_args<I, T>(args: I) -> Result<Endpoints, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    Endpoints::parse(&cli.url).map_err(|err| {
        Cli::command().error(ErrorKind::ValueValidation, format!("invalid server URL: {err}"))
    })
}

/// Exit code for an argument error. Help output is a success.
fn usage_exit_code(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::DisplayHelp => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_USAGE),
    }
}

fn main() -> Result<ExitCode> {
    let endpoints = match parse_args(std::env::args_os()) {
        Ok(endpoints) => endpoints,
        Err(err) => {
            err.print().context("failed to print usage")?;
            return Ok(usage_exit_code(err.kind()));
        }
    };

    let (settings, settings_error) = match load_settings() {
        Ok(settings) => (settings, None),
        Err(err) => (BridgeSettings::default(), Some(err)),
    };
    init_subscriber(&settings.logging.level);
    if let Some(err) = settings_error {
        warn!(
            path = %settings_path().display(),
            error = %err,
            "ignoring unusable settings file; using defaults"
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(endpoints, settings));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    Ok(ExitCode::SUCCESS)
}

async fn run(endpoints: Endpoints, settings: BridgeSettings) {
    let shutdown = ShutdownCoordinator::new();
    let _signals = shutdown.listen_for_signals();

    let bridge = Bridge::with_reqwest(endpoints, settings);
    let input = BufReader::new(tokio::io::stdin());
    let reason = bridge.run(input, tokio::io::stdout(), shutdown.token()).await;
    shutdown.shutdown();
    info!(?reason, "exiting");
}
