// Standard library
use std::sync::OnceLock;

// External crates
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

// Local modules
mod cli;
mod commands;
mod tracing_init;

use cli::Args;
use commands::execute_command;

/// Request ID for this execution - used for tracing logs across the entire request
static REQUEST_ID: OnceLock<String> = OnceLock::new();

fn get_request_id() -> &'static str {
    REQUEST_ID.get_or_init(|| Uuid::new_v4().to_string())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    if let Err(e) = tracing_init::init_with_defaults(default_filter) {
        eprintln!("{e}");
    }

    // Ctrl-C stops the poll loops. A create in flight still issues the delete for its workspace.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            on_signal.cancel();
        }
    });

    let span = info_span!(
        "request",
        request_id = get_request_id(),
        command = ?args.command
    );

    if let Err(e) = execute_command(args, cancel).instrument(span).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
