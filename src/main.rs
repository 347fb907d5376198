//! wfm - workforce task assignment CLI
//!
//! Creates, reassigns and queries operational tasks attached to reference
//! entities such as orders and shipments.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wfm::cli::Cli;
use wfm::output::{emit_error, infer_command_name_from_args};

fn init_tracing(verbose: bool) {
    // RUST_LOG wins; invalid or huge filters fall back to the default.
    let default = if verbose { "wfm=debug" } else { "off" };
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let events_to_stdout = cli
        .events
        .as_deref()
        .map(|value| value.trim() == "-")
        .unwrap_or(false);
    let json = cli.json && !events_to_stdout;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
