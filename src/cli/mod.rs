//! cli
//!
//! Command-line interface layer.
//!
//! The CLI layer is thin: it parses arguments via clap, builds the
//! execution context, and dispatches to the [`crate::engine`]. All
//! repository mutations flow through the engine.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use anyhow::Result;

use crate::engine;

/// Run the CLI application. This is the entry point called from `main`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = engine::Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}

/// Initialize the tracing subscriber. `RUST_LOG` wins when set; `--debug`
/// lowers the default level otherwise.
fn init_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "gitweave=debug" } else { "gitweave=warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
