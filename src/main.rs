//! Entry point for the `tcp-session` CLI client.
//!
//! Connects to a host, optionally sends a payload, optionally reads a number
//! of bytes back, and prints them to stdout.  All protocol work is delegated
//! to the library; `main.rs` owns only process setup (logging, argument
//! parsing, exit codes).

use std::io::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tcp_session::Session;

/// Blocking TCP client with poll-bounded connect and read.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Remote hostname or IPv4 address.
    host: String,
    /// Remote TCP port.
    port: u16,
    /// Poll timeout in milliseconds for connect and read readiness.
    #[arg(short, long, default_value_t = 60_000)]
    timeout_ms: u64,
    /// Payload to send after connecting (UTF-8 text).
    #[arg(short, long)]
    send: Option<String>,
    /// Number of bytes to read back and print to stdout.
    #[arg(short, long)]
    read: Option<usize>,
    /// Enable per-session debug diagnostics (also set RUST_LOG=debug).
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let mut session = Session::new();
    session
        .set_poll_timeout(Duration::from_millis(cli.timeout_ms))
        .set_debug_log(cli.debug);

    log::info!("connecting to {}:{}", cli.host, cli.port);
    session
        .connect(&cli.host, cli.port)
        .with_context(|| format!("connect to {}:{}", cli.host, cli.port))?;

    if let Some(payload) = &cli.send {
        session.write(payload.as_str()).context("send payload")?;
    }

    if let Some(count) = cli.read {
        let outcome = session.read(count).context("read")?;
        if let Some(bytes) = &outcome.data {
            std::io::stdout().write_all(bytes).context("write stdout")?;
        }
        if let Some(err) = &outcome.error {
            eprintln!("read stopped early: {err}");
            session.close();
            std::process::exit(1);
        }
    }

    session.close();
    Ok(())
}
