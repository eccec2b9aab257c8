//! Command-line interface and the interactive client loop
// (c) 2025 Ross Younger

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr as _;

use anyhow::Context as _;
use clap::Parser;
use tracing::error;

use crate::channel::Channel;
use crate::client::Client;
use crate::config::Configuration;
use crate::server::Server;
use crate::storage::StorageDir;
use crate::util::{setup_tracing, trace_level, tracing_is_initialised};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub(crate) struct CliArgs {
    /// Runs in server mode, exchanging files with one client at a time.
    ///
    /// In this mode TARGET is the storage directory to serve.
    #[arg(long)]
    server: bool,

    /// Enables detailed debug output
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode: errors only
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Port for the control channel
    #[arg(long, value_name = "PORT", default_value_t = Configuration::DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Port for the per-operation data channels
    #[arg(long, value_name = "PORT", default_value_t = Configuration::DEFAULT_DATA_PORT)]
    data_port: u16,

    /// Directory the client stores and fetches files in
    #[arg(long, value_name = "DIR", default_value = ".")]
    storage: PathBuf,

    /// Server mode: the storage directory. Client mode: the host to
    /// connect to; commands are then read from standard input, one per
    /// line, until end of input: `GET <name>` or `SEND <name>`.
    #[arg(value_name = "TARGET")]
    target: String,
}

/// Main CLI entrypoint
///
/// Call this from `main`, passing `std::env::args_os()`.
#[must_use]
pub fn cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match cli_inner(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if tracing_is_initialised() {
                error!("{e:#}");
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn cli_inner<I, T>(args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = CliArgs::parse_from(args);
    setup_tracing(trace_level(args.debug, args.quiet))?;
    let config = Configuration {
        control_port: args.control_port,
        data_port: args.data_port,
    };

    if args.server {
        let storage = StorageDir::new(PathBuf::from(&args.target))?;
        Server::bind(storage, config)?.run()
    } else {
        let storage = StorageDir::new(args.storage)?;
        let mut client = Client::connect(&args.target, &config, storage)?;
        repl(&mut client, std::io::stdin().lock(), std::io::stdout())
    }
}

/// Command words accepted on standard input.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
enum CommandWord {
    Get,
    Send,
}

/// Reads `GET <name>` / `SEND <name>` lines until end of input.
///
/// A failed command is reported and the loop moves on to the next line;
/// the control channel is never closed as a side effect.
fn repl<C: Channel, R: BufRead, W: Write>(
    client: &mut Client<C>,
    input: R,
    mut output: W,
) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line.context("reading command input")?;
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            continue;
        };
        let outcome = match (CommandWord::from_str(word), words.next()) {
            (Ok(CommandWord::Get), Some(name)) => client
                .get(name)
                .map(|n| format!("fetched {name} ({n} bytes)")),
            (Ok(CommandWord::Send), Some(name)) => client
                .send(name)
                .map(|n| format!("sent {name} ({n} bytes)")),
            _ => {
                writeln!(output, "usage: GET <name> | SEND <name>")?;
                continue;
            }
        };
        match outcome {
            Ok(message) => writeln!(output, "{message}")?,
            Err(e) => writeln!(output, "{word} failed: {e:#}")?,
        }
    }
    Ok(())
}
