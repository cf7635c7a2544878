//! lifxctl - LIFX LAN Control CLI
//!
//! Runs a command against one bulb, every bulb, or the gateway bulb.
//!
//! # Usage
//!
//! ```bash
//! # List every bulb the gateway knows about
//! lifxctl list all
//!
//! # Skip discovery and talk to a known gateway
//! lifxctl status -gw 192.168.1.50 D0:73:D5:00:00:01 Kitchen
//!
//! # Print a roll-call every second for 30 seconds
//! lifxctl watch all 30
//! ```

use clap::Parser;
use liblifxctl::commands::{self, COMMAND_NAMES};
use liblifxctl::config::LifxConfig;
use liblifxctl::dispatcher::CommandDispatcher;
use liblifxctl::error::{LifxError, LifxResult};
use liblifxctl::inventory::InventoryDirectory;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

/// Exit status for arguments the command could not make sense of
const EXIT_USAGE: i32 = 2;

/// Everything after `<command>` is handed to the command untouched
const OPTIONS_NOTE: &str = "Options must come before <command>; later tokens are passed to the command.";

#[derive(Parser, Debug)]
#[command(name = "lifxctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LIFX LAN Control CLI - run commands against bulbs on the local network", long_about = None)]
#[command(after_help = OPTIONS_NOTE)]
struct Cli {
    /// Configuration file (defaults to $LIFXCTL_CONFIG, then ./lifxctl.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// <command> [-gw <ipv4> <mac>] <all|gateway|mac|name> [args...]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    let code = match run(&cli).await {
        Ok(true) => 0,
        Ok(false) => {
            eprintln!("{}", usage());
            EXIT_USAGE
        }
        // The diagnostic is already on stdout; not finding a gateway is not a failure
        Err(LifxError::GatewayUnreachable) => 0,
        Err(e @ LifxError::UnknownCommand(_)) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", usage());
            EXIT_USAGE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(code);
}

async fn run(cli: &Cli) -> LifxResult<bool> {
    let Some(name) = cli.args.first() else {
        return Ok(false);
    };
    let command = commands::command_for(name).ok_or_else(|| LifxError::UnknownCommand(name.clone()))?;

    let config_path = LifxConfig::resolve_path(cli.config.as_deref());
    debug!("Loading configuration from {}", config_path.display());
    let config = LifxConfig::load_or_default(&config_path)?;

    let dispatcher = CommandDispatcher::new(Arc::new(InventoryDirectory::new(config.clone())))
        .with_poll_interval(config.defaults.poll_interval());

    let mut out = std::io::stdout();
    let result = dispatcher.execute(command.as_ref(), &cli.args, &mut out).await;
    out.flush()?;
    result
}

fn usage() -> String {
    format!(
        "Usage: lifxctl [OPTIONS] <{}> [-gw <ipv4> <mac>] <all|gateway|mac|name> [args...]\n{}",
        COMMAND_NAMES.join("|"),
        OPTIONS_NOTE
    )
}

/// Initialize logging based on command-line arguments
fn init_logging(cli: &Cli) {
    let log_level: &str = if cli.verbose {
        "debug"
    } else {
        &cli.log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("lifxctl={},liblifxctl={}", log_level, log_level))
        });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}
