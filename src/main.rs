//! btcli - command line client for the btpd BitTorrent daemon.
//!
//! Every subcommand opens one connection to the daemon's socket in the btpd
//! directory, sends its requests in turn and renders the replies on stdout.

mod client;
mod commands;
mod config;
mod metainfo;
mod protocol;
mod rate;
mod render;
mod resolve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::control::{AddArgs, DelArgs, RateArgs, ToggleArgs};
use commands::list::ListArgs;
use commands::stat::StatArgs;
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "btcli")]
#[command(author, version, about = "Control and inspect a running btpd")]
struct Cli {
    /// The btpd directory. Defaults to $BTPD_HOME, the config file or ~/.btpd
    #[arg(short = 'd', value_name = "DIR")]
    btpd_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add torrents to btpd
    Add(AddArgs),
    /// Remove torrents from btpd
    Del(DelArgs),
    /// Shut down btpd
    Kill,
    /// List torrents
    List(ListArgs),
    /// Set the global upload and download rate limits
    Rate(RateArgs),
    /// Activate torrents
    Start(ToggleArgs),
    /// Display transfer statistics
    Stat(StatArgs),
    /// Deactivate torrents
    Stop(ToggleArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // help and version requests are not errors
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("btcli: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; stdout only carries rendered output.
fn init_logging(verbose: bool) {
    let default = if verbose { "btcli=debug" } else { "btcli=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let btpd_dir = config.find_btpd_dir(cli.btpd_dir.as_deref())?;
    debug!("btpd directory is {}", btpd_dir.display());

    match cli.command {
        Commands::Add(args) => commands::control::add(&btpd_dir, &config, args).await,
        Commands::Del(args) => commands::control::del(&btpd_dir, &config, args).await,
        Commands::Kill => commands::control::kill(&btpd_dir, &config).await,
        Commands::List(args) => commands::list::run(&btpd_dir, &config, args).await,
        Commands::Rate(args) => commands::control::rate(&btpd_dir, &config, args).await,
        Commands::Start(args) => commands::control::start(&btpd_dir, &config, args).await,
        Commands::Stat(args) => commands::stat::run(&btpd_dir, &config, args).await,
        Commands::Stop(args) => commands::control::stop(&btpd_dir, &config, args).await,
    }
}
