//! Control server daemon.
//!
//! Serves the control socket over an in-memory station registry until it
//! receives `SIGINT` or a client sends a `Shutdown` request.
//!
//! # Usage
//!
//! ```sh
//! wserver --socket /tmp/wmediumd.sock --station 02:00:00:00:00:01 --station 02:00:00:00:00:02
//! wserver --config wserver.toml
//! ```

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use wserver::{Config, ConfigError, MacAddr, MediumError, Server, ServerError};

/// Runtime control server for the wireless-medium simulator
#[derive(Parser, Debug)]
#[command(name = "wserver", version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control socket path (overrides the config file)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Station to register at startup, may be repeated
    #[arg(long = "station", value_name = "MAC")]
    stations: Vec<MacAddr>,

    /// SNR of links involving new stations (overrides the config file)
    #[arg(long, allow_negative_numbers = true)]
    default_snr: Option<i32>,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid station list: {0}")]
    Medium(#[from] MediumError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("wserver: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunError> {
    wserver::init_tracing();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
    }
    if let Some(snr) = args.default_snr {
        config.medium.default_snr = snr;
    }
    config.medium.stations.extend(args.stations);
    config.validate()?;

    let medium = config.medium.build()?;
    let server = Server::start(&config.server, medium)?;
    server.wait();
    Ok(())
}
