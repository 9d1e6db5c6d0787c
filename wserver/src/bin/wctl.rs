//! One-shot client for a running `wserver`.
//!
//! ```sh
//! wctl add 02:00:00:00:00:03
//! wctl snr 02:00:00:00:00:01 02:00:00:00:00:03 -5
//! wctl --socket /tmp/wmediumd.sock del-id 3
//! wctl shutdown
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use wserver::config::DEFAULT_SOCKET_PATH;
use wserver::{Client, ClientError, MacAddr, StationId, UpdateResult};

/// Send one command to the wireless-medium control server
#[derive(Parser, Debug)]
#[command(name = "wctl", version)]
struct Args {
    /// Control socket path
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a station
    Add { addr: MacAddr },
    /// Remove the station with this hardware address
    DelMac { addr: MacAddr },
    /// Remove the station with this id
    DelId { id: u8 },
    /// Set the SNR of the link FROM -> TO
    Snr {
        from: MacAddr,
        to: MacAddr,
        #[arg(allow_negative_numbers = true)]
        snr: i32,
    },
    /// Stop the server
    Shutdown,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(UpdateResult::Success) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            eprintln!("wctl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<UpdateResult, ClientError> {
    let mut client = Client::connect(&args.socket)?;
    let result = match args.command {
        Command::Add { addr } => {
            let response = client.add_station(addr)?;
            println!("{} id={}", response.result, response.created_id);
            response.result
        }
        Command::DelMac { addr } => {
            let response = client.delete_by_mac(addr)?;
            println!("{}", response.result);
            response.result
        }
        Command::DelId { id } => {
            let response = client.delete_by_id(StationId::new(id))?;
            println!("{}", response.result);
            response.result
        }
        Command::Snr { from, to, snr } => {
            let response = client.update_snr(from, to, snr)?;
            println!("{}", response.result);
            response.result
        }
        Command::Shutdown => {
            client.shutdown()?;
            UpdateResult::Success
        }
    };
    Ok(result)
}
