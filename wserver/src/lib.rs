//! Runtime control server for a wireless-medium simulator.
//!
//! External tools connect to a Unix-domain socket and adjust the simulated
//! medium while it runs: add and remove stations, set the SNR of individual
//! links, or stop the server. See [`protocol`] for the wire format and
//! [`server`] for the threading and shutdown model.

pub mod client;
pub mod config;
pub mod gateway;
pub mod medium;
pub mod net;
pub mod protocol;
pub mod server;

mod trace;

pub use client::{Client, ClientError};
pub use config::{Config, ConfigError, MediumConfig, ServerConfig};
pub use gateway::Gateway;
pub use medium::{Medium, MediumError, StationTable};
pub use protocol::{MacAddr, StationId, UpdateResult};
pub use server::{Server, ServerError, ServerHandle};
pub use trace::init_tracing;
