//! The simulator state the control server mutates.
//!
//! [`Medium`] is the seam between the server and the simulation engine: a
//! station registry plus the SNR matrix indexed by station position. The
//! server never touches a `Medium` directly; all access goes through
//! [`crate::gateway::Gateway`], which serializes it.

pub mod matrix;
pub mod table;

pub use matrix::SnrMatrix;
pub use table::StationTable;

use thiserror::Error;

use crate::protocol::{MacAddr, StationId};

/// SNR assigned to links of a newly added station, in dB.
pub const DEFAULT_SNR: i32 = 30;

/// Snapshot of one registered station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationRef {
    pub id: StationId,
    pub addr: MacAddr,
    /// Row/column of this station in the SNR matrix.
    pub index: usize,
}

/// Errors reported by a [`Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MediumError {
    /// A station with this address is already registered.
    #[error("station {0} already exists")]
    Duplicate(MacAddr),
    /// Every station id is in use.
    #[error("no free station id")]
    IdsExhausted,
}

/// Station registry and SNR matrix of a running simulation.
pub trait Medium: Send {
    fn find(&self, addr: MacAddr) -> Option<StationRef>;

    fn find_by_id(&self, id: StationId) -> Option<StationRef>;

    fn station_count(&self) -> usize;

    /// Reads the SNR of `from → to` by matrix index.
    fn snr(&self, from: usize, to: usize) -> Option<i32>;

    /// Writes the SNR of `from → to` by matrix index.
    ///
    /// Returns `false` if either index is out of range.
    fn set_snr(&mut self, from: usize, to: usize, snr: i32) -> bool;

    /// Registers a new station and assigns it an id.
    ///
    /// # Errors
    ///
    /// - [`MediumError::Duplicate`] if `addr` is already registered
    /// - [`MediumError::IdsExhausted`] if no id is left
    fn add_station(&mut self, addr: MacAddr) -> Result<StationRef, MediumError>;

    /// Removes the station at matrix `index`, returning it.
    fn remove_station(&mut self, index: usize) -> Option<StationRef>;
}
