//! In-memory station registry.

use crate::protocol::{MacAddr, StationId};

use super::{Medium, MediumError, SnrMatrix, StationRef};

#[derive(Debug, Clone, Copy)]
struct Station {
    id: StationId,
    addr: MacAddr,
}

/// A [`Medium`] that keeps stations in a `Vec`.
///
/// A station's matrix index is its position in the list, so removing a
/// station shifts the index of every later one. Ids are the lowest value in
/// `1..=255` not currently in use.
#[derive(Debug, Clone)]
pub struct StationTable {
    stations: Vec<Station>,
    matrix: SnrMatrix,
    default_snr: i32,
}

impl StationTable {
    #[must_use]
    pub fn new(default_snr: i32) -> Self {
        Self {
            stations: Vec::new(),
            matrix: SnrMatrix::new(0, default_snr),
            default_snr,
        }
    }

    /// Creates a table pre-populated with `addrs`, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first duplicate address, or if more than 255 are given.
    pub fn with_stations<I>(default_snr: i32, addrs: I) -> Result<Self, MediumError>
    where
        I: IntoIterator<Item = MacAddr>,
    {
        let mut table = Self::new(default_snr);
        for addr in addrs {
            table.add_station(addr)?;
        }
        Ok(table)
    }

    fn next_free_id(&self) -> Option<StationId> {
        (1..=u8::MAX)
            .find(|&candidate| !self.stations.iter().any(|s| s.id.as_u8() == candidate))
            .map(StationId::new)
    }

    fn station_ref(&self, index: usize) -> Option<StationRef> {
        self.stations.get(index).map(|s| StationRef {
            id: s.id,
            addr: s.addr,
            index,
        })
    }
}

impl Default for StationTable {
    fn default() -> Self {
        Self::new(super::DEFAULT_SNR)
    }
}

impl Medium for StationTable {
    fn find(&self, addr: MacAddr) -> Option<StationRef> {
        let index = self.stations.iter().position(|s| s.addr == addr)?;
        self.station_ref(index)
    }

    fn find_by_id(&self, id: StationId) -> Option<StationRef> {
        let index = self.stations.iter().position(|s| s.id == id)?;
        self.station_ref(index)
    }

    fn station_count(&self) -> usize {
        self.stations.len()
    }

    fn snr(&self, from: usize, to: usize) -> Option<i32> {
        self.matrix.get(from, to)
    }

    fn set_snr(&mut self, from: usize, to: usize, snr: i32) -> bool {
        self.matrix.set(from, to, snr)
    }

    fn add_station(&mut self, addr: MacAddr) -> Result<StationRef, MediumError> {
        if self.find(addr).is_some() {
            return Err(MediumError::Duplicate(addr));
        }
        let id = self.next_free_id().ok_or(MediumError::IdsExhausted)?;
        self.stations.push(Station { id, addr });
        self.matrix.grow(self.default_snr);
        Ok(StationRef {
            id,
            addr,
            index: self.stations.len() - 1,
        })
    }

    fn remove_station(&mut self, index: usize) -> Option<StationRef> {
        let removed = self.station_ref(index)?;
        self.stations.remove(index);
        self.matrix.remove(index);
        Some(removed)
    }
}
