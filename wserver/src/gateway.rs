//! Synchronized access to the simulator state.
//!
//! Every operation takes the one medium lock for exactly the lookup and the
//! mutation it performs, so concurrent requests from different connections
//! never interleave inside an operation. The lock is never held across
//! socket I/O.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::medium::{Medium, MediumError, StationRef};
use crate::protocol::{MacAddr, StationId, UpdateResult};

/// Shared handle to the simulator's station registry and SNR matrix.
pub struct Gateway {
    medium: Mutex<Box<dyn Medium>>,
}

impl Gateway {
    pub fn new<M: Medium + 'static>(medium: M) -> Self {
        Self {
            medium: Mutex::new(Box::new(medium)),
        }
    }

    // Poison is ignored: every mutation is a single medium call.
    fn lock(&self) -> MutexGuard<'_, Box<dyn Medium>> {
        self.medium.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn find_station(&self, addr: MacAddr) -> Option<StationRef> {
        self.lock().find(addr)
    }

    /// Sets the SNR of the directional link `from → to`.
    ///
    /// Returns [`UpdateResult::NotFound`] without side effects if either
    /// station is unknown.
    pub fn update_snr(&self, from: MacAddr, to: MacAddr, snr: i32) -> UpdateResult {
        let mut medium = self.lock();
        let (Some(sender), Some(receiver)) = (medium.find(from), medium.find(to)) else {
            return UpdateResult::NotFound;
        };
        if medium.set_snr(sender.index, receiver.index, snr) {
            UpdateResult::Success
        } else {
            UpdateResult::NotFound
        }
    }

    /// Registers a station and returns its new id.
    ///
    /// # Errors
    ///
    /// Propagates [`MediumError::Duplicate`] and [`MediumError::IdsExhausted`].
    pub fn add_station(&self, addr: MacAddr) -> Result<StationId, MediumError> {
        self.lock().add_station(addr).map(|station| station.id)
    }

    pub fn delete_station_by_id(&self, id: StationId) -> UpdateResult {
        let mut medium = self.lock();
        let Some(station) = medium.find_by_id(id) else {
            return UpdateResult::NotFound;
        };
        match medium.remove_station(station.index) {
            Some(_) => UpdateResult::Success,
            None => UpdateResult::NotFound,
        }
    }

    pub fn delete_station_by_mac(&self, addr: MacAddr) -> UpdateResult {
        let mut medium = self.lock();
        let Some(station) = medium.find(addr) else {
            return UpdateResult::NotFound;
        };
        match medium.remove_station(station.index) {
            Some(_) => UpdateResult::Success,
            None => UpdateResult::NotFound,
        }
    }

    /// Reads the SNR of `from → to`, `None` if either station is unknown.
    #[must_use]
    pub fn snr(&self, from: MacAddr, to: MacAddr) -> Option<i32> {
        let medium = self.lock();
        let sender = medium.find(from)?;
        let receiver = medium.find(to)?;
        medium.snr(sender.index, receiver.index)
    }

    #[must_use]
    pub fn station_count(&self) -> usize {
        self.lock().station_count()
    }

    /// Runs `f` with exclusive access to the medium.
    ///
    /// This is how the simulation engine reads link state while the server
    /// is running.
    pub fn with_medium<R>(&self, f: impl FnOnce(&mut dyn Medium) -> R) -> R {
        let mut medium = self.lock();
        f(&mut **medium)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medium::StationTable;
    use std::sync::Arc;
    use std::thread;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, last])
    }

    fn gateway_with(n: u8) -> Gateway {
        let table = StationTable::with_stations(30, (1..=n).map(mac)).unwrap();
        Gateway::new(table)
    }

    #[test]
    fn update_writes_one_directional_cell() {
        let gw = gateway_with(3);
        assert_eq!(gw.update_snr(mac(1), mac(2), 11), UpdateResult::Success);
        assert_eq!(gw.snr(mac(1), mac(2)), Some(11));
        assert_eq!(gw.snr(mac(2), mac(1)), Some(30));
        assert_eq!(gw.snr(mac(1), mac(3)), Some(30));
    }

    #[test]
    fn update_with_unknown_endpoint_changes_nothing() {
        let gw = gateway_with(2);
        let before = gw.with_medium(|m| (m.snr(0, 1), m.snr(1, 0)));
        assert_eq!(gw.update_snr(mac(1), mac(9), 3), UpdateResult::NotFound);
        assert_eq!(gw.update_snr(mac(9), mac(1), 3), UpdateResult::NotFound);
        let after = gw.with_medium(|m| (m.snr(0, 1), m.snr(1, 0)));
        assert_eq!(before, after);
    }

    #[test]
    fn add_then_duplicate() {
        let gw = gateway_with(0);
        let id = gw.add_station(mac(1)).unwrap();
        assert_ne!(id, StationId::NONE);
        assert_eq!(
            gw.add_station(mac(1)),
            Err(MediumError::Duplicate(mac(1)))
        );
        assert_eq!(gw.station_count(), 1);
    }

    #[test]
    fn delete_by_id_and_mac() {
        let gw = gateway_with(2);
        assert_eq!(
            gw.delete_station_by_id(StationId::new(7)),
            UpdateResult::NotFound
        );
        assert_eq!(
            gw.delete_station_by_id(StationId::new(1)),
            UpdateResult::Success
        );
        assert!(gw.find_station(mac(1)).is_none());

        assert_eq!(gw.delete_station_by_mac(mac(9)), UpdateResult::NotFound);
        assert_eq!(gw.delete_station_by_mac(mac(2)), UpdateResult::Success);
        assert!(gw.find_station(mac(2)).is_none());
        assert_eq!(gw.station_count(), 0);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let gw = Arc::new(gateway_with(16));
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let gw = Arc::clone(&gw);
                thread::spawn(move || {
                    let from = mac(2 * i + 1);
                    let to = mac(2 * i + 2);
                    for v in 0..100 {
                        assert_eq!(gw.update_snr(from, to, v), UpdateResult::Success);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..8u8 {
            assert_eq!(gw.snr(mac(2 * i + 1), mac(2 * i + 2)), Some(99));
        }
    }
}
