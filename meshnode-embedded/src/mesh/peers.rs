use heapless::Vec;

use crate::types::MacAddress;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerRecord {
    pub link_address: MacAddress,
    pub last_seen_at: u64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerUpdate {
    Inserted(usize),
    Refreshed(usize),
}

/// Fixed table of neighbors that paired with this node.
#[derive(Debug)]
pub struct PeerTable<const N: usize> {
    peers: [PeerRecord; N],
}

impl<const N: usize> PeerTable<N> {
    pub fn new() -> Self {
        Self {
            peers: [PeerRecord::default(); N],
        }
    }

    pub fn find(&self, address: &MacAddress) -> Option<usize> {
        self.peers
            .iter()
            .position(|peer| peer.active && peer.link_address == *address)
    }

    pub fn get(&self, address: &MacAddress) -> Option<&PeerRecord> {
        self.find(address).map(|index| &self.peers[index])
    }

    /// Refresh a known peer or take the first free slot for a new one.
    pub fn upsert(&mut self, address: &MacAddress, now: u64) -> Result<PeerUpdate> {
        if let Some(index) = self.find(address) {
            self.peers[index].last_seen_at = now;
            return Ok(PeerUpdate::Refreshed(index));
        }

        let index = self
            .peers
            .iter()
            .position(|peer| !peer.active)
            .ok_or(Error::PeerTableFull)?;

        self.peers[index] = PeerRecord {
            link_address: *address,
            last_seen_at: now,
            active: true,
        };
        Ok(PeerUpdate::Inserted(index))
    }

    /// Refresh only if already known. Returns whether the peer exists.
    pub fn touch(&mut self, address: &MacAddress, now: u64) -> bool {
        match self.find(address) {
            Some(index) => {
                self.peers[index].last_seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Free every slot idle for longer than `timeout_ms`, returning the reaped addresses so the
    /// caller can drop them from the radio's neighbor list.
    pub fn reap_stale(&mut self, now: u64, timeout_ms: u64) -> Vec<MacAddress, N> {
        let mut reaped = Vec::new();
        for peer in self.peers.iter_mut() {
            if peer.active && now.saturating_sub(peer.last_seen_at) > timeout_ms {
                peer.active = false;
                // Capacity equals the table size
                let _ = reaped.push(peer.link_address);
            }
        }
        reaped
    }

    pub fn active_count(&self) -> usize {
        self.peers.iter().filter(|peer| peer.active).count()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.iter().filter(|peer| peer.active)
    }

    pub fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for PeerTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(i: u8) -> MacAddress {
        [0x02, 0, 0, 0, 0, i]
    }

    #[test]
    fn test_insert_and_refresh() {
        let mut table = PeerTable::<20>::new();

        assert_eq!(table.upsert(&mac(1), 100), Ok(PeerUpdate::Inserted(0)));
        assert_eq!(table.upsert(&mac(2), 200), Ok(PeerUpdate::Inserted(1)));
        assert_eq!(table.upsert(&mac(1), 300), Ok(PeerUpdate::Refreshed(0)));

        assert_eq!(table.active_count(), 2);
        assert_eq!(table.get(&mac(1)).unwrap().last_seen_at, 300);

        assert!(table.touch(&mac(2), 400));
        assert!(!table.touch(&mac(3), 400));
        assert_eq!(table.get(&mac(2)).unwrap().last_seen_at, 400);
        assert!(table.get(&mac(3)).is_none());
    }

    #[test]
    fn test_full_table_rejects_new_peer() {
        let mut table = PeerTable::<20>::new();
        for i in 0..20 {
            assert!(table.upsert(&mac(i), 1000).is_ok());
        }

        assert_eq!(table.upsert(&mac(20), 2000), Err(Error::PeerTableFull));
        assert_eq!(table.active_count(), 20);
        for i in 0..20 {
            assert_eq!(table.get(&mac(i)).unwrap().last_seen_at, 1000);
        }

        // Known peers can still be refreshed
        assert_eq!(table.upsert(&mac(5), 3000), Ok(PeerUpdate::Refreshed(5)));
    }

    #[test]
    fn test_reap_frees_slots_for_reuse() {
        let mut table = PeerTable::<3>::new();
        table.upsert(&mac(1), 0).unwrap();
        table.upsert(&mac(2), 250_000).unwrap();
        table.upsert(&mac(3), 0).unwrap();

        let reaped = table.reap_stale(300_001, 300_000);
        assert_eq!(reaped.as_slice(), &[mac(1), mac(3)]);
        assert_eq!(table.active_count(), 1);

        // Exactly at the timeout is still alive
        let reaped = table.reap_stale(550_000, 300_000);
        assert!(reaped.is_empty());

        assert_eq!(table.upsert(&mac(4), 550_000), Ok(PeerUpdate::Inserted(0)));
        assert_eq!(table.upsert(&mac(5), 550_000), Ok(PeerUpdate::Inserted(2)));
        assert_eq!(table.iter_active().count(), 3);
        assert_eq!(table.capacity(), 3);
    }
}
