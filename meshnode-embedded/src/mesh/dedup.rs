use crate::types::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenPacket {
    pub originator: MacAddress,
    pub sequence: u32,
    pub observed_at: u64,
}

/// Ring of recently seen (originator, sequence) pairs.
///
/// Slots are overwritten strictly in insertion order, so under heavy traffic an entry can be
/// evicted before its window has elapsed. Capacity bounds memory, not recency.
#[derive(Debug)]
pub struct DuplicateCache<const N: usize> {
    slots: [Option<SeenPacket>; N],
    next: usize,
    window_ms: u64,
}

impl<const N: usize> DuplicateCache<N> {
    pub fn new(window_ms: u64) -> Self {
        Self {
            slots: [None; N],
            next: 0,
            window_ms,
        }
    }

    /// True when the pair was recorded less than one window before `now`.
    pub fn contains(&self, originator: &MacAddress, sequence: u32, now: u64) -> bool {
        self.slots.iter().flatten().any(|seen| {
            seen.originator == *originator
                && seen.sequence == sequence
                && now.saturating_sub(seen.observed_at) < self.window_ms
        })
    }

    pub fn insert(&mut self, originator: MacAddress, sequence: u32, now: u64) {
        if N == 0 {
            return;
        }
        self.slots[self.next] = Some(SeenPacket {
            originator,
            sequence,
            observed_at: now,
        });
        self.next = (self.next + 1) % N;
    }

    /// Record the pair unless it is a live duplicate. Returns `true` for first sightings.
    pub fn check_and_insert(&mut self, originator: &MacAddress, sequence: u32, now: u64) -> bool {
        if self.contains(originator, sequence, now) {
            return false;
        }
        self.insert(*originator, sequence, now);
        true
    }
}
