use embassy_time::{Duration, Instant};

use super::TimeProvider;

/// Uptime straight from the embassy time driver, which counts from boot.
///
/// `offset` shifts the reading, e.g. to carry uptime across a deep-sleep wake-up where the
/// driver restarts at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock {
    offset: Duration,
}

impl EmbassyClock {
    pub const fn new() -> Self {
        Self {
            offset: Duration::from_ticks(0),
        }
    }

    pub const fn with_offset(offset: Duration) -> Self {
        Self { offset }
    }
}

impl TimeProvider for EmbassyClock {
    fn uptime_ms(&self) -> u64 {
        Instant::now().as_millis().saturating_add(self.offset.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_never_goes_back() {
        let clock = EmbassyClock::new();
        let mut last = clock.uptime_ms();
        for _ in 0..100 {
            let now = clock.uptime_ms();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_offset_is_added() {
        let base = EmbassyClock::new().uptime_ms();
        let shifted = EmbassyClock::with_offset(Duration::from_secs(3600)).uptime_ms();
        assert!(shifted >= base + 3_600_000);
    }
}
