mod provider;

pub use provider::EmbassyClock;

/// Monotonic millisecond clock. Every timeout in the mesh is a comparison against this.
pub trait TimeProvider {
    fn uptime_ms(&self) -> u64;
}

impl<T: TimeProvider + ?Sized> TimeProvider for &T {
    fn uptime_ms(&self) -> u64 {
        (**self).uptime_ms()
    }
}
