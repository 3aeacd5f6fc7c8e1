//! Time source: a free-running millisecond counter plus the single-shot
//! alarm the scheduler re-arms after each scheduling pass.
//!
//! Mirrors the shape of [`crate::logger::get_timestamp`]'s monotonic tick
//! counter, split into a trait so the scheduler core stays portable and
//! tests can drive time explicitly instead of reading real hardware.

pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Program a single-shot alarm to fire no later than `deadline_ms`
    /// milliseconds from now. Clocks that cannot arm real hardware (the
    /// host/test [`ManualClock`]) may no-op; the scheduler still computes
    /// the deadline either way.
    fn arm(&mut self, deadline_ms: u64) {
        let _ = deadline_ms;
    }
}

/// A host/test clock driven by explicitly advancing a millisecond counter.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: u64,
    pub last_armed: Option<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn arm(&mut self, deadline_ms: u64) {
        self.last_armed = Some(deadline_ms);
    }
}
