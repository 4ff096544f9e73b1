//! Progress meter.

use serde::{Deserialize, Serialize};

/// Work done versus estimated total.
///
/// The total is an estimate and may grow while the job runs; `current` never
/// exceeds it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMeter {
    pub current: u64,
    pub total: u64,
}

impl ProgressMeter {
    /// Record `done` units of finished work.
    pub fn update(&mut self, done: u64) {
        self.current = self.current.saturating_add(done);
        self.total = self.total.max(self.current);
    }

    /// Set the estimate of remaining work.
    pub fn set_remaining(&mut self, remaining: u64) {
        self.total = self.current.saturating_add(remaining);
    }

    pub fn increase_remaining(&mut self, delta: u64) {
        self.total = self.total.saturating_add(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_grows_total_when_overrun() {
        let mut p = ProgressMeter::default();
        p.set_remaining(10);
        p.update(4);
        assert_eq!((p.current, p.total), (4, 10));
        p.update(8);
        assert_eq!((p.current, p.total), (12, 12));
    }

    #[test]
    fn remaining_is_relative_to_current() {
        let mut p = ProgressMeter::default();
        p.update(5);
        p.set_remaining(3);
        assert_eq!(p.total, 8);
        p.increase_remaining(2);
        assert_eq!(p.total, 10);
    }
}
