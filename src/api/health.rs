//! Shared health state for the /health endpoint.
//! Updated by the monitor loop after every cycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

/// Cycle bookkeeping. Written by the monitor, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// Nanosecond timestamp of the last finished cycle (0 = none yet).
    pub last_cycle_at_ns: AtomicU64,
    pub cycles_completed: AtomicU64,
    pub cycles_failed: AtomicU64,
    /// Outcome of the most recent cycle.
    pub last_cycle_ok: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub last_cycle_at_ns: Option<u64>,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle_ok: bool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, ok: bool, at_ns: u64) {
        self.last_cycle_at_ns.store(at_ns, Ordering::Relaxed);
        self.last_cycle_ok.store(ok, Ordering::Relaxed);
        if ok {
            self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn last_cycle_at_ns(&self) -> u64 {
        self.last_cycle_at_ns.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let last = self.last_cycle_at_ns();
        let ok = self.last_cycle_ok.load(Ordering::Relaxed);
        let status = match (last, ok) {
            (0, _) => "starting",
            (_, true) => "ok",
            (_, false) => "degraded",
        };
        HealthSnapshot {
            status,
            last_cycle_at_ns: (last != 0).then_some(last),
            cycles_completed: self.cycles_completed(),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            last_cycle_ok: ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_cycle_outcomes() {
        let health = HealthState::new();
        assert_eq!(health.snapshot().status, "starting");
        assert_eq!(health.snapshot().last_cycle_at_ns, None);

        health.record_cycle(true, 10);
        health.record_cycle(false, 20);
        let snap = health.snapshot();
        assert_eq!(snap.status, "degraded");
        assert_eq!(snap.last_cycle_at_ns, Some(20));
        assert_eq!(snap.cycles_completed, 1);
        assert_eq!(snap.cycles_failed, 1);

        health.record_cycle(true, 30);
        assert_eq!(health.snapshot().status, "ok");
    }
}
