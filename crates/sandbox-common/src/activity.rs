//! Activity timestamp and idle-shutdown policy.
//!
//! A single racy `AtomicU64` holding milliseconds since `UNIX_EPOCH`. Writes
//! are unordered but idempotent: "last writer wins" is acceptable since any
//! recent update keeps the service alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Header the orchestrator attaches to its readiness probe requests; such
/// requests do not count as activity.
pub const READINESS_PROBE_HEADER: &str = "X-Apify-Container-Server-Readiness-Probe";

#[derive(Debug)]
pub struct ActivityMonitor {
    last_activity_millis: AtomicU64,
}

impl ActivityMonitor {
    pub fn new() -> Self {
        Self {
            last_activity_millis: AtomicU64::new(now_millis()),
        }
    }

    pub fn touch(&self) {
        self.last_activity_millis.store(now_millis(), Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_millis.load(Ordering::Relaxed);
        let now = now_millis();
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn touch_resets_idle_duration() {
        let monitor = ActivityMonitor::new();
        sleep(Duration::from_millis(20));
        let idle_before = monitor.idle_for();
        assert!(idle_before >= Duration::from_millis(15));

        monitor.touch();
        let idle_after = monitor.idle_for();
        assert!(idle_after < idle_before);
    }
}
