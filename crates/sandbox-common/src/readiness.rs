//! Process-wide readiness state, written once by the startup sequence and
//! read by every facade. A single atomic word per field is sufficient; no
//! barrier beyond program order is required since there is exactly one
//! writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ReadinessSnapshot {
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared readiness flag. Transitions exactly once from
/// `{complete: false, error: None}` to `{complete: true, error: Option<_>}`.
#[derive(Debug, Default)]
pub struct Readiness {
    complete: AtomicBool,
    error: RwLock<Option<String>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark startup complete. `error` is set when the init script or env
    /// install left the service in a degraded-but-serving state
    /// (READY-BUT-UNHEALTHY in the lifecycle state machine).
    pub fn mark_ready(&self, error: Option<String>) {
        if let Some(msg) = error {
            *self.error.write().unwrap() = Some(msg);
        }
        self.complete.store(true, Ordering::SeqCst);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().unwrap().clone()
    }

    pub fn snapshot(&self) -> ReadinessSnapshot {
        ReadinessSnapshot {
            complete: self.is_complete(),
            error: self.error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_incomplete() {
        let r = Readiness::new();
        assert!(!r.is_complete());
        assert!(r.error().is_none());
    }

    #[test]
    fn mark_ready_without_error() {
        let r = Readiness::new();
        r.mark_ready(None);
        assert!(r.is_complete());
        assert!(r.error().is_none());
    }

    #[test]
    fn mark_ready_with_error_is_still_complete() {
        let r = Readiness::new();
        r.mark_ready(Some("init script failed".to_string()));
        assert!(r.is_complete());
        assert_eq!(r.error().as_deref(), Some("init script failed"));
    }
}
