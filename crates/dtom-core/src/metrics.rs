//! Atomic counters for one pipeline run.
//!
//! Counters are incremented silently at the call site. Call
//! [`PipelineMetrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lightweight atomic counters, owned by a pipeline context and shared by
/// reference across species tasks.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    extraction_calls: AtomicU64,
    extraction_failures: AtomicU64,
    audit_calls: AtomicU64,
    audit_failures: AtomicU64,
    corrections_applied: AtomicU64,
    species_converged: AtomicU64,
    species_exhausted: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub extraction_calls: u64,
    pub extraction_failures: u64,
    pub audit_calls: u64,
    pub audit_failures: u64,
    pub corrections_applied: u64,
    pub species_converged: u64,
    pub species_exhausted: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_extraction_calls(&self) {
        self.extraction_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "extraction_calls", "counter incremented");
    }

    pub fn inc_extraction_failures(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "extraction_failures", "counter incremented");
    }

    pub fn inc_audit_calls(&self) {
        self.audit_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "audit_calls", "counter incremented");
    }

    pub fn inc_audit_failures(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "audit_failures", "counter incremented");
    }

    pub fn add_corrections(&self, n: u64) {
        self.corrections_applied.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_converged(&self) {
        self.species_converged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_exhausted(&self) {
        self.species_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            extraction_calls: self.extraction_calls.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            audit_calls: self.audit_calls.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            corrections_applied: self.corrections_applied.load(Ordering::Relaxed),
            species_converged: self.species_converged.load(Ordering::Relaxed),
            species_exhausted: self.species_exhausted.load(Ordering::Relaxed),
        }
    }

    /// Emit all counters as a single structured `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            event = "metrics.flush",
            extraction_calls = s.extraction_calls,
            extraction_failures = s.extraction_failures,
            audit_calls = s.audit_calls,
            audit_failures = s.audit_failures,
            corrections_applied = s.corrections_applied,
            species_converged = s.species_converged,
            species_exhausted = s.species_exhausted,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.inc_extraction_calls();
        metrics.inc_extraction_calls();
        metrics.inc_audit_failures();
        metrics.add_corrections(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.extraction_calls, 2);
        assert_eq!(snap.audit_failures, 1);
        assert_eq!(snap.corrections_applied, 3);
        assert_eq!(snap.species_converged, 0);
    }
}
