//! Process-wide verification counters.
//!
//! Counters are bumped silently; [`Metrics::flush`] emits them as one
//! `info!` event (the CLI does this before exiting).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counters shared by every orchestrator and service in the process.
pub static METRICS: Metrics = Metrics::new();

/// Relaxed atomic counters. Reads are monotonic per counter but not a
/// consistent snapshot across counters.
pub struct Metrics {
    sessions_created: AtomicU64,
    sessions_completed: AtomicU64,
    results_recorded: AtomicU64,
    engine_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sessions_created: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            results_recorded: AtomicU64::new(0),
            engine_failures: AtomicU64::new(0),
        }
    }

    /// Increment the sessions-created counter by one.
    pub fn inc_sessions_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_created", "counter incremented");
    }

    /// Increment the sessions-completed counter by one.
    pub fn inc_sessions_completed(&self) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sessions_completed", "counter incremented");
    }

    /// Increment the results-recorded counter by one.
    pub fn inc_results_recorded(&self) {
        self.results_recorded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "results_recorded", "counter incremented");
    }

    /// Increment the engine-failures counter by one. Counted for every
    /// engine error, including `EngineUnavailable`.
    pub fn inc_engine_failures(&self) {
        self.engine_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "engine_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// The CLI calls this once before exiting.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sessions_created = self.sessions_created(),
            sessions_completed = self.sessions_completed(),
            results_recorded = self.results_recorded(),
            engine_failures = self.engine_failures(),
        );
    }

    /// Read the current sessions-created count.
    pub fn sessions_created(&self) -> u64 {
        self.sessions_created.load(Ordering::Relaxed)
    }

    /// Read the current sessions-completed count.
    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed.load(Ordering::Relaxed)
    }

    /// Read the current results-recorded count.
    pub fn results_recorded(&self) -> u64 {
        self.results_recorded.load(Ordering::Relaxed)
    }

    /// Read the current engine-failures count.
    pub fn engine_failures(&self) -> u64 {
        self.engine_failures.load(Ordering::Relaxed)
    }

    /// Zero every counter. Tests only; the global is shared process-wide.
    pub fn reset(&self) {
        for counter in [
            &self.sessions_created,
            &self.sessions_completed,
            &self.results_recorded,
            &self.engine_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn counters_are_independent() {
        let m = Metrics::new();
        m.inc_sessions_created();
        m.inc_sessions_created();
        m.inc_results_recorded();
        m.inc_engine_failures();
        assert_eq!(m.sessions_created(), 2);
        assert_eq!(m.sessions_completed(), 0);
        assert_eq!(m.results_recorded(), 1);
        assert_eq!(m.engine_failures(), 1);

        m.reset();
        assert_eq!(m.sessions_created(), 0);
        assert_eq!(m.engine_failures(), 0);
    }

    #[traced_test]
    #[test]
    fn increments_and_flush_are_traced() {
        let m = Metrics::new();
        m.inc_results_recorded();
        assert!(logs_contain("results_recorded"));
        m.flush();
        assert!(logs_contain("flush"));
    }
}
