// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

/// Admission gate in front of the event queue.
///
/// Tracks a single overloaded/normal state derived from queue occupancy and
/// logs each state transition exactly once, however many producers race the
/// crossing. The check is intentionally approximate: occupancy may move
/// between the admission decision and the enqueue, overshooting by at most the
/// number of in-flight producers.
pub struct BackpressureMonitor {
    capacity: usize,
    overloaded: AtomicBool,
    dropped: AtomicU64,
}

impl BackpressureMonitor {
    pub fn new(capacity: usize) -> Self {
        BackpressureMonitor {
            capacity,
            overloaded: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Decides whether a record at the given occupancy is accepted, updating
    /// the overload state. The swap makes the transition log single-shot even
    /// under concurrent callers.
    pub fn admit(&self, occupancy: usize) -> bool {
        if occupancy >= self.capacity {
            if !self.overloaded.swap(true, Ordering::Relaxed) {
                warn!("Maximum buffer size reached. Dropping incoming events.");
            }
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            if self.overloaded.swap(false, Ordering::Relaxed) {
                info!("Event buffering started.");
            }
            true
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.overloaded.load(Ordering::Relaxed)
    }

    /// Counts a record lost outside the admission check, e.g. an enqueue that
    /// lost the race against other producers.
    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Total records dropped since the pipeline started.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn admits_below_capacity() {
        let monitor = BackpressureMonitor::new(3);
        assert!(monitor.admit(0));
        assert!(monitor.admit(2));
        assert!(!monitor.is_overloaded());
        assert_eq!(monitor.dropped(), 0);
    }

    #[test]
    fn rejects_at_capacity_and_counts() {
        let monitor = BackpressureMonitor::new(3);
        assert!(!monitor.admit(3));
        assert!(!monitor.admit(5));
        assert!(monitor.is_overloaded());
        assert_eq!(monitor.dropped(), 2);
    }

    #[traced_test]
    #[test]
    fn logs_overload_transition_once() {
        let monitor = BackpressureMonitor::new(2);
        assert!(!monitor.admit(2));
        assert!(!monitor.admit(2));
        assert!(!monitor.admit(4));

        logs_assert(|lines: &[&str]| {
            let crossings = lines
                .iter()
                .filter(|line| line.contains("Maximum buffer size reached"))
                .count();
            match crossings {
                1 => Ok(()),
                n => Err(format!("expected one overload log, got {n}")),
            }
        });
    }

    #[traced_test]
    #[test]
    fn logs_recovery_transition_once() {
        let monitor = BackpressureMonitor::new(2);
        assert!(!monitor.admit(2));
        assert!(monitor.admit(1));
        assert!(monitor.admit(0));
        assert!(!monitor.is_overloaded());

        logs_assert(|lines: &[&str]| {
            let recoveries = lines
                .iter()
                .filter(|line| line.contains("Event buffering started."))
                .count();
            match recoveries {
                1 => Ok(()),
                n => Err(format!("expected one recovery log, got {n}")),
            }
        });
    }

    #[traced_test]
    #[test]
    fn logs_again_on_next_overload_interval() {
        let monitor = BackpressureMonitor::new(2);
        assert!(!monitor.admit(2));
        assert!(monitor.admit(1));
        assert!(!monitor.admit(2));

        logs_assert(|lines: &[&str]| {
            let crossings = lines
                .iter()
                .filter(|line| line.contains("Maximum buffer size reached"))
                .count();
            match crossings {
                2 => Ok(()),
                n => Err(format!("expected two overload logs, got {n}")),
            }
        });
    }
}
