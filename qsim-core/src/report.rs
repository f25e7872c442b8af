//! Snapshot reporting
//!
//! Reporters are observational only: they receive snapshots, never handles
//! into the model, so they cannot perturb a run.

use crate::stats::Snapshot;

/// Consumer of per-entity snapshots, invoked at run end (and per tick when a
/// model is built with a tick reporter).
pub trait Reporter {
    fn emit(&mut self, snapshot: &Snapshot);
}

/// Prints one summary line per entity to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn emit(&mut self, snapshot: &Snapshot) {
        println!("{snapshot}");
    }
}

/// Collects snapshots in memory, mainly for tests and post-run analysis.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub snapshots: Vec<Snapshot>,
}

impl Reporter for CollectingReporter {
    fn emit(&mut self, snapshot: &Snapshot) {
        self.snapshots.push(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsAccumulator;

    #[test]
    fn collecting_reporter_keeps_every_snapshot() {
        let mut reporter = CollectingReporter::default();
        let stats = StatsAccumulator::new("a");
        reporter.emit(&stats.snapshot(0, 0, 1));
        reporter.emit(&stats.snapshot(1, 1, 1));
        assert_eq!(reporter.snapshots.len(), 2);
        assert_eq!(reporter.snapshots[1].queue_len, 1);
    }
}
