// Latest-run monitoring snapshot. Exactly one run is tracked: the first
// event carrying a new RunId throws the previous snapshot away.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::info;

use techfeed_common::RunId;

/// Stored failure messages are cut to exactly this many characters.
const ERROR_MESSAGE_MAX: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct SourceStat {
    pub source: String,
    pub fetched: u32,
    pub added: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectMonitorSnapshot {
    pub run_id: RunId,
    pub sources: Vec<SourceStat>,
    pub total_fetched: u32,
    pub total_added: u32,
    pub failed_sources: u32,
}

impl CollectMonitorSnapshot {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            sources: Vec::new(),
            total_fetched: 0,
            total_added: 0,
            failed_sources: 0,
        }
    }

    fn entry(&mut self, source: &str) -> &mut SourceStat {
        if let Some(idx) = self.sources.iter().position(|s| s.source == source) {
            return &mut self.sources[idx];
        }
        self.sources.push(SourceStat {
            source: source.to_string(),
            fetched: 0,
            added: 0,
            error: None,
        });
        self.sources.last_mut().expect("just pushed")
    }

    /// Totals are derived, recomputed from the per-source entries after
    /// every mutation.
    fn recompute_totals(&mut self) {
        self.total_fetched = self.sources.iter().map(|s| s.fetched).sum();
        self.total_added = self.sources.iter().map(|s| s.added).sum();
        self.failed_sources = self.sources.iter().filter(|s| s.error.is_some()).count() as u32;
    }
}

#[derive(Clone, Default)]
pub struct CollectMonitor {
    inner: Arc<RwLock<Option<CollectMonitorSnapshot>>>,
}

impl CollectMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, run_id: RunId, source: &str, fetched: u32) {
        self.mutate(run_id, |snapshot| {
            let entry = snapshot.entry(source);
            entry.fetched = fetched;
            entry.error = None;
        });
    }

    pub fn record_failure(&self, run_id: RunId, source: &str, message: &str) {
        let message = truncate_chars(message, ERROR_MESSAGE_MAX);
        self.mutate(run_id, |snapshot| {
            snapshot.entry(source).error = Some(message);
        });
    }

    /// Sum (never overwrite) added counts — the persist stage reports per
    /// chunk, several times per source within one run.
    pub fn accumulate_added(&self, run_id: RunId, source: &str, added: u32) {
        self.mutate(run_id, |snapshot| {
            snapshot.entry(source).added += added;
        });
    }

    pub fn latest(&self) -> Option<CollectMonitorSnapshot> {
        self.inner.read().expect("monitor lock poisoned").clone()
    }

    fn mutate(&self, run_id: RunId, apply: impl FnOnce(&mut CollectMonitorSnapshot)) {
        let mut guard = self.inner.write().expect("monitor lock poisoned");
        let same_run = matches!(guard.as_ref(), Some(s) if s.run_id == run_id);
        if !same_run {
            info!(run_id = %run_id, "monitor: starting fresh snapshot");
            *guard = Some(CollectMonitorSnapshot::new(run_id));
        }
        let snapshot = guard.as_mut().expect("snapshot present");
        apply(snapshot);
        snapshot.recompute_totals();
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_discards_prior_entries() {
        let monitor = CollectMonitor::new();
        monitor.record_success(RunId::from_millis(1), "kakao", 10);
        monitor.record_success(RunId::from_millis(2), "toss", 4);

        let snapshot = monitor.latest().unwrap();
        assert_eq!(snapshot.run_id, RunId::from_millis(2));
        assert_eq!(snapshot.sources.len(), 1);
        assert_eq!(snapshot.sources[0].source, "toss");
        assert_eq!(snapshot.total_fetched, 4);
    }

    #[test]
    fn accumulate_sums_rather_than_overwrites() {
        let monitor = CollectMonitor::new();
        let run = RunId::from_millis(9);
        monitor.record_success(run, "kakao", 10);
        monitor.accumulate_added(run, "kakao", 3);
        monitor.accumulate_added(run, "kakao", 4);

        let snapshot = monitor.latest().unwrap();
        assert_eq!(snapshot.sources[0].added, 7);
        assert_eq!(snapshot.total_added, 7);
    }

    #[test]
    fn failure_message_truncated_to_exactly_200_chars() {
        let monitor = CollectMonitor::new();
        let run = RunId::from_millis(5);
        let long = "x".repeat(500);
        monitor.record_failure(run, "socar", &long);

        let snapshot = monitor.latest().unwrap();
        let stored = snapshot.sources[0].error.as_ref().unwrap();
        assert_eq!(stored.chars().count(), 200);
        assert_eq!(snapshot.failed_sources, 1);
    }

    #[test]
    fn totals_recomputed_across_sources() {
        let monitor = CollectMonitor::new();
        let run = RunId::from_millis(6);
        monitor.record_success(run, "kakao", 10);
        monitor.record_success(run, "toss", 5);
        monitor.record_failure(run, "line", "http 500");
        monitor.accumulate_added(run, "kakao", 2);

        let snapshot = monitor.latest().unwrap();
        assert_eq!(snapshot.total_fetched, 15);
        assert_eq!(snapshot.total_added, 2);
        assert_eq!(snapshot.failed_sources, 1);
    }
}
