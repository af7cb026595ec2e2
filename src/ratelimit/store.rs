//! Window store: per-identifier request timestamps.

use dashmap::DashMap;
use serde::Serialize;
use std::hash::Hash;

use super::evaluator::within_window;

/// Outcome of a sweep over one or more stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Timestamps dropped because they aged past the horizon
    pub removed_timestamps: usize,
    /// Keys dropped because no timestamps remained
    pub removed_keys: usize,
}

impl SweepReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: SweepReport) {
        self.removed_timestamps += other.removed_timestamps;
        self.removed_keys += other.removed_keys;
    }
}

/// A concurrent map from key to an ordered list of request timestamps.
///
/// The map is sharded, so operations on one key only lock that key's shard.
/// Records are only ever appended to or trimmed from the front; a record
/// that becomes empty is removed rather than kept.
pub struct WindowStore<K> {
    records: DashMap<K, Vec<i64>>,
}

impl<K> WindowStore<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Append `now` to the key's record and hand the whole record to `f`.
    ///
    /// The shard stays locked until `f` returns, so recording and deciding
    /// form one critical section per key. A timestamp earlier than the last
    /// one recorded is clamped to keep the record non-decreasing. Timestamps
    /// older than `horizon_ms` are dropped first, so a flooded key stays
    /// bounded between sweeps; `horizon_ms` must cover every window `f`
    /// evaluates.
    pub fn record<R>(&self, key: K, now: i64, horizon_ms: u64, f: impl FnOnce(&[i64]) -> R) -> R {
        let mut record = self.records.entry(key).or_default();
        let stamp = record.last().map_or(now, |&last| now.max(last));
        record.push(stamp);

        let expired = record.partition_point(|&ts| !within_window(now, ts, horizon_ms));
        if expired > 0 {
            record.drain(..expired);
        }

        f(record.as_slice())
    }

    /// Count the key's timestamps inside a window ending at `now`.
    pub fn count_within(&self, key: &K, now: i64, window_ms: u64) -> usize {
        self.records.get(key).map_or(0, |record| {
            record
                .iter()
                .filter(|&&ts| within_window(now, ts, window_ms))
                .count()
        })
    }

    /// A copy of the key's record, if any.
    pub fn timestamps(&self, key: &K) -> Option<Vec<i64>> {
        self.records.get(key).map(|record| record.value().clone())
    }

    /// Remove one key. Returns whether it existed.
    pub fn remove(&self, key: &K) -> bool {
        self.records.remove(key).is_some()
    }

    /// Remove every key matching `predicate`. Returns how many were removed.
    pub fn remove_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut removed = 0;
        self.records.retain(|key, _| {
            let matched = predicate(key);
            if matched {
                removed += 1;
            }
            !matched
        });
        removed
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of timestamps across all keys.
    pub fn total_timestamps(&self) -> usize {
        self.records.iter().map(|record| record.len()).sum()
    }

    /// Trim timestamps that fell out of `horizon_ms` and evict empty keys.
    ///
    /// Shards are locked one at a time, never the whole map at once.
    pub fn sweep(&self, now: i64, horizon_ms: u64) -> SweepReport {
        let mut report = SweepReport::default();

        self.records.retain(|_, record| {
            let expired = record.partition_point(|&ts| !within_window(now, ts, horizon_ms));
            if expired > 0 {
                record.drain(..expired);
                report.removed_timestamps += expired;
            }
            if record.is_empty() {
                report.removed_keys += 1;
                false
            } else {
                true
            }
        });

        report
    }
}

impl<K> Default for WindowStore<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HORIZON: u64 = 3_600_000;

    #[test]
    fn test_record_appends_and_returns_full_record() {
        let store: WindowStore<String> = WindowStore::new();

        let len = store.record("a".to_string(), 100, HORIZON, |ts| ts.len());
        assert_eq!(len, 1);

        let ts = store.record("a".to_string(), 200, HORIZON, |ts| ts.to_vec());
        assert_eq!(ts, vec![100, 200]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_trims_past_horizon() {
        let store: WindowStore<String> = WindowStore::new();
        for ts in [0, 1_000, 5_000] {
            store.record("a".to_string(), ts, 10_000, |_| ());
        }

        // At t=10_500 only the entry at t=0 is a full horizon old.
        let seen = store.record("a".to_string(), 10_500, 10_000, |ts| ts.to_vec());
        assert_eq!(seen, vec![1_000, 5_000, 10_500]);
        assert_eq!(store.total_timestamps(), 3);
    }

    #[test]
    fn test_flooded_key_stays_bounded() {
        let store: WindowStore<String> = WindowStore::new();
        for ts in 0..1_000 {
            store.record("flood".to_string(), ts * 100, 10_000, |_| ());
        }

        // One stamp every 100ms inside a 10s horizon.
        assert_eq!(store.total_timestamps(), 100);
    }

    #[test]
    fn test_record_keeps_order_when_clock_goes_back() {
        let store: WindowStore<String> = WindowStore::new();
        store.record("a".to_string(), 500, HORIZON, |_| ());
        store.record("a".to_string(), 400, HORIZON, |_| ());
        assert_eq!(store.timestamps(&"a".to_string()), Some(vec![500, 500]));
    }

    #[test]
    fn test_count_within_window() {
        let store: WindowStore<String> = WindowStore::new();
        for ts in [0, 30_000, 59_999, 60_000] {
            store.record("a".to_string(), ts, HORIZON, |_| ());
        }

        // At t=60_000 the entry at t=0 is exactly one window old and excluded.
        assert_eq!(store.count_within(&"a".to_string(), 60_000, 60_000), 3);
        assert_eq!(store.count_within(&"missing".to_string(), 60_000, 60_000), 0);
    }

    #[test]
    fn test_sweep_trims_and_evicts() {
        let store: WindowStore<String> = WindowStore::new();
        store.record("old".to_string(), 0, HORIZON, |_| ());
        store.record("mixed".to_string(), 0, HORIZON, |_| ());
        store.record("mixed".to_string(), 5_000, HORIZON, |_| ());

        let report = store.sweep(10_000, 8_000);

        assert_eq!(report.removed_timestamps, 2);
        assert_eq!(report.removed_keys, 1);
        assert!(store.timestamps(&"old".to_string()).is_none());
        assert_eq!(store.timestamps(&"mixed".to_string()), Some(vec![5_000]));
    }

    #[test]
    fn test_remove_where_and_clear() {
        let store: WindowStore<String> = WindowStore::new();
        for key in ["a1", "a2", "b1"] {
            store.record(key.to_string(), 0, HORIZON, |_| ());
        }

        assert_eq!(store.remove_where(|k| k.starts_with('a')), 2);
        assert_eq!(store.len(), 1);
        assert!(store.remove(&"b1".to_string()));
        assert!(!store.remove(&"b1".to_string()));

        store.record("c".to_string(), 0, HORIZON, |_| ());
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.total_timestamps(), 0);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        use std::sync::Arc;

        let store: Arc<WindowStore<String>> = Arc::new(WindowStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.record("shared".to_string(), i, HORIZON, |_| ());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.total_timestamps(), 800);
    }
}
