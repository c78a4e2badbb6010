//! Duplicate suppression.
//!
//! Link delivery can race across entry points: the foreground activity, the
//! background service, and repeated lifecycle callbacks can all observe the
//! same incoming link. The background path guards against double-processing
//! with a single persisted record — the last successfully processed link and
//! its timestamp — and a short TTL window.
//!
//! The posture is deliberately fail-open: a store read error is treated as
//! "not a duplicate" so a transient failure never silently drops a
//! legitimate link, and a failed record write merely means the next delivery
//! of the same link inside the TTL goes unrecognized. Both degradations are
//! logged and accepted.
//!
//! A record whose timestamp lies in the future (clock skew, manual
//! tampering) produces a negative elapsed time, which falls outside the
//! inclusive `[0, ttl]` window and is therefore not a duplicate.
//!
//! Cross-process races are explicitly not synchronized: two separate
//! processes may both pass the check and both redirect, which is redundant
//! but harmless. Within one process the guard's internal gate makes the
//! two-key record update atomic with respect to concurrent calls.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, warn};

use super::store::KvStore;

/// Store key holding the most recently processed link.
pub const KEY_LAST_LINK: &str = "last_processed_link";

/// Store key holding the epoch-millisecond timestamp of that processing.
pub const KEY_LAST_AT_MS: &str = "last_processed_at_ms";

/// Default duplicate window.
pub const DEFAULT_TTL_MS: i64 = 5_000;

/// TTL-based duplicate suppressor over the persisted dedup record.
pub struct DedupGuard {
    store: Arc<dyn KvStore>,
    /// Serializes record reads/writes so the two-key update cannot
    /// interleave between concurrent in-process calls.
    gate: Mutex<()>,
}

impl DedupGuard {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        DedupGuard { store, gate: Mutex::new(()) }
    }

    /// True iff `link` was recorded within the last `ttl_ms` milliseconds
    /// (inclusive). Read failures answer `false`.
    pub fn is_duplicate(&self, link: &str, ttl_ms: i64) -> bool {
        self.is_duplicate_at(link, ttl_ms, now_ms())
    }

    /// [`is_duplicate`](Self::is_duplicate) against an explicit clock, for
    /// deterministic callers.
    pub fn is_duplicate_at(&self, link: &str, ttl_ms: i64, now_ms: i64) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let last_link = match self.store.get_string(KEY_LAST_LINK) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "dedup record read failed; treating as not a duplicate");
                return false;
            }
        };
        let last_at = match self.store.get_i64(KEY_LAST_AT_MS) {
            Ok(value) => value.unwrap_or(0),
            Err(err) => {
                warn!(%err, "dedup timestamp read failed; treating as not a duplicate");
                return false;
            }
        };

        let Some(last_link) = last_link else {
            return false;
        };

        let elapsed = now_ms - last_at;
        let duplicate = link == last_link && (0..=ttl_ms).contains(&elapsed);
        debug!(duplicate, elapsed, "dedup check");
        duplicate
    }

    /// Overwrite the dedup record with `link` and the current timestamp.
    /// Write failures are logged and swallowed.
    pub fn record_processed(&self, link: &str) {
        self.record_processed_at(link, now_ms());
    }

    /// [`record_processed`](Self::record_processed) against an explicit
    /// clock, for deterministic callers.
    pub fn record_processed_at(&self, link: &str, now_ms: i64) {
        let _gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Err(err) = self.store.put_string(KEY_LAST_LINK, link) {
            warn!(%err, "failed to record processed link");
            return;
        }
        if let Err(err) = self.store.put_i64(KEY_LAST_AT_MS, now_ms) {
            warn!(%err, "failed to record processed-at timestamp");
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::MemoryStore;

    fn guard() -> DedupGuard {
        DedupGuard::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn fresh_store_is_never_a_duplicate() {
        assert!(!guard().is_duplicate_at("redlink://42", DEFAULT_TTL_MS, 1_000));
    }

    #[test]
    fn same_link_inside_window_is_a_duplicate() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        assert!(guard.is_duplicate_at("redlink://42", 5_000, 4_000));
    }

    #[test]
    fn same_link_outside_window_is_not_a_duplicate() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        assert!(!guard.is_duplicate_at("redlink://42", 5_000, 7_000));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        assert!(guard.is_duplicate_at("redlink://42", 5_000, 1_000));
        assert!(guard.is_duplicate_at("redlink://42", 5_000, 6_000));
        assert!(!guard.is_duplicate_at("redlink://42", 5_000, 6_001));
    }

    #[test]
    fn different_link_is_not_a_duplicate() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        assert!(!guard.is_duplicate_at("redlink://43", 5_000, 2_000));
    }

    #[test]
    fn future_timestamp_is_not_a_duplicate() {
        // A recorded timestamp ahead of "now" means negative elapsed time;
        // no clamping, just not a duplicate.
        let guard = guard();
        guard.record_processed_at("redlink://42", 10_000);
        assert!(!guard.is_duplicate_at("redlink://42", 5_000, 9_999));
    }

    #[test]
    fn record_overwrites_previous_record() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        guard.record_processed_at("redlink://43", 2_000);
        assert!(!guard.is_duplicate_at("redlink://42", 5_000, 3_000));
        assert!(guard.is_duplicate_at("redlink://43", 5_000, 3_000));
    }

    #[test]
    fn record_then_check_with_wall_clock() {
        let guard = guard();
        guard.record_processed("redlink://42");
        assert!(guard.is_duplicate("redlink://42", DEFAULT_TTL_MS));
    }

    #[test]
    fn zero_ttl_only_matches_the_same_instant() {
        let guard = guard();
        guard.record_processed_at("redlink://42", 1_000);
        assert!(guard.is_duplicate_at("redlink://42", 0, 1_000));
        assert!(!guard.is_duplicate_at("redlink://42", 0, 1_001));
    }
}
