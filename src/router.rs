//! Per-delivery routing.
//!
//! Every incoming link runs the same short state machine, with no retry
//! state; every terminal outcome returns control to idle immediately:
//!
//! ```text
//! IDLE ── link received ──▶ CHECK_DEDUP ──▶ duplicate?  ──▶ DISCARD
//!                                │
//!                                ▼ not a duplicate
//!                             RESOLVE ──▶ no match ──▶ REPORT_INVALID
//!                                │
//!                                ▼ match found
//!                             DISPATCH ──▶ RECORD ──▶ IDLE
//! ```
//!
//! The foreground path skips `CHECK_DEDUP` (the interactive delivery is
//! already unique per user action) and flags a no-match in the store so the
//! front-end can show the invalid-link alert once it finishes initializing.
//! The background path consults the duplicate suppressor first and records
//! the link after a successful resolution. Dispatch itself — actually
//! opening the URL — belongs to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{Options, resolve_with};
use crate::engine::{DEFAULT_TTL_MS, DedupGuard, KvStore, load_rules};

/// Store key flagging a no-match foreground delivery; consumed by the
/// front-end to show a user-facing alert after it initializes.
pub const KEY_PENDING_INVALID: &str = "pending_invalid_deeplink";

/// Terminal outcome of one link delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A rule matched; the caller should open this URL.
    Redirect(String),
    /// The same link was already processed within the TTL window; dropped
    /// with no user-visible effect.
    Duplicate,
    /// No rule matched; the caller should surface the invalid-link state.
    Invalid,
}

/// Ties the store, the rule list, the resolver and the duplicate suppressor
/// together for the two delivery channels.
pub struct Router {
    store: Arc<dyn KvStore>,
    dedup: DedupGuard,
    options: Options,
    ttl_ms: i64,
}

impl Router {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_options(store, Options::default(), DEFAULT_TTL_MS)
    }

    pub fn with_options(store: Arc<dyn KvStore>, options: Options, ttl_ms: i64) -> Self {
        let dedup = DedupGuard::new(Arc::clone(&store));
        Router { store, dedup, options, ttl_ms }
    }

    /// Handle an interactive foreground delivery. No dedup on this path; a
    /// no-match sets [`KEY_PENDING_INVALID`] for the front-end.
    pub fn handle_foreground(&self, link: &str) -> Disposition {
        self.log_shape(link);
        let rules = load_rules(self.store.as_ref());
        debug!(count = rules.len(), "loaded rules for foreground delivery");

        match resolve_with(link, &rules, &self.options) {
            Some(url) => {
                debug!(link, %url, "foreground delivery resolved");
                Disposition::Redirect(url)
            }
            None => {
                warn!(link, "no matching rule for foreground delivery");
                if let Err(err) = self.store.put_bool(KEY_PENDING_INVALID, true) {
                    warn!(%err, "failed to set the pending-invalid flag");
                }
                Disposition::Invalid
            }
        }
    }

    /// Handle a background delivery: dedup check first, then resolve, then
    /// record the link on success. A no-match stays silent on this path.
    pub fn handle_background(&self, link: &str) -> Disposition {
        self.background_pass(link, None)
    }

    /// [`handle_background`](Self::handle_background) against an explicit
    /// clock, for deterministic callers.
    pub fn handle_background_at(&self, link: &str, now_ms: i64) -> Disposition {
        self.background_pass(link, Some(now_ms))
    }

    fn background_pass(&self, link: &str, now_ms: Option<i64>) -> Disposition {
        self.log_shape(link);

        let duplicate = match now_ms {
            Some(now) => self.dedup.is_duplicate_at(link, self.ttl_ms, now),
            None => self.dedup.is_duplicate(link, self.ttl_ms),
        };
        if duplicate {
            debug!(link, "background delivery dropped as duplicate");
            return Disposition::Duplicate;
        }

        let rules = load_rules(self.store.as_ref());
        debug!(count = rules.len(), "loaded rules for background delivery");

        match resolve_with(link, &rules, &self.options) {
            Some(url) => {
                match now_ms {
                    Some(now) => self.dedup.record_processed_at(link, now),
                    None => self.dedup.record_processed(link),
                }
                debug!(link, %url, "background delivery resolved");
                Disposition::Redirect(url)
            }
            None => {
                warn!(link, "no matching rule for background delivery");
                Disposition::Invalid
            }
        }
    }

    /// The engine expects a URI; a scheme-less string is still processed,
    /// just noted.
    fn log_shape(&self, link: &str) {
        if !regex!(r"^[A-Za-z][A-Za-z0-9+.-]*://").is_match(link) {
            debug!(link, "incoming link does not look like a URI");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{KEY_LAST_LINK, MemoryStore, save_rules};
    use crate::Rule;

    fn router_with_rules(defs: &[(&str, &str)]) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let rules: Vec<Rule> = defs.iter().map(|(p, t)| Rule::new(*p, *t)).collect();
        save_rules(store.as_ref(), &rules).unwrap();
        (Router::new(store.clone() as Arc<dyn KvStore>), store)
    }

    #[test]
    fn foreground_match_redirects() {
        let (router, store) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert_eq!(router.handle_foreground("redlink://42"), Disposition::Redirect("https://x.test/i/42".into()));
        // A successful foreground delivery does not touch the invalid flag.
        assert_eq!(store.get_bool(KEY_PENDING_INVALID).unwrap(), None);
    }

    #[test]
    fn foreground_no_match_sets_pending_invalid() {
        let (router, store) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert_eq!(router.handle_foreground("redlink://not-digits"), Disposition::Invalid);
        assert_eq!(store.get_bool(KEY_PENDING_INVALID).unwrap(), Some(true));
    }

    #[test]
    fn background_match_records_the_link() {
        let (router, store) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert_eq!(
            router.handle_background_at("redlink://42", 1_000),
            Disposition::Redirect("https://x.test/i/42".into())
        );
        assert_eq!(store.get_string(KEY_LAST_LINK).unwrap().as_deref(), Some("redlink://42"));
    }

    #[test]
    fn background_duplicate_is_dropped_before_resolution() {
        let (router, _) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert!(matches!(router.handle_background_at("redlink://42", 1_000), Disposition::Redirect(_)));
        assert_eq!(router.handle_background_at("redlink://42", 3_000), Disposition::Duplicate);
    }

    #[test]
    fn background_same_link_after_ttl_resolves_again() {
        let (router, _) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert!(matches!(router.handle_background_at("redlink://42", 1_000), Disposition::Redirect(_)));
        assert!(matches!(router.handle_background_at("redlink://42", 7_000), Disposition::Redirect(_)));
    }

    #[test]
    fn background_no_match_neither_records_nor_flags() {
        let (router, store) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert_eq!(router.handle_background_at("redlink://not-digits", 1_000), Disposition::Invalid);
        assert_eq!(store.get_string(KEY_LAST_LINK).unwrap(), None);
        assert_eq!(store.get_bool(KEY_PENDING_INVALID).unwrap(), None);
    }

    #[test]
    fn different_link_inside_ttl_is_not_a_duplicate() {
        let (router, _) = router_with_rules(&[(r"^redlink://(\d+)$", "https://x.test/i/{key}")]);
        assert!(matches!(router.handle_background_at("redlink://42", 1_000), Disposition::Redirect(_)));
        assert!(matches!(router.handle_background_at("redlink://43", 2_000), Disposition::Redirect(_)));
    }

    #[test]
    fn empty_rule_store_reports_invalid() {
        let store = Arc::new(MemoryStore::new());
        let router = Router::new(store);
        assert_eq!(router.handle_background_at("redlink://42", 1_000), Disposition::Invalid);
    }
}
