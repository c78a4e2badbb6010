//! Link resolution engine.
//!
//! This module is the *internal entry point* for the redirect engine. The
//! public surface lives in `src/api.rs`; the pieces that do the work are
//! split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! At a high level, handling one incoming link is a pipeline:
//!
//! ```text
//! key-value store ──┐
//!                   │  load_rules                (rules.rs)
//!                   │    - primary JSON payload
//!                   │    - legacy fallback + one-shot migration
//!                   └───────────────┬──────────────
//!                                   │
//! link ── dedup check (background) ─┼─ DedupGuard   (dedup.rs)
//!                                   │
//!                                   v
//!                         resolve_link (resolve.rs)
//!                           - per-rule compile, errors skip the rule
//!                           - selectivity + capture gates
//!                           - (groups, length, index) tie-break
//!                                   │
//!                                   v
//!                         Option<final URL> + per-rule trace
//! ```
//!
//! The engine is a pure, short-lived computation over in-memory strings: one
//! resolution call runs to completion without suspension points and performs
//! no I/O beyond the synchronous store reads. Nothing in here raises past its
//! own boundary; every operation has a defined empty/false/no-match fallback.
//!
//! ## Responsibilities by module
//!
//! - `store.rs`: the narrow key-value contract the platform preference store
//!   is accessed through, plus in-memory and JSON-file implementations.
//! - `rules.rs`: reads the ordered rule list out of the store, with the
//!   legacy-format fallback and its one-shot migration.
//! - `resolve.rs`: the matching algorithm and candidate ranking.
//! - `dedup.rs`: TTL-based duplicate suppression over the persisted
//!   last-processed record.

#[path = "engine/dedup.rs"]
mod dedup;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/rules.rs"]
mod rules;
#[path = "engine/store.rs"]
mod store;

pub use dedup::{DEFAULT_TTL_MS, DedupGuard, KEY_LAST_AT_MS, KEY_LAST_LINK};
#[allow(unused_imports)]
pub(crate) use resolve::{Evaluation, Resolution, Verdict, resolve_link};
pub use rules::{KEY_RULES, KEY_RULES_LEGACY, load_rules, save_rules};
pub use store::{JsonFileStore, KvStore, MemoryStore, StoreError};
