extern crate self as redlink;

#[macro_use]
mod macros;
mod api;
mod bridge;
mod engine;
mod router;

pub use api::{
    CandidateSummary, DEFAULT_SCHEME, Options, ResolveDetails, ResolveReport, RuleOutcome, RuleStatus, Strategy,
    resolve, resolve_verbose, resolve_verbose_with, resolve_with,
};
pub use bridge::{BridgeError, BridgeRequest, BridgeResponse, Host, LinkGateway, LinkSink};
pub use engine::{
    DEFAULT_TTL_MS, DedupGuard, JsonFileStore, KEY_LAST_AT_MS, KEY_LAST_LINK, KEY_RULES, KEY_RULES_LEGACY, KvStore,
    MemoryStore, StoreError, load_rules, save_rules,
};
pub use router::{Disposition, KEY_PENDING_INVALID, Router};

// --- Internal types ---------------------------------------------------------

/// A configured redirect rule: a regular-expression pattern paired with a URL
/// template containing the literal `{key}` placeholder.
///
/// Rules carry no identifier of their own; they are compared by position in
/// the ordered sequence they were loaded in. Two rules with identical fields
/// are still distinguishable by index for tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Regular-expression pattern as supplied by configuration. Not validated
    /// ahead of use; a pattern that fails to compile skips its rule at
    /// resolution time.
    pub pattern: String,
    /// Redirect URL template. Every occurrence of `{key}` is replaced with
    /// the extracted key value; a template without the token is returned
    /// unchanged.
    pub url_template: String,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, url_template: impl Into<String>) -> Self {
        Rule { pattern: pattern.into(), url_template: url_template.into() }
    }
}

/// A rule that survived the match gates during one resolution pass, together
/// with everything needed to rank it and produce the final URL.
///
/// Candidates exist only within a single resolution call and are never
/// persisted.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    /// Index of the originating rule in the input rule list.
    pub rule_index: usize,
    /// Text captured by the last capturing group (empty when the group did
    /// not participate in the match).
    pub key: String,
    /// The url template with every `{key}` occurrence substituted.
    pub final_url: String,
    /// Byte length of the matched substring.
    pub match_len: usize,
    /// Number of capturing groups in the pattern, excluding the implicit
    /// whole-match group.
    pub group_count: usize,
}
