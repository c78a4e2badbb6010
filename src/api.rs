use std::time::{Duration, Instant};

use crate::engine::{self, Verdict};
use crate::{Candidate, Rule};

/// Scheme prefix stripped for the tail-retry match. Patterns written without
/// the scheme still match a full link carrying it.
pub const DEFAULT_SCHEME: &str = "redlink://";

/// How a resolution pass picks its result.
///
/// Strict is the intended behavior; the first-match variant reproduces the
/// older degraded mode and exists behind this switch rather than as a silent
/// choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Gate every rule (exactly one match, at least one capturing group) and
    /// rank the survivors by specificity, precision, declaration order.
    #[default]
    Strict,
    /// The first rule whose pattern matches anywhere wins; no gates.
    FirstMatch,
}

/// Options that affect resolution behavior.
#[derive(Debug, Clone)]
pub struct Options {
    pub strategy: Strategy,
    /// Scheme+delimiter prefix stripped for the tail retry.
    pub scheme: String,
}

impl Default for Options {
    fn default() -> Self {
        Options { strategy: Strategy::default(), scheme: DEFAULT_SCHEME.to_string() }
    }
}

/// Why a rule did or did not produce a candidate, as reported per rule by
/// [`resolve_verbose_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleStatus {
    /// The pattern failed to compile; carries the compile error text.
    InvalidPattern(String),
    /// Zero matches against the link and its scheme-stripped tail.
    NoMatch,
    /// More than one match; carries the match count.
    Ambiguous(usize),
    /// Matched exactly once but the pattern has no capturing groups.
    NoCaptureGroups,
    /// The rule produced a candidate.
    Accepted,
}

/// Per-rule outcome in rule-list order.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub rule_index: usize,
    pub pattern: String,
    pub status: RuleStatus,
}

/// One accepted candidate, ranked.
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub rule_index: usize,
    pub pattern: String,
    /// Text captured by the last capturing group.
    pub key: String,
    /// The template with every `{key}` occurrence substituted.
    pub url: String,
    /// Byte length of the matched substring.
    pub match_len: usize,
    /// Capturing groups in the pattern, excluding the whole-match group.
    pub group_count: usize,
}

/// Additional details returned by [`resolve_verbose_with`].
///
/// This is meant for debugging and for the CLI report, not for dispatch
/// decisions; the winning URL is already on [`ResolveReport`].
#[derive(Debug, Clone)]
pub struct ResolveDetails {
    /// Outcome of every evaluated rule, in rule-list order.
    pub evaluated: Vec<RuleOutcome>,
    /// Accepted candidates ranked best-first; the winner is the first.
    pub candidates: Vec<CandidateSummary>,
}

/// Result from [`resolve_verbose_with`].
#[derive(Debug, Clone)]
pub struct ResolveReport {
    /// The link as received.
    pub link: String,
    /// The winning redirect URL, or `None` for "no match".
    pub url: Option<String>,
    /// Total elapsed time for the pass.
    pub elapsed: Duration,
    pub details: ResolveDetails,
}

/// Resolve `link` against `rules` with default [`Options`].
///
/// Returns the redirect URL of the best-ranked rule, or `None` when no rule
/// survives the gates. An empty rule list always yields `None`.
///
/// # Example
/// ```
/// use redlink::{Rule, resolve};
///
/// let rules = vec![Rule::new(r"^app://item/(\d+)$", "https://x.test/i/{key}")];
/// assert_eq!(resolve("app://item/42", &rules).as_deref(), Some("https://x.test/i/42"));
/// ```
pub fn resolve(link: &str, rules: &[Rule]) -> Option<String> {
    resolve_with(link, rules, &Options::default())
}

/// Resolve `link` against `rules` under the provided `options`.
pub fn resolve_with(link: &str, rules: &[Rule], options: &Options) -> Option<String> {
    engine::resolve_link(link, rules, options).final_url().map(str::to_string)
}

#[allow(dead_code)]
pub fn resolve_verbose(link: &str, rules: &[Rule]) -> ResolveReport {
    resolve_verbose_with(link, rules, &Options::default())
}

/// Resolve `link` and return the per-rule trace alongside the result.
///
/// Useful for rule debugging: every rule's verdict is reported, together
/// with the ranked candidate list. The plain [`resolve_with`] path does not
/// allocate these traces.
pub fn resolve_verbose_with(link: &str, rules: &[Rule], options: &Options) -> ResolveReport {
    let start = Instant::now();
    let resolution = engine::resolve_link(link, rules, options);
    let elapsed = start.elapsed();

    let evaluated = resolution
        .evaluations
        .iter()
        .map(|e| RuleOutcome {
            rule_index: e.rule_index,
            pattern: rules[e.rule_index].pattern.clone(),
            status: verdict_to_status(&e.verdict),
        })
        .collect();

    let candidates: Vec<CandidateSummary> =
        resolution.candidates.iter().map(|c| candidate_to_summary(rules, c)).collect();

    ResolveReport {
        link: link.to_string(),
        url: resolution.final_url().map(str::to_string),
        elapsed,
        details: ResolveDetails { evaluated, candidates },
    }
}

fn verdict_to_status(verdict: &Verdict) -> RuleStatus {
    match verdict {
        Verdict::InvalidPattern(err) => RuleStatus::InvalidPattern(err.clone()),
        Verdict::NoMatch => RuleStatus::NoMatch,
        Verdict::Ambiguous(count) => RuleStatus::Ambiguous(*count),
        Verdict::NoCaptures => RuleStatus::NoCaptureGroups,
        Verdict::Accepted => RuleStatus::Accepted,
    }
}

fn candidate_to_summary(rules: &[Rule], candidate: &Candidate) -> CandidateSummary {
    CandidateSummary {
        rule_index: candidate.rule_index,
        pattern: rules[candidate.rule_index].pattern.clone(),
        key: candidate.key.clone(),
        url: candidate.final_url.clone(),
        match_len: candidate.match_len,
        group_count: candidate.group_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> Vec<Rule> {
        vec![
            Rule::new(r"^app://(\w+)$", "https://x.test/{key}"),
            Rule::new(r"^app://item/(\d+)$", "https://x.test/i/{key}"),
        ]
    }

    #[test]
    fn resolve_returns_the_winning_url() {
        assert_eq!(resolve("app://item/42", &sample_rules()).as_deref(), Some("https://x.test/i/42"));
        assert_eq!(resolve("app://nothing/here/matches", &sample_rules()), None);
    }

    #[test]
    fn verbose_report_traces_every_rule() {
        let report = resolve_verbose_with("app://item/42", &sample_rules(), &Options::default());

        assert_eq!(report.link, "app://item/42");
        assert_eq!(report.url.as_deref(), Some("https://x.test/i/42"));
        assert_eq!(report.details.evaluated.len(), 2);
        assert_eq!(report.details.evaluated[0].status, RuleStatus::NoMatch);
        assert_eq!(report.details.evaluated[1].status, RuleStatus::Accepted);

        let winner = &report.details.candidates[0];
        assert_eq!(winner.rule_index, 1);
        assert_eq!(winner.key, "42");
        assert_eq!(winner.group_count, 1);
        assert_eq!(winner.match_len, "app://item/42".len());
    }

    #[test]
    fn verbose_report_on_no_match_has_no_candidates() {
        let report = resolve_verbose_with("other://thing", &sample_rules(), &Options::default());
        assert_eq!(report.url, None);
        assert!(report.details.candidates.is_empty());
    }
}
