//! Link resolution.
//!
//! Given an incoming link and the ordered rule list, decide which rule (if
//! any) should redirect it and compute the final URL. Two strategies exist:
//!
//! - [`Strategy::Strict`] (the default): every rule is evaluated, gated, and
//!   the surviving candidates are ranked. A rule is accepted only when its
//!   pattern produces **exactly one** match across the whole link (a pattern
//!   that could match in several places is judged ambiguous for this link and
//!   excluded outright, not merely de-prioritized) and carries at least one
//!   capturing group. The last capturing group's text becomes the `key`
//!   substituted into the URL template.
//!
//! - [`Strategy::FirstMatch`]: the degraded legacy behavior. The first rule
//!   whose pattern matches anywhere wins; no gates, and a pattern without
//!   groups keys on the whole match.
//!
//! Ranking under the strict strategy is a total order:
//!
//! ```text
//! more capturing groups        (a more specific rule)
//!   └─ tie: longer match       (a more precise match)
//!        └─ tie: earlier rule  (stable preference for declaration order)
//! ```
//!
//! Per-rule failures are never fatal: a pattern that does not compile is
//! logged and skipped, and resolution continues with the next rule. "No
//! match" is a valid terminal result, not an error.

use regex::Regex;
use tracing::{debug, warn};

use crate::api::{Options, Strategy};
use crate::{Candidate, Rule};

/// Why a rule did or did not produce a candidate during one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The pattern failed to compile; carries the compile error text.
    InvalidPattern(String),
    /// Zero matches against the link (and its scheme-stripped tail).
    NoMatch,
    /// More than one match; carries the match count.
    Ambiguous(usize),
    /// Matched exactly once but the pattern has no capturing groups.
    NoCaptures,
    /// The rule produced a candidate.
    Accepted,
}

/// Per-rule outcome, in rule-list order.
#[derive(Debug, Clone)]
pub(crate) struct Evaluation {
    pub rule_index: usize,
    pub verdict: Verdict,
}

/// The result of one resolution pass. `candidates` is ranked best-first;
/// the winner, if any, is the first element.
#[derive(Debug, Clone, Default)]
pub(crate) struct Resolution {
    pub evaluations: Vec<Evaluation>,
    pub candidates: Vec<Candidate>,
}

impl Resolution {
    pub fn final_url(&self) -> Option<&str> {
        self.candidates.first().map(|c| c.final_url.as_str())
    }
}

/// Resolve `link` against `rules` under the strategy in `options`.
pub(crate) fn resolve_link(link: &str, rules: &[Rule], options: &Options) -> Resolution {
    match options.strategy {
        Strategy::Strict => resolve_strict(link, rules, &options.scheme),
        Strategy::FirstMatch => resolve_first_match(link, rules),
    }
}

/// Collapse doubled backslashes left behind by double-encoded JSON payloads
/// (`\\d` becomes `\d`). Applied to every configured pattern before
/// compiling, so primary- and legacy-sourced rules behave identically.
fn normalize_pattern(pattern: &str) -> String {
    pattern.replace("\\\\", "\\")
}

fn resolve_strict(link: &str, rules: &[Rule], scheme: &str) -> Resolution {
    // Patterns written without the scheme still get a chance to match the
    // full link: when the full-link attempt is not exactly one match, the
    // rule is retried against the tail with the scheme prefix stripped.
    let tail = link.strip_prefix(scheme);

    let mut evaluations = Vec::with_capacity(rules.len());
    let mut candidates: Vec<Candidate> = Vec::new();

    for (rule_index, rule) in rules.iter().enumerate() {
        match evaluate_rule(link, tail, rule, rule_index) {
            Ok(candidate) => {
                debug!(
                    rule_index,
                    key = %candidate.key,
                    match_len = candidate.match_len,
                    group_count = candidate.group_count,
                    "rule accepted as candidate"
                );
                candidates.push(candidate);
                evaluations.push(Evaluation { rule_index, verdict: Verdict::Accepted });
            }
            Err(verdict) => {
                debug!(rule_index, ?verdict, "rule rejected");
                evaluations.push(Evaluation { rule_index, verdict });
            }
        }
    }

    // Specificity first, precision second, declaration order last. The sort
    // is stable, but the index comparison keeps the order explicit.
    candidates.sort_by(|a, b| {
        b.group_count
            .cmp(&a.group_count)
            .then(b.match_len.cmp(&a.match_len))
            .then(a.rule_index.cmp(&b.rule_index))
    });

    if let Some(best) = candidates.first() {
        debug!(rule_index = best.rule_index, key = %best.key, url = %best.final_url, "best candidate selected");
    } else {
        debug!(link, "no rule produced an accepted candidate");
    }

    Resolution { evaluations, candidates }
}

fn evaluate_rule<'h>(link: &'h str, tail: Option<&'h str>, rule: &Rule, rule_index: usize) -> Result<Candidate, Verdict> {
    let pattern = normalize_pattern(&rule.pattern);
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            warn!(rule_index, pattern = %rule.pattern, %err, "pattern failed to compile; rule skipped");
            return Err(Verdict::InvalidPattern(err.to_string()));
        }
    };

    let mut matches: Vec<regex::Captures<'h>> = re.captures_iter(link).collect();
    if matches.len() != 1 {
        if let Some(tail) = tail {
            let tail_matches: Vec<regex::Captures<'h>> = re.captures_iter(tail).collect();
            if !tail_matches.is_empty() {
                debug!(rule_index, "matched against the scheme-stripped tail");
            }
            matches = tail_matches;
        }
    }

    // Selectivity gate: exactly one match across the whole link.
    match matches.len() {
        0 => return Err(Verdict::NoMatch),
        1 => {}
        n => return Err(Verdict::Ambiguous(n)),
    }

    // Capture gate: at least one capturing group.
    let group_count = re.captures_len() - 1;
    if group_count == 0 {
        return Err(Verdict::NoCaptures);
    }

    let caps = &matches[0];
    let Some(whole) = caps.get(0) else {
        return Err(Verdict::NoMatch);
    };

    // The last capturing group's text is the key; a group that did not
    // participate in the match yields the empty string.
    let key = caps.get(re.captures_len() - 1).map(|g| g.as_str()).unwrap_or("").to_string();
    let final_url = rule.url_template.replace("{key}", &key);

    Ok(Candidate { rule_index, key, final_url, match_len: whole.end() - whole.start(), group_count })
}

fn resolve_first_match(link: &str, rules: &[Rule]) -> Resolution {
    let mut evaluations = Vec::new();
    let mut candidates = Vec::new();

    for (rule_index, rule) in rules.iter().enumerate() {
        let pattern = normalize_pattern(&rule.pattern);
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(err) => {
                warn!(rule_index, pattern = %rule.pattern, %err, "pattern failed to compile; rule skipped");
                evaluations.push(Evaluation { rule_index, verdict: Verdict::InvalidPattern(err.to_string()) });
                continue;
            }
        };

        let Some(caps) = re.captures(link) else {
            evaluations.push(Evaluation { rule_index, verdict: Verdict::NoMatch });
            continue;
        };
        let Some(whole) = caps.get(0) else {
            evaluations.push(Evaluation { rule_index, verdict: Verdict::NoMatch });
            continue;
        };

        // No capture gate here: a pattern without groups keys on the whole
        // match (the last element of the capture list is group 0 itself).
        let key = caps.get(re.captures_len() - 1).map(|g| g.as_str()).unwrap_or("").to_string();
        let final_url = rule.url_template.replace("{key}", &key);

        debug!(rule_index, key = %key, url = %final_url, "first-match rule selected");
        candidates.push(Candidate {
            rule_index,
            key,
            final_url,
            match_len: whole.end() - whole.start(),
            group_count: re.captures_len() - 1,
        });
        evaluations.push(Evaluation { rule_index, verdict: Verdict::Accepted });
        break;
    }

    Resolution { evaluations, candidates }
}
