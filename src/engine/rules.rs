//! Rule loading.
//!
//! Rules live in the key-value store as a JSON array of
//! `{ "regex": ..., "urlTemplate": ... }` objects under [`KEY_RULES`]. Older
//! installs carry them under [`KEY_RULES_LEGACY`] instead: a string with a
//! `!`-delimited prefix followed by a JSON array whose elements are
//! JSON-*encoded* object strings (the payload was serialized twice on the way
//! in). When the primary key is absent or empty the legacy payload is parsed
//! and, on success, migrated back under the primary key so subsequent loads
//! take the primary path regardless of on-disk generation.
//!
//! [`load_rules`] never fails the caller: malformed elements are skipped
//! individually, and any unrecoverable parse error anywhere in the process
//! yields an empty rule list, logged but not raised.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::KvStore;
use crate::Rule;

/// Primary store key: JSON array of rule objects.
pub const KEY_RULES: &str = "native_projects_json";

/// Legacy store key: `!`-delimited prefix + JSON array of JSON-encoded
/// object strings.
pub const KEY_RULES_LEGACY: &str = "projects";

/// One rule object as it appears on the wire.
#[derive(Debug, Deserialize, Serialize)]
struct RawRule {
    #[serde(default)]
    regex: String,
    #[serde(default, rename = "urlTemplate")]
    url_template: String,
}

impl RawRule {
    /// An element joins the result only if both fields are non-empty.
    fn into_rule(self) -> Option<Rule> {
        if self.regex.is_empty() || self.url_template.is_empty() {
            return None;
        }
        Some(Rule { pattern: self.regex, url_template: self.url_template })
    }
}

/// Read the ordered rule list out of `store`.
///
/// Returns an empty list on any internal error; this accessor never raises
/// past its boundary.
pub fn load_rules(store: &dyn KvStore) -> Vec<Rule> {
    let primary = match store.get_string(KEY_RULES) {
        Ok(value) => value,
        Err(err) => {
            warn!(key = KEY_RULES, %err, "failed to read rule payload");
            return Vec::new();
        }
    };

    match primary {
        Some(json) if !json.is_empty() => parse_primary(&json),
        _ => load_legacy(store),
    }
}

/// Write `rules` back under the primary key in the primary format.
pub fn save_rules(store: &dyn KvStore, rules: &[Rule]) -> Result<(), super::store::StoreError> {
    let raw: Vec<RawRule> =
        rules.iter().map(|r| RawRule { regex: r.pattern.clone(), url_template: r.url_template.clone() }).collect();
    let json = serde_json::to_string(&raw)?;
    store.put_string(KEY_RULES, &json)
}

fn parse_primary(json: &str) -> Vec<Rule> {
    let elements: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(elements) => elements,
        Err(err) => {
            warn!(key = KEY_RULES, %err, "rule payload is not a JSON array");
            return Vec::new();
        }
    };

    let mut rules = Vec::new();
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<RawRule>(element) {
            Ok(raw) => {
                if let Some(rule) = raw.into_rule() {
                    rules.push(rule);
                } else {
                    debug!(index, "skipping rule element with empty field");
                }
            }
            Err(err) => warn!(index, %err, "skipping malformed rule element"),
        }
    }
    rules
}

fn load_legacy(store: &dyn KvStore) -> Vec<Rule> {
    let legacy = match store.get_string(KEY_RULES_LEGACY) {
        Ok(Some(value)) if !value.is_empty() => value,
        Ok(_) => {
            debug!("no rule payload under either key");
            return Vec::new();
        }
        Err(err) => {
            warn!(key = KEY_RULES_LEGACY, %err, "failed to read legacy rule payload");
            return Vec::new();
        }
    };

    let rules = parse_legacy(&legacy);

    // One-shot migration: re-encode in the primary format so the next load
    // never touches the legacy path. The fallback stays correct if this
    // write is lost.
    if !rules.is_empty() {
        if let Err(err) = save_rules(store, &rules) {
            warn!(%err, "failed to migrate legacy rules to the primary key");
        } else {
            debug!(count = rules.len(), "migrated legacy rules to the primary key");
        }
    }

    rules
}

/// The legacy payload embeds its JSON array after the first `!`; a payload
/// without the marker is treated as the array itself.
fn parse_legacy(payload: &str) -> Vec<Rule> {
    let json = match payload.find('!') {
        Some(index) => &payload[index + 1..],
        None => payload,
    };

    let elements: Vec<serde_json::Value> = match serde_json::from_str(json) {
        Ok(elements) => elements,
        Err(err) => {
            warn!(key = KEY_RULES_LEGACY, %err, "legacy payload is not a JSON array");
            return Vec::new();
        }
    };

    let mut rules = Vec::new();
    for (index, element) in elements.into_iter().enumerate() {
        let Some(encoded) = element.as_str() else {
            warn!(index, "skipping legacy element that is not a JSON-encoded string");
            continue;
        };
        match serde_json::from_str::<RawRule>(encoded) {
            Ok(raw) => {
                if let Some(rule) = raw.into_rule() {
                    rules.push(rule);
                } else {
                    debug!(index, "skipping legacy rule element with empty field");
                }
            }
            Err(err) => warn!(index, %err, "skipping malformed legacy rule element"),
        }
    }
    rules
}
