//! Site rules: which domains are capped and for how long.

pub mod repository;
pub mod validation;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain;

pub use repository::RuleRepository;
pub use validation::RuleRejection;

pub const MAX_RULES: usize = 10;
pub const MAX_DOMAIN_LEN: usize = 253;
/// Limit given to sites migrated from the list-only format, and the global
/// fallback when none has been configured.
pub const DEFAULT_LIMIT_MS: u64 = 300_000;

/// Either shape the `rules` key has been written in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRules {
    Limits(BTreeMap<String, Option<u64>>),
    Legacy(Vec<String>),
}

/// Normalized domain → limit in milliseconds. An entry without a limit of
/// its own resolves to the global fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    limits: BTreeMap<String, Option<u64>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes whatever is stored under `rules`. Returns the rule set and
    /// whether it came from the legacy list format and needs writing back.
    /// Unreadable values decode to an empty set.
    pub fn from_stored(raw: Option<&Value>) -> (Self, bool) {
        let Some(raw) = raw else {
            return (Self::new(), false);
        };

        match serde_json::from_value::<StoredRules>(raw.clone()) {
            Ok(StoredRules::Limits(limits)) => (
                Self {
                    limits: limits
                        .into_iter()
                        .map(|(d, ms)| (d, ms.filter(|ms| *ms >= 1)))
                        .collect(),
                },
                false,
            ),
            Ok(StoredRules::Legacy(domains)) => {
                let limits = domains
                    .iter()
                    .map(|d| domain::normalize_host(d))
                    .filter(|d| !d.is_empty())
                    .map(|d| (d, Some(DEFAULT_LIMIT_MS)))
                    .collect();
                (Self { limits }, true)
            }
            Err(err) => {
                log::warn!("ignoring unreadable rules value: {err}");
                (Self::new(), false)
            }
        }
    }

    pub fn to_stored(&self) -> Value {
        serde_json::to_value(&self.limits).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.limits.contains_key(domain)
    }

    /// The site's own limit, if it has one.
    pub fn limit_for(&self, domain: &str) -> Option<u64> {
        self.limits.get(domain).copied().flatten()
    }

    pub fn insert(&mut self, domain: String, limit_ms: u64) {
        self.limits.insert(domain, Some(limit_ms));
    }

    pub fn remove(&mut self, domain: &str) -> bool {
        self.limits.remove(domain).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<u64>)> {
        self.limits.iter().map(|(d, ms)| (d.as_str(), *ms))
    }

    /// The configured rule covering `host`, longest match first.
    pub fn matching_rule(&self, host: &str) -> Option<(&str, Option<u64>)> {
        let rule = domain::best_match(host, self.limits.keys().map(String::as_str))?;
        Some((rule, self.limits[rule]))
    }
}
