use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::store::{keys, write_block_flag, KvStore};

use super::{
    validation::{validate_domain, validate_limit},
    RuleRejection, RuleSet, DEFAULT_LIMIT_MS, MAX_RULES,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Reads and writes site rules and the global fallback limit.
#[derive(Clone)]
pub struct RuleRepository {
    store: Arc<dyn KvStore>,
}

impl RuleRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Loads the rule set, upgrading the list-only format in place.
    /// A failing store reads as "no rules configured".
    pub async fn load_rules(&self) -> RuleSet {
        match self.try_load_rules().await {
            Ok(rules) => rules,
            Err(err) => {
                log_warn!("failed to read rules, treating as empty: {err:#}");
                RuleSet::new()
            }
        }
    }

    /// Like [`load_rules`](Self::load_rules) but surfaces store failures, for
    /// callers that must not mistake an outage for "no rules".
    pub async fn try_load_rules(&self) -> Result<RuleSet> {
        let raw = self.store.get(keys::RULES).await?;

        let (rules, migrated) = RuleSet::from_stored(raw.as_ref());
        if migrated {
            log_info!("migrating {} legacy rules to per-site limits", rules.len());
            if let Err(err) = self.store.set(keys::RULES, rules.to_stored()).await {
                log_warn!("failed to persist migrated rules: {err:#}");
            }
        }
        Ok(rules)
    }

    /// Reads the rules ahead of a write. A failed read must not be taken as
    /// an empty list, or the write would drop every configured site.
    async fn load_for_edit(&self) -> Result<RuleSet, RuleRejection> {
        self.try_load_rules()
            .await
            .map_err(|err| RuleRejection::Store(format!("{err:#}")))
    }

    /// Adds a rule for an already-normalized domain.
    pub async fn save_rule(&self, domain: &str, limit_ms: u64) -> Result<(), RuleRejection> {
        validate_domain(domain)?;
        validate_limit(limit_ms)?;

        let mut rules = self.load_for_edit().await?;
        if rules.contains(domain) {
            return Err(RuleRejection::DuplicateDomain(domain.to_string()));
        }
        if rules.len() >= MAX_RULES {
            return Err(RuleRejection::TooManyRules);
        }

        rules.insert(domain.to_string(), limit_ms);
        self.store
            .set(keys::RULES, rules.to_stored())
            .await
            .map_err(|err| RuleRejection::Store(err.to_string()))?;

        log_info!("added rule {domain} ({limit_ms} ms)");
        Ok(())
    }

    /// Changes the limit of an existing rule. An active block is left alone:
    /// only removing the site clears it.
    pub async fn update_limit(&self, domain: &str, limit_ms: u64) -> Result<(), RuleRejection> {
        validate_limit(limit_ms)?;

        let mut rules = self.load_for_edit().await?;
        if !rules.contains(domain) {
            return Err(RuleRejection::UnknownDomain(domain.to_string()));
        }

        rules.insert(domain.to_string(), limit_ms);
        self.store
            .set(keys::RULES, rules.to_stored())
            .await
            .map_err(|err| RuleRejection::Store(err.to_string()))
    }

    /// Removes a rule. The block flag is forced to `false` before the rule
    /// disappears so any tab showing the block screen picks up the change on
    /// its next poll. Returns whether the rule existed; nothing is written
    /// when it did not or when the rules cannot be read.
    pub async fn remove_rule(&self, domain: &str) -> bool {
        let mut rules = match self.try_load_rules().await {
            Ok(rules) => rules,
            Err(err) => {
                log_warn!("not removing {domain}, rules unreadable: {err:#}");
                return false;
            }
        };
        if !rules.remove(domain) {
            return false;
        }

        write_block_flag(self.store.as_ref(), domain, false).await;
        if let Err(err) = self.store.remove(&keys::accumulated_time(domain)).await {
            log_warn!("failed to clear accumulated time for {domain}: {err:#}");
        }

        if let Err(err) = self.store.set(keys::RULES, rules.to_stored()).await {
            log_warn!("failed to persist rules after removing {domain}: {err:#}");
        }
        log_info!("removed rule {domain}");
        true
    }

    /// The global fallback limit; missing, invalid or unreadable values give
    /// the default.
    pub async fn fallback_limit(&self) -> u64 {
        match self.store.get(keys::FALLBACK_LIMIT_MS).await {
            Ok(Some(value)) => value.as_u64().filter(|ms| *ms >= 1).unwrap_or(DEFAULT_LIMIT_MS),
            Ok(None) => DEFAULT_LIMIT_MS,
            Err(err) => {
                log_warn!("failed to read fallback limit: {err:#}");
                DEFAULT_LIMIT_MS
            }
        }
    }

    pub async fn set_fallback_limit(&self, limit_ms: u64) -> Result<(), RuleRejection> {
        validate_limit(limit_ms)?;
        self.store
            .set(keys::FALLBACK_LIMIT_MS, Value::from(limit_ms))
            .await
            .map_err(|err| RuleRejection::Store(err.to_string()))
    }

    /// Resolves the rule covering `host` and its effective limit.
    pub async fn resolve(&self, host: &str) -> Option<(String, u64)> {
        let rules = self.load_rules().await;
        let (domain, limit) = rules.matching_rule(host)?;
        let limit = match limit {
            Some(ms) => ms,
            None => self.fallback_limit().await,
        };
        Some((domain.to_string(), limit))
    }
}
