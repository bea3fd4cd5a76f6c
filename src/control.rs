//! Site list editing. Every outcome comes back as a [`Notice`] for the user;
//! nothing here returns an error to the caller.

use serde::Serialize;

use crate::{
    domain::normalize_host,
    rules::{RuleRejection, RuleRepository},
    surface::Severity,
};

pub const MIN_LIMIT_MINUTES: u64 = 1;
const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
        }
    }

    fn rejected(rejection: RuleRejection) -> Self {
        let severity = match rejection {
            RuleRejection::Store(_) => Severity::Error,
            _ => Severity::Warning,
        };
        Self {
            message: rejection.to_string(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SiteRow {
    pub domain: String,
    /// `None` when the site follows the global fallback.
    pub limit_minutes: Option<u64>,
}

fn minutes_to_ms(minutes: u64) -> Result<u64, RuleRejection> {
    if minutes < MIN_LIMIT_MINUTES {
        return Err(RuleRejection::LimitTooSmall);
    }
    Ok(minutes.saturating_mul(MS_PER_MINUTE))
}

pub async fn add_site(rules: &RuleRepository, input: &str, minutes: u64) -> Notice {
    let domain = normalize_host(input);
    let result = match minutes_to_ms(minutes) {
        Ok(limit_ms) => rules.save_rule(&domain, limit_ms).await,
        Err(rejection) => Err(rejection),
    };

    match result {
        Ok(()) => Notice::info(format!("{domain} added ({minutes} min)")),
        Err(rejection) => Notice::rejected(rejection),
    }
}

/// Changes a listed site's limit. An active block stays in place.
pub async fn set_site_limit(rules: &RuleRepository, input: &str, minutes: u64) -> Notice {
    let domain = normalize_host(input);
    let result = match minutes_to_ms(minutes) {
        Ok(limit_ms) => rules.update_limit(&domain, limit_ms).await,
        Err(rejection) => Err(rejection),
    };

    match result {
        Ok(()) => Notice::info(format!("{domain} limit set to {minutes} min")),
        Err(rejection) => Notice::rejected(rejection),
    }
}

pub async fn remove_site(rules: &RuleRepository, input: &str) -> Notice {
    let domain = normalize_host(input);
    if domain.is_empty() {
        return Notice::rejected(RuleRejection::EmptyDomain);
    }

    if rules.remove_rule(&domain).await {
        Notice::info(format!("{domain} removed"))
    } else {
        Notice::rejected(RuleRejection::UnknownDomain(domain))
    }
}

pub async fn set_fallback_minutes(rules: &RuleRepository, minutes: u64) -> Notice {
    let result = match minutes_to_ms(minutes) {
        Ok(limit_ms) => rules.set_fallback_limit(limit_ms).await,
        Err(rejection) => Err(rejection),
    };

    match result {
        Ok(()) => Notice::info(format!("Default limit set to {minutes} min")),
        Err(rejection) => Notice::rejected(rejection),
    }
}

pub async fn list_sites(rules: &RuleRepository) -> Vec<SiteRow> {
    rules
        .load_rules()
        .await
        .iter()
        .map(|(domain, limit_ms)| SiteRow {
            domain: domain.to_string(),
            limit_minutes: limit_ms.map(|ms| ms / MS_PER_MINUTE),
        })
        .collect()
}
