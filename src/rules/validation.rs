//! Checks applied before a rule is written.

use thiserror::Error;

use super::{MAX_DOMAIN_LEN, MAX_RULES};

/// Why a rule was not saved. Each condition is reported on its own.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleRejection {
    #[error("Enter a domain")]
    EmptyDomain,

    #[error("Domain is too long (max {} characters)", MAX_DOMAIN_LEN)]
    DomainTooLong,

    #[error("'{0}' is not a valid domain")]
    InvalidDomain(String),

    #[error("Limit must be at least 1 minute")]
    LimitTooSmall,

    #[error("You can track at most {} sites", MAX_RULES)]
    TooManyRules,

    #[error("{0} is already in the list")]
    DuplicateDomain(String),

    #[error("{0} is not in the list")]
    UnknownDomain(String),

    #[error("Could not save: {0}")]
    Store(String),
}

pub fn validate_domain(domain: &str) -> Result<(), RuleRejection> {
    if domain.is_empty() {
        return Err(RuleRejection::EmptyDomain);
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(RuleRejection::DomainTooLong);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    let invalid = || RuleRejection::InvalidDomain(domain.to_string());

    if labels.len() < 2 {
        return Err(invalid());
    }

    for label in &labels {
        if label.is_empty() || label.len() > 63 {
            return Err(invalid());
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid());
        }
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }

    Ok(())
}

pub fn validate_limit(limit_ms: u64) -> Result<(), RuleRejection> {
    if limit_ms < 1 {
        return Err(RuleRejection::LimitTooSmall);
    }
    Ok(())
}
