use serde_json::Value;

pub const RULES: &str = "rules";
pub const FALLBACK_LIMIT_MS: &str = "fallbackLimitMs";

pub fn blocked(domain: &str) -> String {
    format!("blocked:{domain}")
}

pub fn accumulated_time(domain: &str) -> String {
    format!("accumulatedTime:{domain}")
}

/// Persisted block state for one domain.
///
/// `Unblocked` is only ever written on purpose, so readers can tell "was
/// blocked and has just been cleared" apart from "never evaluated".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockFlag {
    #[default]
    Absent,
    Blocked,
    Unblocked,
}

impl BlockFlag {
    pub fn from_stored(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::Bool(true)) => BlockFlag::Blocked,
            Some(Value::Bool(false)) => BlockFlag::Unblocked,
            _ => BlockFlag::Absent,
        }
    }

    pub fn is_blocked(self) -> bool {
        self == BlockFlag::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flag_decodes_tri_state() {
        assert_eq!(BlockFlag::from_stored(Some(&json!(true))), BlockFlag::Blocked);
        assert_eq!(BlockFlag::from_stored(Some(&json!(false))), BlockFlag::Unblocked);
        assert_eq!(BlockFlag::from_stored(None), BlockFlag::Absent);
        assert_eq!(BlockFlag::from_stored(Some(&json!("true"))), BlockFlag::Absent);
        assert!(!BlockFlag::Unblocked.is_blocked());
    }

    #[test]
    fn per_domain_keys_are_prefixed() {
        assert_eq!(blocked("x.com"), "blocked:x.com");
        assert_eq!(accumulated_time("x.com"), "accumulatedTime:x.com");
    }
}
