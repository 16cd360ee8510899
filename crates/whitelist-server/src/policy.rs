//! Access policy: administrator capability and origin allow-set

use std::collections::BTreeSet;
use whitelist_core::{OriginFilter, Requester, Result, WhitelistConfig, WhitelistError};

/// Binary permission checks consumed by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: BTreeSet<String>,
    origin_filter: OriginFilter,
}

impl AccessPolicy {
    pub fn new(admins: BTreeSet<String>, origin_filter: OriginFilter) -> Self {
        Self {
            admins,
            origin_filter,
        }
    }

    pub fn from_config(config: &WhitelistConfig) -> Self {
        Self::new(config.admins.clone(), config.origin_filter.clone())
    }

    pub fn is_administrator(&self, identity: &str) -> bool {
        self.admins.contains(identity)
    }

    /// Always true when filtering is disabled; otherwise the origin must be
    /// present and in the allow-set
    pub fn is_allowed_origin(&self, origin: Option<&str>) -> bool {
        if !self.origin_filter.enabled {
            return true;
        }
        origin.is_some_and(|o| self.origin_filter.allowed.contains(o))
    }

    pub fn require_admin(&self, requester: &Requester) -> Result<()> {
        if self.is_administrator(&requester.id) {
            Ok(())
        } else {
            Err(WhitelistError::Unauthorized)
        }
    }

    /// Origin gate for self-service commands; administrators bypass it
    pub fn require_origin(&self, requester: &Requester) -> Result<()> {
        if self.is_administrator(&requester.id) || self.is_allowed_origin(requester.origin.as_deref())
        {
            Ok(())
        } else {
            Err(WhitelistError::OriginRefused(
                self.origin_filter.refused_text.clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whitelist_core::ErrorKind;

    fn policy(filter_enabled: bool) -> AccessPolicy {
        AccessPolicy::new(
            BTreeSet::from(["admin".to_string()]),
            OriginFilter {
                enabled: filter_enabled,
                allowed: BTreeSet::from(["group-a".to_string()]),
                refused_text: "not here".to_string(),
            },
        )
    }

    #[test]
    fn test_admin_membership() {
        let policy = policy(false);
        assert!(policy.is_administrator("admin"));
        assert!(!policy.is_administrator("Admin"));
        assert!(!policy.is_administrator("10001"));
    }

    #[test]
    fn test_non_admin_always_unauthorized() {
        let policy = policy(false);
        for id in ["10001", "", "admin "] {
            let err = policy.require_admin(&Requester::new(id, "x")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthorized);
        }
        assert!(policy.require_admin(&Requester::new("admin", "root")).is_ok());
    }

    #[test]
    fn test_empty_admin_set_denies_everyone() {
        let policy = AccessPolicy::default();
        assert!(policy.require_admin(&Requester::new("admin", "root")).is_err());
    }

    #[test]
    fn test_origin_filter_disabled_allows_all() {
        let policy = policy(false);
        assert!(policy.is_allowed_origin(None));
        assert!(policy.is_allowed_origin(Some("group-z")));
    }

    #[test]
    fn test_origin_filter_enabled() {
        let policy = policy(true);
        assert!(policy.is_allowed_origin(Some("group-a")));
        assert!(!policy.is_allowed_origin(Some("group-z")));
        assert!(!policy.is_allowed_origin(None));

        let user = Requester::new("10001", "alice").with_origin("group-z");
        let err = policy.require_origin(&user).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OriginRefused);
        assert_eq!(err.to_string(), "not here");

        let admin = Requester::new("admin", "root").with_origin("group-z");
        assert!(policy.require_origin(&admin).is_ok());
    }
}
