//! Revoked token registry
//!
//! Holds the `jti` of every token signed out before its expiry. Each entry
//! lives exactly as long as the token it revokes, so the cache stays
//! bounded by the number of logouts within one token lifetime.
//!
//! Process-local: a restart forgets revocations, and separate instances do
//! not share them.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use moka::Expiry;

/// Expires each entry at the `exp` of the token it revokes
struct UntilTokenExpiry;

impl Expiry<String, DateTime<Utc>> for UntilTokenExpiry {
    fn expire_after_create(
        &self,
        _jti: &String,
        expires_at: &DateTime<Utc>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(remaining(*expires_at))
    }
}

fn remaining(expires_at: DateTime<Utc>) -> Duration {
    (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Clone)]
pub struct TokenDenylist {
    revoked: Cache<String, DateTime<Utc>>,
}

impl TokenDenylist {
    pub fn new() -> Self {
        Self {
            revoked: Cache::builder().expire_after(UntilTokenExpiry).build(),
        }
    }

    /// Revoke a token until its expiry
    pub fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) {
        if expires_at > Utc::now() {
            self.revoked.insert(jti.to_string(), expires_at);
        }
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.get(jti).is_some()
    }

    /// Approximate number of live revocations
    pub fn len(&self) -> u64 {
        self.revoked.run_pending_tasks();
        self.revoked.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TokenDenylist {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenDenylist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDenylist")
            .field("revoked", &self.revoked.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_revoke_and_check() {
        let denylist = TokenDenylist::new();
        assert!(!denylist.is_revoked("a"));

        denylist.revoke("a", Utc::now() + ChronoDuration::hours(1));
        assert!(denylist.is_revoked("a"));
        assert!(!denylist.is_revoked("b"));
        assert_eq!(denylist.len(), 1);
    }

    #[test]
    fn test_expired_tokens_are_not_kept() {
        let denylist = TokenDenylist::new();
        denylist.revoke("old", Utc::now() - ChronoDuration::seconds(1));

        assert!(denylist.is_empty());
        assert!(!denylist.is_revoked("old"));
    }

    #[test]
    fn test_entry_lapses_with_its_token() {
        let denylist = TokenDenylist::new();
        denylist.revoke("live", Utc::now() + ChronoDuration::hours(1));
        denylist.revoke("short", Utc::now() + ChronoDuration::milliseconds(50));
        assert!(denylist.is_revoked("short"));

        std::thread::sleep(std::time::Duration::from_millis(120));

        assert!(!denylist.is_revoked("short"));
        assert!(denylist.is_revoked("live"));
        assert_eq!(denylist.len(), 1);
    }

    #[test]
    fn test_remaining_is_zero_for_past_expiry() {
        assert_eq!(
            remaining(Utc::now() - ChronoDuration::minutes(1)),
            Duration::ZERO
        );
        assert!(remaining(Utc::now() + ChronoDuration::minutes(1)) > Duration::from_secs(50));
    }
}
