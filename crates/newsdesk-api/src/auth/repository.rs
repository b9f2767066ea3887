//! Account persistence
//!
//! Wraps the `users` collection with the lookups and field updates the
//! authentication flow needs. Every update is a partial patch of the stored
//! document, so concurrent updates to different fields do not clobber each
//! other; concurrent updates to the same field are last-write-wins.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use newsdesk_core::models::normalize_email;
use newsdesk_core::query::{self, ListRequest};
use newsdesk_core::{AccountStatus, Collection, DocumentStore, Filter, Paginated, Result, Role, User};
use serde_json::json;
use uuid::Uuid;

use super::lockout::LockoutCounters;

#[derive(Clone)]
pub struct CredentialStore {
    users: Collection<User>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: Collection::new(store),
        }
    }

    /// Case-insensitive lookup
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.users
            .find_one(&Filter::new().eq("email", normalize_email(email)))
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.users.find_by_id(id).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count = self
            .users
            .count(&Filter::new().eq("email", normalize_email(email)))
            .await?;
        Ok(count > 0)
    }

    /// Insert a new account; `Conflict` if the email is taken
    pub async fn create(&self, user: &User) -> Result<()> {
        self.users.insert(user).await
    }

    pub async fn list(&self, request: &ListRequest) -> Result<Paginated<User>> {
        query::list(&self.users, request).await
    }

    /// Persist the counters produced by the lockout policy
    pub async fn save_lockout(&self, id: Uuid, counters: LockoutCounters) -> Result<Option<User>> {
        self.users
            .patch(
                id,
                json!({
                    "failedLoginAttempts": counters.failed_attempts,
                    "lockUntil": counters.lock_until,
                    "updatedAt": Utc::now(),
                }),
            )
            .await
    }

    /// Clear the lockout counters and stamp the login time
    pub async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<User>> {
        self.users
            .patch(
                id,
                json!({
                    "failedLoginAttempts": 0,
                    "lockUntil": null,
                    "lastLogin": at,
                    "updatedAt": at,
                }),
            )
            .await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<Option<User>> {
        let now = Utc::now();
        self.users
            .patch(
                id,
                json!({
                    "passwordHash": password_hash,
                    "passwordChangedAt": now,
                    "updatedAt": now,
                }),
            )
            .await
    }

    pub async fn set_status(&self, id: Uuid, status: AccountStatus) -> Result<Option<User>> {
        self.users
            .patch(id, json!({ "status": status, "updatedAt": Utc::now() }))
            .await
    }

    pub async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        self.users
            .patch(id, json!({ "role": role, "updatedAt": Utc::now() }))
            .await
    }

    /// Lift a lock and reset the failure counter
    pub async fn unlock(&self, id: Uuid) -> Result<Option<User>> {
        self.save_lockout(id, LockoutCounters::default()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use newsdesk_core::{MemoryStore, NewsdeskError};

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStore::new()))
    }

    fn user(email: &str) -> User {
        User::new("Tester".to_string(), email, "hash".to_string(), Role::Admin)
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let credentials = store();
        credentials.create(&user("Editor@Example.com")).await.unwrap();

        let found = credentials.find_by_email("EDITOR@example.COM").await.unwrap();
        assert!(found.is_some());
        assert!(credentials.email_exists("editor@example.com").await.unwrap());
        assert!(credentials.find_by_email("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let credentials = store();
        credentials.create(&user("dup@example.com")).await.unwrap();

        let err = credentials.create(&user("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, NewsdeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lockout_fields_roundtrip() {
        let credentials = store();
        let account = user("locked@example.com");
        credentials.create(&account).await.unwrap();

        let until = Utc::now() + Duration::hours(2);
        let updated = credentials
            .save_lockout(
                account.id,
                LockoutCounters {
                    failed_attempts: 5,
                    lock_until: Some(until),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.failed_login_attempts, 5);
        assert!(updated.is_locked());

        let unlocked = credentials.unlock(account.id).await.unwrap().unwrap();
        assert_eq!(unlocked.failed_login_attempts, 0);
        assert_eq!(unlocked.lock_until, None);
    }

    #[tokio::test]
    async fn test_record_login_resets_counters() {
        let credentials = store();
        let mut account = user("back@example.com");
        account.failed_login_attempts = 3;
        credentials.create(&account).await.unwrap();

        let now = Utc::now();
        let updated = credentials.record_login(account.id, now).await.unwrap().unwrap();
        assert_eq!(updated.failed_login_attempts, 0);
        assert_eq!(updated.last_login, Some(now));
        // The hash is untouched by a partial update
        assert_eq!(updated.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_updates_on_missing_account() {
        let credentials = store();
        assert!(credentials
            .set_role(Uuid::new_v4(), Role::User)
            .await
            .unwrap()
            .is_none());
    }
}
