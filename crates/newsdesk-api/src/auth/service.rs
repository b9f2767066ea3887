//! Authentication service layer
//!
//! Registration, login, guest sessions and password changes. The login path
//! drives the lockout policy and writes an audit event for every outcome.

use chrono::{DateTime, Utc};
use newsdesk_core::{NewsdeskError, Role, User, UserProfile};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use super::jwt::{JwtError, TokenCodec};
use super::lockout::{LockState, LockoutCounters, LockoutPolicy};
use super::password::{hash_password, verify_password_async, PasswordConfig, PasswordError};
use super::repository::CredentialStore;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;

/// Authentication failures
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; callers must not learn which
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is not active")]
    AccountInactive,

    #[error("Account does not have administrative access")]
    NotStaff,

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Role '{0}' cannot be self-assigned")]
    RoleNotAllowed(Role),

    #[error("Account not found")]
    AccountNotFound,

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] NewsdeskError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::AccountNotFound => AppError::Unauthorized,
            AuthError::AccountLocked { until } => AppError::AccountLocked { until },
            AuthError::AccountInactive => AppError::AccountInactive,
            AuthError::NotStaff => {
                AppError::Forbidden("Access denied. Admin privileges required".to_string())
            }
            AuthError::EmailTaken => {
                AppError::Conflict("User with this email already exists".to_string())
            }
            AuthError::RoleNotAllowed(_) => {
                AppError::field("role", "Role must be one of: user, admin")
            }
            AuthError::Token(e) => AppError::Internal(format!("Failed to issue token: {e}")),
            AuthError::Password(e) => AppError::Internal(e.to_string()),
            AuthError::Store(e) => AppError::from(e),
        }
    }
}

/// Token plus the account it was issued for
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

/// Guest token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GuestSession {
    pub token: String,
    #[serde(rename = "expiresIn")]
    pub expires_in: u64,
}

/// A self-service registration, already validated for shape
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    credentials: CredentialStore,
    tokens: TokenCodec,
    lockout: LockoutPolicy,
    passwords: PasswordConfig,
}

impl AuthService {
    pub fn new(
        credentials: CredentialStore,
        tokens: TokenCodec,
        lockout: LockoutPolicy,
        passwords: PasswordConfig,
    ) -> Self {
        Self {
            credentials,
            tokens,
            lockout,
            passwords,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }

    /// Create an account and sign it in
    ///
    /// Only `user` and `admin` may be chosen here; super admins come from
    /// bootstrap or a role change by another super admin.
    pub async fn register(
        &self,
        registration: Registration,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        let result = self.create_account(registration.clone()).await;

        match &result {
            Ok(session) => audit_log(&AuditEvent::RegistrationSuccess {
                user_id: session.user.id,
                email: session.user.email.clone(),
                role: session.user.role.to_string(),
                client: client.clone(),
            }),
            Err(e) => audit_log(&AuditEvent::RegistrationFailure {
                email: registration.email,
                reason: e.to_string(),
                client: client.clone(),
            }),
        }

        result
    }

    async fn create_account(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        match registration.role {
            Role::User | Role::Admin => {}
            Role::SuperAdmin => return Err(AuthError::RoleNotAllowed(registration.role)),
        }

        if self.credentials.email_exists(&registration.email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(registration.password, self.passwords.clone()).await?;
        let mut user = User::new(
            registration.name.trim().to_string(),
            &registration.email,
            password_hash,
            registration.role,
        );
        user.phone = registration.phone;

        self.credentials.create(&user).await.map_err(|e| match e {
            // Lost a race with a concurrent registration
            NewsdeskError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        })?;

        let token = self.tokens.issue(user.id, user.role)?;
        Ok(AuthSession {
            token,
            user: user.to_profile(),
        })
    }

    /// Password login for the administrative backend
    ///
    /// A locked account is refused before the password is checked. A wrong
    /// password advances the lockout counters. Status and role are only
    /// revealed to callers who know the password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        let now = Utc::now();

        let Some(user) = self.credentials.find_by_email(email).await? else {
            audit_log(&AuditEvent::LoginFailure {
                email: email.to_string(),
                reason: "unknown account".to_string(),
                failed_attempts: None,
                client: client.clone(),
            });
            return Err(AuthError::InvalidCredentials);
        };

        let counters = LockoutCounters::from(&user);
        if let LockState::Locked { until } = self.lockout.state(counters, now) {
            audit_log(&AuditEvent::LoginFailure {
                email: user.email.clone(),
                reason: "account locked".to_string(),
                failed_attempts: Some(user.failed_login_attempts),
                client: client.clone(),
            });
            return Err(AuthError::AccountLocked { until });
        }

        let valid = verify_password_async(password.to_string(), user.password_hash.clone()).await?;
        if !valid {
            let next = self.lockout.on_failure(counters, now);
            self.credentials.save_lockout(user.id, next).await?;

            match next.lock_until {
                Some(locked_until) => audit_log(&AuditEvent::AccountLocked {
                    user_id: user.id,
                    email: user.email.clone(),
                    failed_attempts: next.failed_attempts,
                    locked_until,
                    client: client.clone(),
                }),
                None => audit_log(&AuditEvent::LoginFailure {
                    email: user.email.clone(),
                    reason: "invalid password".to_string(),
                    failed_attempts: Some(next.failed_attempts),
                    client: client.clone(),
                }),
            }
            return Err(AuthError::InvalidCredentials);
        }

        if !user.status.can_authenticate() {
            audit_log(&AuditEvent::LoginFailure {
                email: user.email.clone(),
                reason: format!("account {}", user.status),
                failed_attempts: None,
                client: client.clone(),
            });
            return Err(AuthError::AccountInactive);
        }

        if !user.role.is_staff() {
            audit_log(&AuditEvent::LoginFailure {
                email: user.email.clone(),
                reason: "not staff".to_string(),
                failed_attempts: None,
                client: client.clone(),
            });
            return Err(AuthError::NotStaff);
        }

        let user = self
            .credentials
            .record_login(user.id, now)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let token = self.tokens.issue(user.id, user.role)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            client: client.clone(),
        });

        Ok(AuthSession {
            token,
            user: user.to_profile(),
        })
    }

    /// Issue a token for an anonymous visitor
    pub fn guest(&self, client: &ClientInfo) -> Result<GuestSession, AuthError> {
        let token = self.tokens.issue_guest()?;
        let claims = self.tokens.verify(&token)?;

        audit_log(&AuditEvent::GuestSession {
            guest_id: claims.sub,
            client: client.clone(),
        });

        Ok(GuestSession {
            token,
            expires_in: self.tokens.expiration_secs(),
        })
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        account_id: Uuid,
        current_password: &str,
        new_password: &str,
        client: &ClientInfo,
    ) -> Result<(), AuthError> {
        let user = self
            .credentials
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if !verify_password_async(current_password.to_string(), user.password_hash.clone()).await? {
            audit_log(&AuditEvent::LoginFailure {
                email: user.email.clone(),
                reason: "password change with wrong current password".to_string(),
                failed_attempts: None,
                client: client.clone(),
            });
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = hash_password(new_password.to_string(), self.passwords.clone()).await?;
        self.credentials
            .update_password(user.id, &password_hash)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        audit_log(&AuditEvent::PasswordChange {
            user_id: user.id,
            email: user.email,
            client: client.clone(),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use newsdesk_core::config::AuthConfig;
    use newsdesk_core::{AccountStatus, MemoryStore};
    use std::sync::Arc;

    fn service() -> AuthService {
        let config = AuthConfig::default();
        AuthService::new(
            CredentialStore::new(Arc::new(MemoryStore::new())),
            TokenCodec::new(&config),
            LockoutPolicy::from(&config),
            PasswordConfig {
                memory_cost: 1024,
                time_cost: 1,
                parallelism: 1,
            },
        )
    }

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            name: "Editor".to_string(),
            email: email.to_string(),
            password: "secret1".to_string(),
            phone: None,
            role,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();
        let client = ClientInfo::default();

        let session = auth
            .register(registration("ed@example.com", Role::Admin), &client)
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::Admin);

        let login = auth.login("ED@example.com", "secret1", &client).await.unwrap();
        assert_eq!(login.user.id, session.user.id);
        assert!(login.user.last_login.is_some());

        let claims = auth.tokens().verify(&login.token).unwrap();
        assert_eq!(claims.account_id(), Some(session.user.id));
    }

    #[tokio::test]
    async fn test_register_rejects_super_admin_and_duplicates() {
        let auth = service();
        let client = ClientInfo::default();

        let err = auth
            .register(registration("root@example.com", Role::SuperAdmin), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::RoleNotAllowed(Role::SuperAdmin)));

        auth.register(registration("dup@example.com", Role::User), &client)
            .await
            .unwrap();
        let err = auth
            .register(registration("Dup@Example.com", Role::User), &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_non_staff_cannot_login() {
        let auth = service();
        let client = ClientInfo::default();
        auth.register(registration("reader@example.com", Role::User), &client)
            .await
            .unwrap();

        let err = auth
            .login("reader@example.com", "secret1", &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotStaff));

        // Wrong password is still reported as invalid credentials
        let err = auth
            .login("reader@example.com", "wrong!", &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_lockout_after_five_failures() {
        let auth = service();
        let client = ClientInfo::default();
        let session = auth
            .register(registration("lock@example.com", Role::Admin), &client)
            .await
            .unwrap();

        for _ in 0..5 {
            let err = auth.login("lock@example.com", "wrong!", &client).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }

        // Even the right password is refused while locked
        let err = auth
            .login("lock@example.com", "secret1", &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountLocked { .. }));

        let stored = auth
            .credentials()
            .find_by_id(session.user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.failed_login_attempts, 5);

        // Once the lock has passed, a correct password resets the counter
        auth.credentials()
            .save_lockout(
                stored.id,
                LockoutCounters {
                    failed_attempts: 5,
                    lock_until: Some(Utc::now() - Duration::seconds(1)),
                },
            )
            .await
            .unwrap();
        let login = auth.login("lock@example.com", "secret1", &client).await.unwrap();
        assert!(!login.user.is_locked);

        let stored = auth.credentials().find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 0);
        assert_eq!(stored.lock_until, None);
    }

    #[tokio::test]
    async fn test_inactive_account_rejected_after_password() {
        let auth = service();
        let client = ClientInfo::default();
        let session = auth
            .register(registration("off@example.com", Role::Admin), &client)
            .await
            .unwrap();
        auth.credentials()
            .set_status(session.user.id, AccountStatus::Suspended)
            .await
            .unwrap();

        let err = auth.login("off@example.com", "secret1", &client).await.unwrap_err();
        assert!(matches!(err, AuthError::AccountInactive));
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = service();
        let client = ClientInfo::default();
        let session = auth
            .register(registration("pw@example.com", Role::Admin), &client)
            .await
            .unwrap();

        let err = auth
            .change_password(session.user.id, "not-it", "newsecret", &client)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        auth.change_password(session.user.id, "secret1", "newsecret", &client)
            .await
            .unwrap();
        assert!(auth.login("pw@example.com", "newsecret", &client).await.is_ok());
    }

    #[test]
    fn test_guest_session() {
        let auth = service();
        let session = auth.guest(&ClientInfo::default()).unwrap();
        assert!(auth.tokens().verify(&session.token).unwrap().is_guest());
    }
}
