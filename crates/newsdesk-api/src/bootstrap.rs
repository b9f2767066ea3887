//! Default administrator provisioning
//!
//! Run explicitly at startup and by `newsdesk bootstrap`; never as a side
//! effect of loading a module.

use newsdesk_core::config::BootstrapConfig;
use newsdesk_core::{NewsdeskError, Role, User};

use crate::auth::password::{hash_password, PasswordConfig, PasswordError, MIN_PASSWORD_LEN};
use crate::auth::repository::CredentialStore;

/// What [`ensure_default_admin`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Email or password not configured
    Skipped,
    /// An account with the configured email already exists
    AlreadyPresent { email: String },
    Created { email: String },
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Bootstrap admin password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] NewsdeskError),
}

/// Create the configured super admin unless an account with that email exists
///
/// Running it again is a no-op.
pub async fn ensure_default_admin(
    credentials: &CredentialStore,
    config: &BootstrapConfig,
    passwords: PasswordConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    let (Some(email), Some(password)) = (
        config.admin_email.as_deref().map(str::trim).filter(|e| !e.is_empty()),
        config.admin_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        tracing::info!("No bootstrap admin configured");
        return Ok(BootstrapOutcome::Skipped);
    };

    if credentials.email_exists(email).await? {
        tracing::info!(email, "Bootstrap admin already present");
        return Ok(BootstrapOutcome::AlreadyPresent {
            email: email.to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BootstrapError::WeakPassword);
    }

    let hash = hash_password(password.to_string(), passwords).await?;
    let admin = User::new(config.admin_name.clone(), email, hash, Role::SuperAdmin);

    match credentials.create(&admin).await {
        Ok(()) => {}
        // Another instance created it first
        Err(NewsdeskError::Conflict(_)) => {
            return Ok(BootstrapOutcome::AlreadyPresent {
                email: admin.email,
            })
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(email = %admin.email, id = %admin.id, "Bootstrap super admin created");
    Ok(BootstrapOutcome::Created { email: admin.email })
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_core::MemoryStore;
    use std::sync::Arc;

    fn fast() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn config(email: Option<&str>, password: Option<&str>) -> BootstrapConfig {
        BootstrapConfig {
            admin_email: email.map(String::from),
            admin_password: password.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_skipped_without_credentials() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let outcome = ensure_default_admin(&credentials, &config(Some("root@example.com"), None), fast())
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_creates_super_admin_once() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let config = config(Some("Root@Example.com"), Some("s3cret-pass"));

        let first = ensure_default_admin(&credentials, &config, fast()).await.unwrap();
        assert_eq!(
            first,
            BootstrapOutcome::Created {
                email: "root@example.com".to_string()
            }
        );

        let second = ensure_default_admin(&credentials, &config, fast()).await.unwrap();
        assert!(matches!(second, BootstrapOutcome::AlreadyPresent { .. }));

        let admin = credentials
            .find_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::SuperAdmin);
        assert_eq!(admin.name, "Administrator");
    }

    #[tokio::test]
    async fn test_rejects_short_password() {
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        let result =
            ensure_default_admin(&credentials, &config(Some("root@example.com"), Some("123")), fast())
                .await;
        assert!(matches!(result, Err(BootstrapError::WeakPassword)));
    }
}
