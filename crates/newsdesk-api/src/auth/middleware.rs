//! Authentication and role middleware
//!
//! [`auth_middleware`] turns a bearer token into an [`IdentityContext`] in
//! the request extensions. [`require_roles`] runs after it and checks the
//! context's role against a fixed set.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use newsdesk_core::{AccountStatus, Role, User};
use serde::Serialize;
use uuid::Uuid;

use super::jwt::{Claims, JwtError};
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use crate::state::AppState;

/// Roles allowed into the administrative routes
pub const STAFF_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

/// Roles allowed to manage accounts
pub const SUPER_ADMIN_ROLES: &[Role] = &[Role::SuperAdmin];

/// The caller behind a verified token
///
/// Added to request extensions by [`auth_middleware`]; handlers take it with
/// `Extension<IdentityContext>`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    /// Account id; a random id for guests
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: AccountStatus,
    pub guest: bool,
    #[serde(skip)]
    pub token_id: String,
    #[serde(skip)]
    pub token_expires_at: DateTime<Utc>,
}

impl IdentityContext {
    fn account(user: &User, claims: &Claims) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            status: user.status,
            guest: false,
            token_id: claims.jti.clone(),
            token_expires_at: claims.expires_at(),
        }
    }

    fn guest(claims: &Claims) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            name: "Guest".to_string(),
            role: Role::User,
            status: AccountStatus::Active,
            guest: true,
            token_id: claims.jti.clone(),
            token_expires_at: claims.expires_at(),
        }
    }

    /// Role gate: `Forbidden` unless the caller's role is in `allowed`
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) && !self.guest {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }

    /// `Forbidden` for guest sessions
    pub fn require_account(&self) -> Result<Uuid, AppError> {
        if self.guest {
            Err(AppError::Forbidden(
                "Guest sessions cannot perform this action".to_string(),
            ))
        } else {
            Ok(self.id)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn reject(reason: impl Into<String>, client: ClientInfo) -> AppError {
    audit_log(&AuditEvent::InvalidToken {
        reason: reason.into(),
        client,
    });
    AppError::Unauthorized
}

/// Authenticate the request from its bearer token
///
/// Missing, malformed, expired and revoked tokens, and tokens for accounts
/// that no longer exist, all produce the same 401. Inactive accounts get
/// 403 and locked accounts 423, checked against the stored account so that
/// changes take effect without waiting for the token to expire.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = ClientInfo::from_headers(request.headers());

    let Some(token) = bearer_token(request.headers()) else {
        return Err(AppError::Unauthorized);
    };

    let claims = match state.auth.tokens().verify(token) {
        Ok(claims) => claims,
        Err(e @ (JwtError::InvalidToken | JwtError::ExpiredToken)) => {
            return Err(reject(e.to_string(), client));
        }
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    if state.denylist.is_revoked(&claims.jti) {
        return Err(reject("Token has been revoked", client));
    }

    let identity = if claims.is_guest() {
        IdentityContext::guest(&claims)
    } else {
        let Some(account_id) = claims.account_id() else {
            return Err(reject("Malformed subject", client));
        };
        let Some(user) = state.credentials().find_by_id(account_id).await? else {
            return Err(reject("Account no longer exists", client));
        };

        if !user.status.can_authenticate() {
            return Err(AppError::AccountInactive);
        }
        if let Some(until) = user.lock_until.filter(|until| *until > Utc::now()) {
            return Err(AppError::AccountLocked { until });
        }

        IdentityContext::account(&user, &claims)
    };

    tracing::debug!(user_id = %identity.id, role = %identity.role, guest = identity.guest, "Authenticated");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AppError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Must be layered inside [`auth_middleware`]:
///
/// ```ignore
/// Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn(require_roles(SUPER_ADMIN_ROLES)))
///     .route_layer(middleware::from_fn_with_state(state, auth_middleware));
/// ```
pub fn require_roles(
    allowed: &'static [Role],
) -> impl Fn(Request, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let Some(identity) = request.extensions().get::<IdentityContext>() else {
                return Err(AppError::Unauthorized);
            };

            if let Err(e) = identity.require_role(allowed) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: (!identity.guest).then_some(identity.id),
                    resource: request.uri().path().to_string(),
                    required_roles: allowed
                        .iter()
                        .map(Role::as_str)
                        .collect::<Vec<_>>()
                        .join(","),
                    client: ClientInfo::from_headers(request.headers()),
                });
                return Err(e);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role, guest: bool) -> IdentityContext {
        IdentityContext {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            role,
            status: AccountStatus::Active,
            guest,
            token_id: "jti".to_string(),
            token_expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_gate() {
        assert!(identity(Role::Admin, false).require_role(STAFF_ROLES).is_ok());
        assert!(identity(Role::SuperAdmin, false).require_role(STAFF_ROLES).is_ok());
        assert!(identity(Role::User, false).require_role(STAFF_ROLES).is_err());
        assert!(identity(Role::Admin, false)
            .require_role(SUPER_ADMIN_ROLES)
            .is_err());
        assert!(identity(Role::SuperAdmin, false)
            .require_role(SUPER_ADMIN_ROLES)
            .is_ok());
    }

    #[test]
    fn test_guest_is_never_staff() {
        let guest = identity(Role::User, true);
        assert!(guest.require_role(STAFF_ROLES).is_err());
        assert!(guest.require_account().is_err());
        assert!(identity(Role::User, false).require_account().is_ok());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
