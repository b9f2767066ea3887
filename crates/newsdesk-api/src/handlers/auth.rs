//! Authentication API handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Extension};
use newsdesk_core::{Role, UserProfile};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::middleware::IdentityContext;
use crate::auth::service::{AuthSession, GuestSession, Registration};
use crate::error::{AppError, ErrorResponse};
use crate::response::{ApiResponse, ValidatedJson};
use crate::state::AppState;

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    #[schema(example = "Alice Editor")]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(max = 30, message = "Phone number is too long"))]
    pub phone: Option<String>,

    /// `user` (default) or `admin`
    #[schema(example = "admin")]
    pub role: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Password change request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub old_password: String,

    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

/// The caller's account
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: MeUser,
}

/// Account profile, or the guest placeholder
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum MeUser {
    Account(UserProfile),
    Guest {
        name: String,
        role: Role,
        guest: bool,
    },
}

fn registration_role(raw: Option<&str>) -> Result<Role, AppError> {
    let invalid = || AppError::field("role", "Role must be one of: user, admin");
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::User),
        Some(raw) => match raw.parse::<Role>().map_err(|_| invalid())? {
            role @ (Role::User | Role::Admin) => Ok(role),
            Role::SuperAdmin => Err(invalid()),
        },
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthSession),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<AuthSession>, AppError> {
    let role = registration_role(request.role.as_deref())?;
    let client = ClientInfo::from_headers(&headers);

    let session = state
        .auth
        .register(
            Registration {
                name: request.name,
                email: request.email,
                password: request.password,
                phone: request.phone.filter(|p| !p.trim().is_empty()),
                role,
            },
            &client,
        )
        .await?;

    Ok(ApiResponse::created(session).with_message("Registration successful"))
}

/// Login with email and password
///
/// Five consecutive failures lock the account for two hours.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthSession),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Not an active administrator", body = ErrorResponse),
        (status = 423, description = "Account locked", body = ErrorResponse),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<AuthSession>, AppError> {
    let client = ClientInfo::from_headers(&headers);
    let session = state
        .auth
        .login(&request.email, &request.password, &client)
        .await?;

    Ok(ApiResponse::ok(session).with_message("Login successful"))
}

/// Issue a guest token
#[utoipa::path(
    post,
    path = "/api/v1/auth/guest",
    tag = "auth",
    responses(
        (status = 200, description = "Guest token", body = GuestSession),
    )
)]
pub async fn guest_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<ApiResponse<GuestSession>, AppError> {
    let session = state.auth.guest(&ClientInfo::from_headers(&headers))?;
    Ok(ApiResponse::ok(session))
}

/// Current caller
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
) -> Result<ApiResponse<MeResponse>, AppError> {
    let user = if identity.guest {
        MeUser::Guest {
            name: identity.name,
            role: identity.role,
            guest: true,
        }
    } else {
        let user = state
            .credentials()
            .find_by_id(identity.id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        MeUser::Account(user.to_profile())
    };

    Ok(ApiResponse::ok(MeResponse { user }))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is wrong", body = ErrorResponse),
        (status = 403, description = "Guest session", body = ErrorResponse),
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    let account_id = identity.require_account()?;
    state
        .auth
        .change_password(
            account_id,
            &request.old_password,
            &request.new_password,
            &ClientInfo::from_headers(&headers),
        )
        .await?;

    Ok(ApiResponse::message("Password changed successfully"))
}

/// Revoke the presented token
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out"),
        (status = 403, description = "Guest session", body = ErrorResponse),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
) -> Result<ApiResponse<()>, AppError> {
    let account_id = identity.require_account()?;
    state
        .denylist
        .revoke(&identity.token_id, identity.token_expires_at);

    audit_log(&AuditEvent::Logout {
        user_id: account_id,
        email: identity.email,
        client: ClientInfo::from_headers(&headers),
    });

    Ok(ApiResponse::message("Logged out successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_role() {
        assert_eq!(registration_role(None).unwrap(), Role::User);
        assert_eq!(registration_role(Some("")).unwrap(), Role::User);
        assert_eq!(registration_role(Some("Admin")).unwrap(), Role::Admin);
        assert!(registration_role(Some("super_admin")).is_err());
        assert!(registration_role(Some("editor")).is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            phone: None,
            role: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
