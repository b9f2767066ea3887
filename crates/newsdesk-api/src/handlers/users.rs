//! Account administration, for super admins

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension,
};
use newsdesk_core::{AccountStatus, Document, Paginated, Role, User, UserProfile};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{list_request, ListParams, StatusUpdateRequest};
use crate::audit::{audit_log, AuditEvent};
use crate::auth::middleware::IdentityContext;
use crate::error::{AppError, ErrorResponse};
use crate::response::{ApiPath, ApiResponse, ValidatedJson};
use crate::state::AppState;

const LABEL: &str = "User";

/// Role change request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RoleUpdateRequest {
    #[validate(length(min = 1, message = "Role is required"))]
    #[schema(example = "admin")]
    pub role: String,
}

fn found(user: Option<User>) -> Result<User, AppError> {
    user.ok_or_else(|| AppError::NotFound(LABEL.to_string()))
}

/// A super admin may not demote or deactivate their own account
fn ensure_not_self(identity: &IdentityContext, id: Uuid, action: &str) -> Result<(), AppError> {
    if identity.id == id {
        Err(AppError::BadRequest(format!("You cannot {action} your own account")))
    } else {
        Ok(())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100"),
        ("sortBy" = Option<String>, Query, description = "Sort field"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("search" = Option<String>, Query, description = "Search name and email"),
        ("role" = Option<String>, Query, description = "user, admin or super_admin"),
        ("status" = Option<String>, Query, description = "active, inactive or suspended"),
    ),
    responses(
        (status = 200, description = "One page of accounts"),
        (status = 403, description = "Not a super admin", body = ErrorResponse),
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<UserProfile>>, AppError> {
    let request = list_request(&state, User::collection_schema(), &params)?;
    let page = state.credentials().list(&request).await?;
    Ok(ApiResponse::ok(page.map(|user| user.to_profile())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = UserProfile),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = found(state.credentials().find_by_id(id).await?)?;
    Ok(ApiResponse::ok(user.to_profile()))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/status",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = UserProfile),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<StatusUpdateRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let status: AccountStatus = request.parse(AccountStatus::VALUES)?;
    if !status.can_authenticate() {
        ensure_not_self(&identity, id, "deactivate")?;
    }

    let user = found(state.credentials().set_status(id, status).await?)?;
    audit_log(&AuditEvent::AccountUpdated {
        user_id: user.id,
        changed_by: identity.id,
        change: format!("status={status}"),
    });

    Ok(ApiResponse::ok(user.to_profile()).with_message("Status updated"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/role",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role changed", body = UserProfile),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<RoleUpdateRequest>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let role: Role = request.role.parse().map_err(|_| {
        AppError::field(
            "role",
            format!("Role must be one of: {}", Role::VALUES.join(", ")),
        )
    })?;
    if role != Role::SuperAdmin {
        ensure_not_self(&identity, id, "demote")?;
    }

    let user = found(state.credentials().set_role(id, role).await?)?;
    audit_log(&AuditEvent::AccountUpdated {
        user_id: user.id,
        changed_by: identity.id,
        change: format!("role={role}"),
    });

    Ok(ApiResponse::ok(user.to_profile()).with_message("Role updated"))
}

/// Lift a lockout before it expires
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/unlock",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account unlocked", body = UserProfile),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn unlock_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let user = found(state.credentials().unlock(id).await?)?;
    audit_log(&AuditEvent::AccountUnlocked {
        user_id: user.id,
        email: user.email.clone(),
        unlocked_by: identity.id,
    });

    Ok(ApiResponse::ok(user.to_profile()).with_message("Account unlocked"))
}
