//! Reader feedback handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::Utc;
use newsdesk_core::query;
use newsdesk_core::{Feedback, FeedbackCategory, FeedbackStatus, Paginated};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{list_request, ListParams, StatusUpdateRequest};
use crate::auth::middleware::IdentityContext;
use crate::error::{AppError, ErrorResponse};
use crate::response::{ApiPath, ApiResponse, ValidatedJson};
use crate::state::AppState;

const LABEL: &str = "Feedback";

/// Feedback submission
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FeedbackRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,

    /// 1 to 5
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,

    /// `general` (default), `bug`, `feature` or `content`
    pub category: Option<String>,

    #[validate(length(min = 10, max = 2000, message = "Message must be between 10 and 2000 characters"))]
    pub message: String,
}

/// Submit feedback; any session, guests included
#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    tag = "feedback",
    security(("bearer_auth" = [])),
    request_body = FeedbackRequest,
    responses(
        (status = 201, description = "Feedback recorded", body = Feedback),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    )
)]
pub async fn submit_feedback(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ValidatedJson(request): ValidatedJson<FeedbackRequest>,
) -> Result<ApiResponse<Feedback>, AppError> {
    let category = match request.category.as_deref() {
        None => FeedbackCategory::default(),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::field(
                "category",
                format!("Category must be one of: {}", FeedbackCategory::VALUES.join(", ")),
            )
        })?,
    };
    let now = Utc::now();

    let feedback = Feedback {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        email: request.email.trim().to_lowercase(),
        rating: request.rating,
        category,
        message: request.message,
        status: FeedbackStatus::Pending,
        submitted_by: (!identity.guest).then_some(identity.id),
        created_at: now,
        updated_at: now,
    };

    state.feedback().insert(&feedback).await?;
    tracing::info!(id = %feedback.id, rating = feedback.rating, guest = identity.guest, "Feedback submitted");

    Ok(ApiResponse::created(feedback).with_message("Thank you for your feedback"))
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback",
    tag = "feedback",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100"),
        ("sortBy" = Option<String>, Query, description = "Sort field"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("search" = Option<String>, Query, description = "Search name, email and message"),
        ("status" = Option<String>, Query, description = "pending, reviewed or resolved"),
        ("rating" = Option<u8>, Query, description = "Exact rating"),
    ),
    responses(
        (status = 200, description = "One page of feedback"),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_feedback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<Feedback>>, AppError> {
    let collection = state.feedback();
    let request = list_request(&state, collection.schema(), &params)?;
    Ok(ApiResponse::ok(query::list(&collection, &request).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/{id}",
    tag = "feedback",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Feedback id")),
    responses(
        (status = 200, description = "Feedback entry", body = Feedback),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn get_feedback(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Feedback>, AppError> {
    let feedback = state
        .feedback()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(LABEL.to_string()))?;
    Ok(ApiResponse::ok(feedback))
}

#[utoipa::path(
    patch,
    path = "/api/v1/feedback/{id}/status",
    tag = "feedback",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Feedback id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = Feedback),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_feedback_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<StatusUpdateRequest>,
) -> Result<ApiResponse<Feedback>, AppError> {
    let status: FeedbackStatus = request.parse(FeedbackStatus::VALUES)?;
    let feedback = state
        .feedback()
        .patch(id, json!({ "status": status, "updatedAt": Utc::now() }))
        .await?
        .ok_or_else(|| AppError::NotFound(LABEL.to_string()))?;

    Ok(ApiResponse::ok(feedback).with_message("Status updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/feedback/{id}",
    tag = "feedback",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Feedback id")),
    responses(
        (status = 200, description = "Feedback deleted"),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn delete_feedback(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    match state.feedback().delete_many(&[id]).await? {
        0 => Err(AppError::NotFound(LABEL.to_string())),
        _ => Ok(ApiResponse::message("Feedback deleted")),
    }
}
