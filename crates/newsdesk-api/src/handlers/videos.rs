//! Video handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::Utc;
use newsdesk_core::{Paginated, Publishable, Video};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::content;
use super::{BulkDeleteRequest, BulkDeleteResponse, ListParams, StatusUpdateRequest};
use crate::auth::middleware::IdentityContext;
use crate::error::{AppError, ErrorResponse};
use crate::response::{ApiPath, ApiResponse, ValidatedJson};
use crate::state::AppState;

const LABEL: &str = "Video";

/// Create or replace a video
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "Video URL must be a valid URL"))]
    pub url: String,

    #[validate(url(message = "Thumbnail URL must be a valid URL"))]
    pub thumbnail_url: Option<String>,

    #[schema(example = "sports")]
    pub category: Option<String>,

    /// Length in seconds
    #[serde(default)]
    #[validate(range(max = 86400, message = "Duration cannot exceed 24 hours"))]
    pub duration_seconds: u32,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 tags"))]
    pub tags: Vec<String>,

    /// `draft` (default), `published` or `archived`
    pub status: Option<String>,

    #[serde(default)]
    pub featured: bool,
}

/// List videos (admin view, all statuses)
#[utoipa::path(
    get,
    path = "/api/v1/videos",
    tag = "videos",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<u32>, Query, description = "Page number, from 1"),
        ("limit" = Option<u32>, Query, description = "Page size, at most 100"),
        ("sortBy" = Option<String>, Query, description = "Sort field"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("search" = Option<String>, Query, description = "Case-insensitive text search"),
        ("status" = Option<String>, Query, description = "draft, published or archived"),
        ("category" = Option<String>, Query, description = "Category filter"),
    ),
    responses(
        (status = 200, description = "One page of videos"),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<Video>>, AppError> {
    Ok(ApiResponse::ok(content::list(&state, &params, false).await?))
}

/// Published videos
#[utoipa::path(
    get,
    path = "/api/v1/public/videos",
    tag = "public",
    responses(
        (status = 200, description = "One page of published videos"),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_public_videos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<Video>>, AppError> {
    Ok(ApiResponse::ok(content::list(&state, &params, true).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{id}",
    tag = "videos",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video", body = Video),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<Video>, AppError> {
    Ok(ApiResponse::ok(content::get(&state, id, LABEL).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos",
    tag = "videos",
    security(("bearer_auth" = [])),
    request_body = VideoRequest,
    responses(
        (status = 201, description = "Video created", body = Video),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    )
)]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ValidatedJson(request): ValidatedJson<VideoRequest>,
) -> Result<ApiResponse<Video>, AppError> {
    let status = content::initial_status(request.status.as_deref())?;
    let now = Utc::now();

    let mut video = Video {
        id: Uuid::new_v4(),
        title: request.title.trim().to_string(),
        description: request.description.unwrap_or_default(),
        url: request.url,
        thumbnail_url: request.thumbnail_url,
        category: content::parse_category(request.category.as_deref())?,
        duration_seconds: request.duration_seconds,
        tags: content::clean_tags(request.tags),
        status: Default::default(),
        featured: request.featured,
        views: 0,
        published_at: None,
        created_by: Some(identity.id),
        created_at: now,
        updated_at: now,
    };
    video.apply_status(status, now);

    content::insert(&state, &video).await?;
    tracing::info!(id = %video.id, status = %video.status, "Video created");

    Ok(ApiResponse::created(video).with_message("Video created"))
}

/// Replace the editable fields of a video
#[utoipa::path(
    put,
    path = "/api/v1/videos/{id}",
    tag = "videos",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = VideoRequest,
    responses(
        (status = 200, description = "Video updated", body = Video),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_video(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<VideoRequest>,
) -> Result<ApiResponse<Video>, AppError> {
    let mut video: Video = content::get(&state, id, LABEL).await?;
    let now = Utc::now();

    video.title = request.title.trim().to_string();
    video.description = request.description.unwrap_or_default();
    video.url = request.url;
    video.thumbnail_url = request.thumbnail_url;
    video.category = content::parse_category(request.category.as_deref())?;
    video.duration_seconds = request.duration_seconds;
    video.tags = content::clean_tags(request.tags);
    video.featured = request.featured;
    match request.status.as_deref() {
        Some(raw) => video.apply_status(content::initial_status(Some(raw))?, now),
        None => video.updated_at = now,
    }

    content::save(&state, &video, LABEL).await?;
    Ok(ApiResponse::ok(video).with_message("Video updated"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/videos/{id}/status",
    tag = "videos",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Video id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = Video),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_video_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<StatusUpdateRequest>,
) -> Result<ApiResponse<Video>, AppError> {
    let video = content::set_status(&state, id, &request, LABEL).await?;
    Ok(ApiResponse::ok(video).with_message("Status updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{id}",
    tag = "videos",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video deleted"),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    content::delete::<Video>(&state, id, LABEL).await?;
    Ok(ApiResponse::message("Video deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/videos/bulk-delete",
    tag = "videos",
    security(("bearer_auth" = [])),
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Videos deleted", body = BulkDeleteResponse),
        (status = 400, description = "Invalid id list", body = ErrorResponse),
    )
)]
pub async fn bulk_delete_videos(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BulkDeleteRequest>,
) -> Result<ApiResponse<BulkDeleteResponse>, AppError> {
    let deleted_count = content::bulk_delete::<Video>(&state, &request.ids).await?;
    Ok(ApiResponse::ok(BulkDeleteResponse { deleted_count })
        .with_message(format!("{deleted_count} video(s) deleted")))
}
