//! News article handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension,
};
use chrono::Utc;
use newsdesk_core::{NewsArticle, Paginated, Publishable};
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

const LABEL: &str = "News article";

/// Create or replace a news article
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsRequest {
    #[validate(length(min = 3, max = 200, message = "Title must be between 3 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 500, message = "Summary cannot exceed 500 characters"))]
    pub summary: Option<String>,

    #[validate(length(min = 10, message = "Content must be at least 10 characters"))]
    pub content: String,

    #[schema(example = "technology")]
    pub category: Option<String>,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 tags"))]
    pub tags: Vec<String>,

    #[validate(length(min = 1, max = 100, message = "Author is required"))]
    pub author: String,

    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,

    /// `draft` (default), `published` or `archived`
    pub status: Option<String>,

    #[serde(default)]
    pub featured: bool,
}

/// List news articles (admin view, all statuses)
#[utoipa::path(
    get,
    path = "/api/v1/news",
    tag = "news",
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
        (status = 200, description = "One page of articles"),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<NewsArticle>>, AppError> {
    Ok(ApiResponse::ok(content::list(&state, &params, false).await?))
}

/// Published news articles
#[utoipa::path(
    get,
    path = "/api/v1/public/news",
    tag = "public",
    responses(
        (status = 200, description = "One page of published articles"),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
    )
)]
pub async fn list_public_news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Paginated<NewsArticle>>, AppError> {
    Ok(ApiResponse::ok(content::list(&state, &params, true).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/news/{id}",
    tag = "news",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article", body = NewsArticle),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn get_news(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<NewsArticle>, AppError> {
    Ok(ApiResponse::ok(content::get(&state, id, LABEL).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/news",
    tag = "news",
    security(("bearer_auth" = [])),
    request_body = NewsRequest,
    responses(
        (status = 201, description = "Article created", body = NewsArticle),
        (status = 400, description = "Invalid input", body = ErrorResponse),
    )
)]
pub async fn create_news(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<IdentityContext>,
    ValidatedJson(request): ValidatedJson<NewsRequest>,
) -> Result<ApiResponse<NewsArticle>, AppError> {
    let status = content::initial_status(request.status.as_deref())?;
    let now = Utc::now();

    let mut article = NewsArticle {
        id: Uuid::new_v4(),
        title: request.title.trim().to_string(),
        summary: request.summary.unwrap_or_default(),
        content: request.content,
        category: content::parse_category(request.category.as_deref())?,
        tags: content::clean_tags(request.tags),
        author: request.author.trim().to_string(),
        image_url: request.image_url,
        status: Default::default(),
        featured: request.featured,
        views: 0,
        published_at: None,
        created_by: Some(identity.id),
        created_at: now,
        updated_at: now,
    };
    article.apply_status(status, now);

    content::insert(&state, &article).await?;
    tracing::info!(id = %article.id, status = %article.status, "News article created");

    Ok(ApiResponse::created(article).with_message("News article created"))
}

/// Replace the editable fields of an article
#[utoipa::path(
    put,
    path = "/api/v1/news/{id}",
    tag = "news",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = NewsRequest,
    responses(
        (status = 200, description = "Article updated", body = NewsArticle),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_news(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<NewsRequest>,
) -> Result<ApiResponse<NewsArticle>, AppError> {
    let mut article: NewsArticle = content::get(&state, id, LABEL).await?;
    let now = Utc::now();

    article.title = request.title.trim().to_string();
    article.summary = request.summary.unwrap_or_default();
    article.content = request.content;
    article.category = content::parse_category(request.category.as_deref())?;
    article.tags = content::clean_tags(request.tags);
    article.author = request.author.trim().to_string();
    article.image_url = request.image_url;
    article.featured = request.featured;
    match request.status.as_deref() {
        Some(raw) => article.apply_status(content::initial_status(Some(raw))?, now),
        None => article.updated_at = now,
    }

    content::save(&state, &article, LABEL).await?;
    Ok(ApiResponse::ok(article).with_message("News article updated"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/news/{id}/status",
    tag = "news",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status changed", body = NewsArticle),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn update_news_status(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
    ValidatedJson(request): ValidatedJson<StatusUpdateRequest>,
) -> Result<ApiResponse<NewsArticle>, AppError> {
    let article = content::set_status(&state, id, &request, LABEL).await?;
    Ok(ApiResponse::ok(article).with_message("Status updated"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/news/{id}",
    tag = "news",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article deleted"),
        (status = 404, description = "Not found", body = ErrorResponse),
    )
)]
pub async fn delete_news(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    content::delete::<NewsArticle>(&state, id, LABEL).await?;
    Ok(ApiResponse::message("News article deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/news/bulk-delete",
    tag = "news",
    security(("bearer_auth" = [])),
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Articles deleted", body = BulkDeleteResponse),
        (status = 400, description = "Invalid id list", body = ErrorResponse),
    )
)]
pub async fn bulk_delete_news(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BulkDeleteRequest>,
) -> Result<ApiResponse<BulkDeleteResponse>, AppError> {
    let deleted_count = content::bulk_delete::<NewsArticle>(&state, &request.ids).await?;
    Ok(ApiResponse::ok(BulkDeleteResponse { deleted_count })
        .with_message(format!("{deleted_count} news article(s) deleted")))
}
