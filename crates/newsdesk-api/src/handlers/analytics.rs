//! Analytics handlers
//!
//! Every report covers the last `days` days (default 30). Enumerated groupings
//! always list every variant, zero when nothing matched.

use std::sync::Arc;

use axum::extract::{Query, State};
use newsdesk_core::{
    AggregationRequest, Category, CollectionSchema, ContentStatus, Document, Feedback,
    FeedbackCategory, FeedbackStatus, Grouping, Metric, NewsArticle, Report, Role, TimeWindow,
    User, Video,
};
use newsdesk_core::models::MAX_RATING;
use serde::Serialize;
use utoipa::ToSchema;

use super::ListParams;
use crate::error::{AppError, ErrorResponse};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Window for the `days` parameter, kept as a raw string so that a
/// malformed value is reported against the field
fn window(state: &AppState, params: &ListParams) -> Result<TimeWindow, AppError> {
    let days = match params.get("days").map(|d| d.trim()) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| AppError::field("days", "days must be a positive whole number"))?,
        ),
    };
    Ok(TimeWindow::from_param(days, &state.config.analytics)?)
}

fn content_report(schema: &'static CollectionSchema, window: TimeWindow) -> AggregationRequest {
    AggregationRequest::new(schema, window)
        .metric(Metric::Count { name: "total" })
        .metric(Metric::Sum { name: "totalViews", field: "views" })
        .metric(Metric::Avg { name: "averageViews", field: "views" })
        .group(Grouping::new("byStatus", "status", ContentStatus::VALUES))
        .group(Grouping::new("byCategory", "category", Category::VALUES))
        .with_trend()
}

fn feedback_report(window: TimeWindow) -> AggregationRequest {
    AggregationRequest::new(Feedback::collection_schema(), window)
        .metric(Metric::Count { name: "total" })
        .metric(Metric::Avg { name: "averageRating", field: "rating" })
        .group(Grouping::rating_histogram("byRating", "rating", MAX_RATING))
        .group(Grouping::new("byStatus", "status", FeedbackStatus::VALUES))
        .group(Grouping::new("byCategory", "category", FeedbackCategory::VALUES))
        .with_trend()
}

fn users_report(window: TimeWindow) -> AggregationRequest {
    AggregationRequest::new(User::collection_schema(), window)
        .metric(Metric::Count { name: "total" })
        .group(Grouping::new("byRole", "role", Role::VALUES))
}

/// Headline numbers across every collection
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub days: u32,
    pub total_news: u64,
    pub published_news: u64,
    pub total_videos: u64,
    pub published_videos: u64,
    pub total_feedback: u64,
    pub pending_feedback: u64,
    pub average_rating: f64,
    pub new_users: u64,
    pub news: Report,
    pub videos: Report,
    pub feedback: Report,
}

fn group_count(report: &Report, group: &str, bucket: &str) -> u64 {
    report
        .groups
        .get(group)
        .and_then(|buckets| buckets.get(bucket))
        .copied()
        .unwrap_or(0)
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/dashboard",
    tag = "analytics",
    security(("bearer_auth" = [])),
    params(("days" = Option<u32>, Query, description = "Window size in days, 1 to 365")),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 400, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<DashboardSummary>, AppError> {
    let window = window(&state, &params)?;
    let reporter = state.reporter();

    let news_request = content_report(NewsArticle::collection_schema(), window);
    let videos_request = content_report(Video::collection_schema(), window);
    let feedback_request = feedback_report(window);
    let users_request = users_report(window);

    let (news, videos, feedback, users) = tokio::try_join!(
        reporter.aggregate(&news_request),
        reporter.aggregate(&videos_request),
        reporter.aggregate(&feedback_request),
        reporter.aggregate(&users_request),
    )?;

    let published = ContentStatus::Published.as_str();
    let summary = DashboardSummary {
        days: window.days,
        total_news: news.metric_u64("total"),
        published_news: group_count(&news, "byStatus", published),
        total_videos: videos.metric_u64("total"),
        published_videos: group_count(&videos, "byStatus", published),
        total_feedback: feedback.metric_u64("total"),
        pending_feedback: group_count(&feedback, "byStatus", FeedbackStatus::Pending.as_str()),
        average_rating: feedback
            .metrics
            .get("averageRating")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0),
        new_users: users.metric_u64("total"),
        news,
        videos,
        feedback,
    };

    Ok(ApiResponse::ok(summary))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/news",
    tag = "analytics",
    security(("bearer_auth" = [])),
    params(("days" = Option<u32>, Query, description = "Window size in days, 1 to 365")),
    responses(
        (status = 200, description = "News report", body = Report),
        (status = 400, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn news_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Report>, AppError> {
    let request = content_report(NewsArticle::collection_schema(), window(&state, &params)?);
    Ok(ApiResponse::ok(state.reporter().aggregate(&request).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/videos",
    tag = "analytics",
    security(("bearer_auth" = [])),
    params(("days" = Option<u32>, Query, description = "Window size in days, 1 to 365")),
    responses(
        (status = 200, description = "Video report", body = Report),
        (status = 400, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn videos_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Report>, AppError> {
    let request = content_report(Video::collection_schema(), window(&state, &params)?)
        .metric(Metric::Avg { name: "averageDuration", field: "durationSeconds" });
    Ok(ApiResponse::ok(state.reporter().aggregate(&request).await?))
}

/// Rating histogram (keys 1 to 5), status and category breakdowns
#[utoipa::path(
    get,
    path = "/api/v1/analytics/feedback",
    tag = "analytics",
    security(("bearer_auth" = [])),
    params(("days" = Option<u32>, Query, description = "Window size in days, 1 to 365")),
    responses(
        (status = 200, description = "Feedback report", body = Report),
        (status = 400, description = "Invalid window", body = ErrorResponse),
    )
)]
pub async fn feedback_analytics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Report>, AppError> {
    let request = feedback_report(window(&state, &params)?);
    Ok(ApiResponse::ok(state.reporter().aggregate(&request).await?))
}
