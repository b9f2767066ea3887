//! Newsdesk API - REST server for the news and video admin backend
//!
//! Provides account authentication, content management for news and
//! videos, reader feedback, account administration and analytics.

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::handlers::{analytics, auth as auth_handlers, feedback, health, news, users, videos};
use crate::state::AppState;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(title = "Newsdesk API", description = "News and video admin backend"),
    paths(
        health::health_check,
        health::readiness_check,
        auth_handlers::register_handler,
        auth_handlers::login_handler,
        auth_handlers::guest_handler,
        auth_handlers::me_handler,
        auth_handlers::change_password_handler,
        auth_handlers::logout_handler,
        news::list_news,
        news::list_public_news,
        news::get_news,
        news::create_news,
        news::update_news,
        news::update_news_status,
        news::delete_news,
        news::bulk_delete_news,
        videos::list_videos,
        videos::list_public_videos,
        videos::get_video,
        videos::create_video,
        videos::update_video,
        videos::update_video_status,
        videos::delete_video,
        videos::bulk_delete_videos,
        feedback::submit_feedback,
        feedback::list_feedback,
        feedback::get_feedback,
        feedback::update_feedback_status,
        feedback::delete_feedback,
        users::list_users,
        users::get_user,
        users::update_user_status,
        users::update_user_role,
        users::unlock_user,
        analytics::dashboard,
        analytics::news_analytics,
        analytics::videos_analytics,
        analytics::feedback_analytics,
    ),
    components(schemas(
        error::ErrorResponse,
        error::FieldError,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        auth::AuthSession,
        auth::GuestSession,
        auth_handlers::RegisterRequest,
        auth_handlers::LoginRequest,
        auth_handlers::ChangePasswordRequest,
        auth_handlers::MeResponse,
        auth_handlers::MeUser,
        handlers::BulkDeleteRequest,
        handlers::BulkDeleteResponse,
        handlers::StatusUpdateRequest,
        news::NewsRequest,
        videos::VideoRequest,
        feedback::FeedbackRequest,
        users::RoleUpdateRequest,
        analytics::DashboardSummary,
        newsdesk_core::UserProfile,
        newsdesk_core::Role,
        newsdesk_core::AccountStatus,
        newsdesk_core::NewsArticle,
        newsdesk_core::Video,
        newsdesk_core::Feedback,
        newsdesk_core::ContentStatus,
        newsdesk_core::Category,
        newsdesk_core::FeedbackCategory,
        newsdesk_core::FeedbackStatus,
        newsdesk_core::Report,
        newsdesk_core::TrendPoint,
        newsdesk_core::analytics::WindowSummary,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Registration, login and sessions"),
        (name = "public", description = "Published content"),
        (name = "news", description = "News administration"),
        (name = "videos", description = "Video administration"),
        (name = "feedback", description = "Reader feedback"),
        (name = "users", description = "Account administration"),
        (name = "analytics", description = "Reports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn count_requests(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.increment_requests();
    next.run(request).await
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .fallback(error::route_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::expose_error_details,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// In-memory state with cheap password hashing
#[cfg(any(test, feature = "test-utils"))]
pub fn test_state() -> Arc<AppState> {
    use newsdesk_core::{AppConfig, Environment, MemoryStore};

    let config = AppConfig {
        environment: Environment::Test,
        ..Default::default()
    };
    let passwords = auth::PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };

    Arc::new(AppState::with_password_config(
        config,
        Arc::new(MemoryStore::new()),
        passwords,
    ))
}

/// Router and the state behind it, for tests that seed data directly
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_test_app().0
}
