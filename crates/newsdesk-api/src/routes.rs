//! API route definitions

use crate::auth::middleware::{auth_middleware, require_roles, STAFF_ROLES, SUPER_ADMIN_ROLES};
use crate::handlers::{analytics, auth, feedback, news, users, videos};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/guest", post(auth::guest_handler))
        .route("/public/news", get(news::list_public_news))
        .route("/public/videos", get(videos::list_public_videos));

    // Any valid token, guests included
    let session_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/change-password", post(auth::change_password_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/feedback", post(feedback::submit_feedback))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // admin and super_admin
    let admin_routes = Router::new()
        // News
        .route("/news", get(news::list_news).post(news::create_news))
        .route("/news/bulk-delete", post(news::bulk_delete_news))
        .route(
            "/news/:id",
            get(news::get_news)
                .put(news::update_news)
                .delete(news::delete_news),
        )
        .route("/news/:id/status", patch(news::update_news_status))
        // Videos
        .route("/videos", get(videos::list_videos).post(videos::create_video))
        .route("/videos/bulk-delete", post(videos::bulk_delete_videos))
        .route(
            "/videos/:id",
            get(videos::get_video)
                .put(videos::update_video)
                .delete(videos::delete_video),
        )
        .route("/videos/:id/status", patch(videos::update_video_status))
        // Feedback
        .route("/feedback", get(feedback::list_feedback))
        .route(
            "/feedback/:id",
            get(feedback::get_feedback).delete(feedback::delete_feedback),
        )
        .route("/feedback/:id/status", patch(feedback::update_feedback_status))
        // Analytics
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/news", get(analytics::news_analytics))
        .route("/analytics/videos", get(analytics::videos_analytics))
        .route("/analytics/feedback", get(analytics::feedback_analytics))
        .route_layer(middleware::from_fn(require_roles(STAFF_ROLES)))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // super_admin only
    let super_admin_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/status", patch(users::update_user_status))
        .route("/users/:id/role", patch(users::update_user_role))
        .route("/users/:id/unlock", post(users::unlock_user))
        .route_layer(middleware::from_fn(require_roles(SUPER_ADMIN_ROLES)))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .merge(super_admin_routes)
}
