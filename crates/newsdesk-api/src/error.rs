//! API error handling
//!
//! Every failure leaving a handler is an [`AppError`]; this is the single
//! place where errors are classified into status codes and rendered into
//! the response envelope.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use newsdesk_core::{analytics::AnalyticsError, NewsdeskError, QueryError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// A validation failure on one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    #[schema(example = "email")]
    pub field: String,
    #[schema(example = "must be a valid email address")]
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Human-readable message
    pub message: String,
    /// Per-field validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    /// Underlying error, outside production only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
            details: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    /// Missing, invalid, expired or revoked credentials; never says which
    Unauthorized,
    Forbidden(String),
    AccountInactive,
    AccountLocked { until: DateTime<Utc> },
    NotFound(String),
    Conflict(String),
    Internal(String),
    Database(String),
}

impl AppError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::AccountInactive => StatusCode::FORBIDDEN,
            AppError::AccountLocked { .. } => StatusCode::LOCKED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Minutes until `until`, rounded up, at least 1
fn retry_minutes(until: DateTime<Utc>) -> i64 {
    let secs = (until - Utc::now()).num_seconds().max(0);
    ((secs + 59) / 60).max(1)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut details = None;
        let body = match self {
            AppError::Validation(errors) => {
                ErrorResponse::new("Validation failed").with_errors(errors)
            }
            AppError::BadRequest(msg) => ErrorResponse::new(msg),
            AppError::Unauthorized => ErrorResponse::new("Not authorized"),
            AppError::Forbidden(msg) => ErrorResponse::new(msg),
            AppError::AccountInactive => ErrorResponse::new("Account is not active"),
            AppError::AccountLocked { until } => ErrorResponse::new(format!(
                "Account is locked due to too many failed login attempts. Try again in {} minute(s)",
                retry_minutes(until)
            )),
            AppError::NotFound(resource) => ErrorResponse::new(format!("{resource} not found")),
            AppError::Conflict(msg) => ErrorResponse::new(msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                details = Some(msg);
                ErrorResponse::new("Internal server error")
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                details = Some(msg);
                ErrorResponse::new("Database operation failed")
            }
        };

        let mut response = (status, Json(&body)).into_response();
        if let Some(details) = details {
            response
                .extensions_mut()
                .insert(ErrorDetails(body.with_details(details)));
        }
        response
    }
}

/// The full body of a 500 response, underlying error included
#[derive(Debug, Clone)]
pub struct ErrorDetails(pub ErrorResponse);

/// Re-renders 500 bodies with their details when the state allows it
pub async fn expose_error_details(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let details = response.extensions_mut().remove::<ErrorDetails>();
    match details {
        Some(ErrorDetails(body)) if state.expose_internal_errors => {
            (response.status(), Json(body)).into_response()
        }
        _ => response,
    }
}

/// Unmatched routes
pub async fn route_not_found() -> AppError {
    AppError::NotFound("Route".to_string())
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<NewsdeskError> for AppError {
    fn from(err: NewsdeskError) -> Self {
        match err {
            NewsdeskError::NotFound(msg) => AppError::NotFound(msg),
            NewsdeskError::Conflict(msg) => AppError::Conflict(msg),
            NewsdeskError::ValidationError(msg) => AppError::BadRequest(msg),
            NewsdeskError::DatabaseError(msg) => AppError::Database(msg),
            NewsdeskError::SerializationError(e) => {
                AppError::Internal(format!("Serialization error: {e}"))
            }
            NewsdeskError::ConfigError(msg) => {
                AppError::Internal(format!("Configuration error: {msg}"))
            }
            NewsdeskError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        AppError::field(err.param(), err.to_string())
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        AppError::field("days", err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid"));
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PasswordConfig;
    use axum::{body::Body, middleware, routing::get, Router};
    use newsdesk_core::{AppConfig, Environment, MemoryStore};
    use tower::ServiceExt;

    async fn internal_failure() -> Result<(), AppError> {
        Err(AppError::Internal("pool timed out".to_string()))
    }

    fn state_for(environment: Environment) -> Arc<AppState> {
        let config = AppConfig {
            environment,
            ..Default::default()
        };
        let passwords = PasswordConfig {
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

    async fn failure_body(state: Arc<AppState>) -> serde_json::Value {
        let app = Router::new()
            .route("/fail", get(internal_failure))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                expose_error_details,
            ))
            .with_state(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/fail")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_details_follow_each_router_state() {
        let production = state_for(Environment::Production);
        let development = state_for(Environment::Development);

        // Both routers live in one process; neither affects the other
        let shown = failure_body(development).await;
        let hidden = failure_body(production).await;

        assert_eq!(hidden["success"], false);
        assert_eq!(hidden["message"], "Internal server error");
        assert!(hidden.get("details").is_none());
        assert_eq!(shown["details"], "pool timed out");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccountInactive.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::AccountLocked { until: Utc::now() }.status(),
            StatusCode::LOCKED
        );
        assert_eq!(
            AppError::Conflict("dup".to_string()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(NewsdeskError::NotFound("News".to_string())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_query_error_names_parameter() {
        match AppError::from(QueryError::UnknownSortField("secret".to_string())) {
            AppError::Validation(errors) => assert_eq!(errors[0].field, "sortBy"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_retry_minutes_rounds_up() {
        let until = Utc::now() + chrono::Duration::seconds(150);
        assert_eq!(retry_minutes(until), 3);
        assert_eq!(retry_minutes(Utc::now() - chrono::Duration::hours(1)), 1);
    }
}
