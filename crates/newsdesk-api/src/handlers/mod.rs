//! API handlers
//!
//! Every handler follows the same shape: validate the input, make one or two
//! store calls, wrap the result in [`crate::response::ApiResponse`].

pub mod analytics;
pub mod auth;
pub mod content;
pub mod feedback;
pub mod health;
pub mod news;
pub mod users;
pub mod videos;

use std::collections::HashMap;

use newsdesk_core::query::ListRequest;
use newsdesk_core::CollectionSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::state::AppState;

/// Raw list query string, validated per collection by [`list_request`]
pub type ListParams = HashMap<String, String>;

pub(crate) fn list_request(
    state: &AppState,
    schema: &CollectionSchema,
    params: &ListParams,
) -> Result<ListRequest, AppError> {
    Ok(ListRequest::from_params(schema, params, &state.config.query)?)
}

/// Body of the bulk-delete endpoints
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 100, message = "Provide between 1 and 100 ids"))]
    pub ids: Vec<Uuid>,
}

/// Result of a bulk delete
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    pub deleted_count: u64,
}

/// Body of the status-change endpoints
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StatusUpdateRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    #[schema(example = "published")]
    pub status: String,
}

impl StatusUpdateRequest {
    /// Parse into the collection's status enum, naming the allowed values on failure
    pub(crate) fn parse<S: std::str::FromStr>(&self, allowed: &[&str]) -> Result<S, AppError> {
        self.status.parse().map_err(|_| {
            AppError::field(
                "status",
                format!("Status must be one of: {}", allowed.join(", ")),
            )
        })
    }
}
