//! Newsdesk Core - Domain models, storage and query primitives
//!
//! This crate defines the core abstractions used throughout Newsdesk:
//! - Account and content models (users, news, videos, feedback)
//! - The document store seam with PostgreSQL and in-memory backends
//! - The list/filter/paginate contract shared by every list endpoint
//! - The aggregation contract behind the analytics endpoints
//! - Configuration management

pub mod analytics;
pub mod config;
pub mod document;
pub mod models;
pub mod query;
pub mod store;

pub use analytics::{
    AggregationReporter, AggregationRequest, AnalyticsError, Grouping, Metric, Report, TimeWindow,
    TrendPoint,
};
pub use config::{AppConfig, ConfigError, Environment, StoreBackend};
pub use document::{CollectionSchema, Document, FilterField, FilterKind};
pub use models::{
    AccountStatus, Category, ContentStatus, Feedback, FeedbackCategory, FeedbackStatus,
    NewsArticle, Publishable, Role, User, UserProfile, Video,
};
pub use query::{Filter, ListRequest, Page, Paginated, QueryError, Sort, SortDirection};
pub use store::{
    Collection, DocumentStore, MemoryStore, NumericStats, PgDocumentStore, StoredDocument,
};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for Newsdesk operations
#[derive(Error, Debug)]
pub enum NewsdeskError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<QueryError> for NewsdeskError {
    fn from(err: QueryError) -> Self {
        NewsdeskError::ValidationError(err.to_string())
    }
}

impl From<AnalyticsError> for NewsdeskError {
    fn from(err: AnalyticsError) -> Self {
        NewsdeskError::ValidationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NewsdeskError>;
