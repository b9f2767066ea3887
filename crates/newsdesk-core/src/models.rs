//! Account and content models
//!
//! These are the documents persisted in the store. All of them serialize
//! with camelCase keys, which are also the field names used by filters,
//! sorting and aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::document::{CollectionSchema, Document, FilterField, FilterKind};

/// Error returned when a string does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Defines `as_str`, `VALUES`, `Display` and `FromStr` for a unit-only enum
/// whose serde representation is the same string.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Every accepted string value, in declaration order
            pub const VALUES: &'static [&'static str] = &[$($name),+];

            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

// ============================================================================
// Accounts
// ============================================================================

/// Account role
///
/// Closed set; every permission check matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

string_enum!(Role, "role", {
    User => "user",
    Admin => "admin",
    SuperAdmin => "super_admin",
});

impl Role {
    /// Whether this role may sign in to the administrative backend
    pub fn is_staff(&self) -> bool {
        match self {
            Role::Admin | Role::SuperAdmin => true,
            Role::User => false,
        }
    }
}

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

string_enum!(AccountStatus, "account status", {
    Active => "active",
    Inactive => "inactive",
    Suspended => "suspended",
});

impl AccountStatus {
    pub fn can_authenticate(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// Stored account document
///
/// Holds the password hash, so it is never returned from an endpoint;
/// responses use [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lower-cased, unique
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub email_verified: bool,
    /// Consecutive failed logins
    #[serde(default)]
    pub failed_login_attempts: u32,
    /// Account locked until this time
    #[serde(default)]
    pub lock_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email: normalize_email(email),
            password_hash,
            phone: None,
            role,
            status: AccountStatus::Active,
            email_verified: false,
            failed_login_attempts: 0,
            lock_until: None,
            last_login: None,
            password_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Locked iff `lock_until` is set and still in the future
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked_at(Utc::now())
    }

    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            status: self.status,
            email_verified: self.email_verified,
            is_locked: self.is_locked(),
            lock_until: self.lock_until,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

/// Emails are compared case-insensitively by storing them lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Public account representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub email_verified: bool,
    pub is_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

static USER_SCHEMA: CollectionSchema = CollectionSchema {
    name: "users",
    filterable: &[
        FilterField::new("role", FilterKind::Enum(Role::VALUES)),
        FilterField::new("status", FilterKind::Enum(AccountStatus::VALUES)),
        FilterField::new("emailVerified", FilterKind::Bool),
    ],
    search_fields: &["name", "email"],
    sortable: &["createdAt", "updatedAt", "name", "email", "role", "lastLogin"],
    unique: &["email"],
};

impl Document for User {
    fn collection_schema() -> &'static CollectionSchema {
        &USER_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================================================
// Content
// ============================================================================

/// Editorial status shared by news articles and videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

string_enum!(ContentStatus, "content status", {
    Draft => "draft",
    Published => "published",
    Archived => "archived",
});

impl ContentStatus {
    /// Only published items appear in public views
    pub fn is_public(&self) -> bool {
        matches!(self, ContentStatus::Published)
    }
}

/// Editorial category for news and videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Politics,
    Business,
    Technology,
    Sports,
    Entertainment,
    Health,
    Science,
}

string_enum!(Category, "category", {
    General => "general",
    Politics => "politics",
    Business => "business",
    Technology => "technology",
    Sports => "sports",
    Entertainment => "entertainment",
    Health => "health",
    Science => "science",
});

/// Content with an editorial status
pub trait Publishable: Document {
    fn status(&self) -> ContentStatus;

    /// Move to `status`, stamping the publication time on first publish
    fn apply_status(&mut self, status: ContentStatus, now: DateTime<Utc>);
}

/// News article document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub content: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

static NEWS_SCHEMA: CollectionSchema = CollectionSchema {
    name: "news",
    filterable: &[
        FilterField::new("status", FilterKind::Enum(ContentStatus::VALUES)),
        FilterField::new("category", FilterKind::Enum(Category::VALUES)),
        FilterField::new("featured", FilterKind::Bool),
        FilterField::new("author", FilterKind::Text),
    ],
    search_fields: &["title", "summary", "content", "tags"],
    sortable: &[
        "createdAt",
        "updatedAt",
        "publishedAt",
        "title",
        "views",
        "category",
        "status",
    ],
    unique: &[],
};

impl Document for NewsArticle {
    fn collection_schema() -> &'static CollectionSchema {
        &NEWS_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Publishable for NewsArticle {
    fn status(&self) -> ContentStatus {
        self.status
    }

    fn apply_status(&mut self, status: ContentStatus, now: DateTime<Utc>) {
        if status.is_public() && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }
}

/// Video document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

static VIDEO_SCHEMA: CollectionSchema = CollectionSchema {
    name: "videos",
    filterable: &[
        FilterField::new("status", FilterKind::Enum(ContentStatus::VALUES)),
        FilterField::new("category", FilterKind::Enum(Category::VALUES)),
        FilterField::new("featured", FilterKind::Bool),
    ],
    search_fields: &["title", "description", "tags"],
    sortable: &[
        "createdAt",
        "updatedAt",
        "publishedAt",
        "title",
        "views",
        "durationSeconds",
        "category",
        "status",
    ],
    unique: &[],
};

impl Document for Video {
    fn collection_schema() -> &'static CollectionSchema {
        &VIDEO_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Publishable for Video {
    fn status(&self) -> ContentStatus {
        self.status
    }

    fn apply_status(&mut self, status: ContentStatus, now: DateTime<Utc>) {
        if status.is_public() && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }
}

// ============================================================================
// Feedback
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    #[default]
    General,
    Bug,
    Feature,
    Content,
}

string_enum!(FeedbackCategory, "feedback category", {
    General => "general",
    Bug => "bug",
    Feature => "feature",
    Content => "content",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
}

string_enum!(FeedbackStatus, "feedback status", {
    Pending => "pending",
    Reviewed => "reviewed",
    Resolved => "resolved",
});

/// Highest accepted feedback rating; ratings run from 1 to this value
pub const MAX_RATING: u8 = 5;

/// Reader feedback document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// 1 to 5
    pub rating: u8,
    #[serde(default)]
    pub category: FeedbackCategory,
    pub message: String,
    #[serde(default)]
    pub status: FeedbackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

static FEEDBACK_SCHEMA: CollectionSchema = CollectionSchema {
    name: "feedback",
    filterable: &[
        FilterField::new("status", FilterKind::Enum(FeedbackStatus::VALUES)),
        FilterField::new("category", FilterKind::Enum(FeedbackCategory::VALUES)),
        FilterField::new("rating", FilterKind::Integer),
    ],
    search_fields: &["name", "email", "message"],
    sortable: &["createdAt", "updatedAt", "rating", "status", "category"],
    unique: &[],
};

impl Document for Feedback {
    fn collection_schema() -> &'static CollectionSchema {
        &FEEDBACK_SCHEMA
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_conversion() {
        assert_eq!(Role::SuperAdmin.as_str(), "super_admin");
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert!("superadmin".parse::<Role>().is_err());
        assert_eq!(
            serde_json::to_value(Role::SuperAdmin).unwrap(),
            serde_json::json!("super_admin")
        );
    }

    #[test]
    fn test_role_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::SuperAdmin.is_staff());
        assert!(!Role::User.is_staff());
    }

    #[test]
    fn test_user_creation_normalizes_email() {
        let user = User::new(
            "Alice".to_string(),
            "  Alice@Example.COM ",
            "hash".to_string(),
            Role::Admin,
        );

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.status, AccountStatus::Active);
        assert_eq!(user.failed_login_attempts, 0);
        assert!(!user.is_locked());
    }

    #[test]
    fn test_user_is_locked() {
        let mut user = User::new("T".to_string(), "t@example.com", "h".to_string(), Role::User);
        let now = Utc::now();

        user.lock_until = Some(now + Duration::hours(1));
        assert!(user.is_locked_at(now));

        user.lock_until = Some(now - Duration::seconds(1));
        assert!(!user.is_locked_at(now));
    }

    #[test]
    fn test_profile_never_contains_password_hash() {
        let user = User::new(
            "Test".to_string(),
            "test@example.com",
            "$argon2id$secret".to_string(),
            Role::Admin,
        );

        let json = serde_json::to_string(&user.to_profile()).unwrap();
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("argon2"));

        // The stored document does keep it
        let stored = serde_json::to_value(&user).unwrap();
        assert!(stored["passwordHash"].is_string());
        assert!(stored["lockUntil"].is_null());
    }

    #[test]
    fn test_apply_status_stamps_publication_once() {
        let now = Utc::now();
        let mut article = NewsArticle {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            summary: String::new(),
            content: "c".to_string(),
            category: Category::General,
            tags: vec![],
            author: "a".to_string(),
            image_url: None,
            status: ContentStatus::Draft,
            featured: false,
            views: 0,
            published_at: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };

        article.apply_status(ContentStatus::Published, now);
        assert_eq!(article.published_at, Some(now));

        let later = now + Duration::minutes(5);
        article.apply_status(ContentStatus::Archived, later);
        article.apply_status(ContentStatus::Published, later);
        assert_eq!(article.published_at, Some(now));
        assert_eq!(article.updated_at, later);
    }

    #[test]
    fn test_schema_values_match_serde() {
        for status in ContentStatus::ALL {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        for category in FeedbackCategory::ALL {
            assert_eq!(
                serde_json::to_value(category).unwrap(),
                serde_json::json!(category.as_str())
            );
        }
        assert!(NewsArticle::collection_schema().is_sortable("views"));
        assert!(!NewsArticle::collection_schema().is_sortable("passwordHash"));
    }

    #[test]
    fn test_collection_schema_beside_openapi_schema() {
        let (name, _) = NewsArticle::schema();
        assert_eq!(name, "NewsArticle");
        assert_eq!(NewsArticle::collection_schema().name, "news");
        assert_eq!(Video::collection_schema().name, "videos");
        assert_eq!(Feedback::collection_schema().name, "feedback");
        assert_eq!(User::collection_schema().name, "users");
    }
}
