//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use newsdesk_core::config::AppConfig;
use newsdesk_core::{
    AggregationReporter, Collection, DocumentStore, Feedback, NewsArticle, Video,
};

use crate::auth::denylist::TokenDenylist;
use crate::auth::jwt::TokenCodec;
use crate::auth::lockout::LockoutPolicy;
use crate::auth::password::PasswordConfig;
use crate::auth::repository::CredentialStore;
use crate::auth::service::AuthService;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Document store backing every collection
    pub store: Arc<dyn DocumentStore>,
    /// Login, registration and token issuance
    pub auth: AuthService,
    /// Tokens revoked by logout
    pub denylist: TokenDenylist,
    /// Whether 500 responses carry the underlying error text
    pub expose_internal_errors: bool,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        let passwords = PasswordConfig::from(&config.auth);
        Self::with_password_config(config, store, passwords)
    }

    /// State with explicit Argon2 costs, for tests and tooling
    pub fn with_password_config(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        passwords: PasswordConfig,
    ) -> Self {
        let auth = AuthService::new(
            CredentialStore::new(Arc::clone(&store)),
            TokenCodec::new(&config.auth),
            LockoutPolicy::from(&config.auth),
            passwords,
        );

        Self {
            expose_internal_errors: !config.environment.is_production(),
            config,
            store,
            auth,
            denylist: TokenDenylist::new(),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        }
    }

    pub fn news(&self) -> Collection<NewsArticle> {
        Collection::new(Arc::clone(&self.store))
    }

    pub fn videos(&self) -> Collection<Video> {
        Collection::new(Arc::clone(&self.store))
    }

    pub fn feedback(&self) -> Collection<Feedback> {
        Collection::new(Arc::clone(&self.store))
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.auth.credentials()
    }

    pub fn reporter(&self) -> AggregationReporter {
        AggregationReporter::new(Arc::clone(&self.store))
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
