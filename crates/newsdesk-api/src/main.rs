//! Newsdesk API Server
//!
//! REST API server for the Newsdesk admin backend.

use newsdesk_api::{
    auth::PasswordConfig, bootstrap::ensure_default_admin, create_router, state::AppState,
};
use newsdesk_core::config::{AppConfig, LoggingConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// `NEWSDESK_CONFIG` names an optional TOML file; the environment overrides it
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("NEWSDESK_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    let store = newsdesk_core::store::open(&config.database).await?;
    let state = Arc::new(AppState::new(config, store));

    ensure_default_admin(
        state.credentials(),
        &state.config.bootstrap,
        PasswordConfig::from(&state.config.auth),
    )
    .await?;

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        environment = ?state.config.environment,
        "Newsdesk API Server starting on http://{}",
        addr
    );
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
