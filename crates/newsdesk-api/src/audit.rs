//! Security audit logging
//!
//! Authentication and account-administration events are logged at INFO
//! level on the `audit` target so they can be routed separately from
//! application logs, e.g. `RUST_LOG=audit=info`.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Request origin recorded with each event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        user_id: Uuid,
        email: String,
        client: ClientInfo,
    },

    LoginFailure {
        email: String,
        reason: String,
        failed_attempts: Option<u32>,
        client: ClientInfo,
    },

    /// The failure that crossed the lockout threshold
    AccountLocked {
        user_id: Uuid,
        email: String,
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        client: ClientInfo,
    },

    AccountUnlocked {
        user_id: Uuid,
        email: String,
        unlocked_by: Uuid,
    },

    GuestSession {
        guest_id: String,
        client: ClientInfo,
    },

    Logout {
        user_id: Uuid,
        email: String,
        client: ClientInfo,
    },

    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        role: String,
        client: ClientInfo,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        client: ClientInfo,
    },

    PasswordChange {
        user_id: Uuid,
        email: String,
        client: ClientInfo,
    },

    /// Role or status changed by a super admin
    AccountUpdated {
        user_id: Uuid,
        changed_by: Uuid,
        change: String,
    },

    AccessDenied {
        user_id: Option<Uuid>,
        resource: String,
        required_roles: String,
        client: ClientInfo,
    },

    InvalidToken {
        reason: String,
        client: ClientInfo,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::AccountLocked { .. } => "Account locked",
            AuditEvent::AccountUnlocked { .. } => "Account unlocked",
            AuditEvent::GuestSession { .. } => "Guest session issued",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::AccountUpdated { .. } => "Account updated",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }

    fn client(&self) -> Option<&ClientInfo> {
        match self {
            AuditEvent::LoginSuccess { client, .. }
            | AuditEvent::LoginFailure { client, .. }
            | AuditEvent::AccountLocked { client, .. }
            | AuditEvent::GuestSession { client, .. }
            | AuditEvent::Logout { client, .. }
            | AuditEvent::RegistrationSuccess { client, .. }
            | AuditEvent::RegistrationFailure { client, .. }
            | AuditEvent::PasswordChange { client, .. }
            | AuditEvent::AccessDenied { client, .. }
            | AuditEvent::InvalidToken { client, .. } => Some(client),
            AuditEvent::AccountUnlocked { .. } | AuditEvent::AccountUpdated { .. } => None,
        }
    }
}

/// Log a security audit event with structured fields
///
/// The whole event is attached as JSON in the `event` field; the client
/// address is repeated as its own field for filtering.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let ip_address = event.client().and_then(|c| c.ip_address.as_deref());

    match event {
        AuditEvent::LoginFailure {
            email,
            reason,
            failed_attempts,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                failed_attempts = ?failed_attempts,
                ip_address = ?ip_address,
                "{}",
                event.summary()
            );
        }
        AuditEvent::AccountLocked {
            user_id,
            email,
            locked_until,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                locked_until = %locked_until,
                ip_address = ?ip_address,
                "{}",
                event.summary()
            );
        }
        _ => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = ?ip_address,
                "{}",
                event.summary()
            );
        }
    }
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
