//! Authentication and authorization
//!
//! - Token issuance and verification (HS256 JWT)
//! - Password hashing with Argon2id
//! - The failed-login lockout policy
//! - Logout revocation
//! - Account persistence and the login/registration service
//! - Middleware for request authentication and role checks

pub mod denylist;
pub mod jwt;
pub mod lockout;
pub mod middleware;
pub mod password;
pub mod repository;
pub mod service;

pub use denylist::TokenDenylist;
pub use jwt::{Claims, JwtError, TokenCodec, TokenKind};
pub use lockout::{LockState, LockoutCounters, LockoutPolicy};
pub use middleware::{
    auth_middleware, require_roles, IdentityContext, STAFF_ROLES, SUPER_ADMIN_ROLES,
};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use repository::CredentialStore;
pub use service::{AuthError, AuthService, AuthSession, GuestSession, Registration};
