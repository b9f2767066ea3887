//! JWT token issuance and verification
//!
//! Tokens are HS256-signed and self-contained: verification needs only the
//! secret (plus the logout denylist, checked by the middleware). Account
//! tokens carry the account id as subject; guest tokens carry a random
//! `guest-` subject and are never looked up in the store.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use newsdesk_core::config::{AuthConfig, MAX_DURATION_SECS};
use newsdesk_core::Role;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

const GUEST_PREFIX: &str = "guest-";

/// Who a token was issued to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Account,
    Guest,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Account UUID, or `guest-<uuid>` for guests
    pub sub: String,
    /// Unique token id, used for revocation
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub role: Role,
    pub kind: TokenKind,
}

impl Claims {
    /// Account id for account tokens
    pub fn account_id(&self) -> Option<Uuid> {
        match self.kind {
            TokenKind::Account => Uuid::parse_str(&self.sub).ok(),
            TokenKind::Guest => None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.kind == TokenKind::Guest
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.exp)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Token issuance and verification errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    /// Malformed, wrong key, tampered or wrong issuer
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signs and verifies tokens with one shared secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    expiration_secs: u64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            expiration_secs: config.token_expiration_secs.min(MAX_DURATION_SECS),
        }
    }

    /// Token lifetime in seconds
    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }

    /// Issue a token for an account
    pub fn issue(&self, account_id: Uuid, role: Role) -> Result<String, JwtError> {
        self.sign(account_id.to_string(), role, TokenKind::Account)
    }

    /// Issue a guest token with a fresh random subject
    pub fn issue_guest(&self) -> Result<String, JwtError> {
        self.sign(
            format!("{GUEST_PREFIX}{}", Uuid::new_v4()),
            Role::User,
            TokenKind::Guest,
        )
    }

    fn sign(&self, sub: String, role: Role, kind: TokenKind) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            iss: self.issuer.clone(),
            sub,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.expiration_secs,
            role,
            kind,
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify signature, issuer and expiry, and decode the claims
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                _ => JwtError::InvalidToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            ..Default::default()
        })
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn test_oversized_lifetime_is_clamped() {
        let codec = TokenCodec::new(&AuthConfig {
            token_expiration_secs: u64::MAX,
            ..Default::default()
        });
        assert_eq!(codec.expiration_secs(), MAX_DURATION_SECS);

        let token = codec.issue_guest().unwrap();
        let claims = codec.verify(&token).unwrap();
        assert!(claims.exp <= now() + MAX_DURATION_SECS);
    }

    #[test]
    fn test_issue_and_verify() {
        let codec = codec("secret");
        let account_id = Uuid::new_v4();

        let token = codec.issue(account_id, Role::Admin).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.account_id(), Some(account_id));
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.kind, TokenKind::Account);
        assert_eq!(claims.iss, "newsdesk-api");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_guest_token() {
        let codec = codec("secret");
        let claims = codec.verify(&codec.issue_guest().unwrap()).unwrap();

        assert!(claims.is_guest());
        assert!(claims.sub.starts_with(GUEST_PREFIX));
        assert_eq!(claims.account_id(), None);
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_malformed_token() {
        assert!(matches!(
            codec("secret").verify("invalid.token.here"),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let token = codec("secret1").issue(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(matches!(
            codec("secret2").verify(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_tampered_payload() {
        let codec = codec("secret");
        let token = codec.issue(Uuid::new_v4(), Role::User).unwrap();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        let first = parts[1].remove(0);
        parts[1].insert(0, if first == 'e' { 'f' } else { 'e' });
        let tampered = parts.join(".");

        assert!(matches!(codec.verify(&tampered), Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_issuer() {
        let other = TokenCodec::new(&AuthConfig {
            jwt_secret: "secret".to_string(),
            issuer: "someone-else".to_string(),
            ..Default::default()
        });
        let token = other.issue(Uuid::new_v4(), Role::Admin).unwrap();

        assert!(matches!(
            codec("secret").verify(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let codec = codec("secret");
        let now = now();

        let claims = Claims {
            iss: "newsdesk-api".to_string(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            role: Role::Admin,
            kind: TokenKind::Account,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &codec.encoding).unwrap();

        assert!(matches!(codec.verify(&token), Err(JwtError::ExpiredToken)));
    }

    #[test]
    fn test_unknown_role_is_invalid() {
        let codec = codec("secret");
        let now = now();
        let claims = serde_json::json!({
            "iss": "newsdesk-api",
            "sub": Uuid::new_v4().to_string(),
            "jti": "x",
            "iat": now,
            "exp": now + 60,
            "role": "root",
            "kind": "account",
        });
        let token = encode(&Header::new(Algorithm::HS256), &claims, &codec.encoding).unwrap();

        assert!(matches!(codec.verify(&token), Err(JwtError::InvalidToken)));
    }
}
