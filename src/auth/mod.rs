//! Bearer-token authentication and the role/ownership gate.
//!
//! Token issuance belongs to the external auth service; this module
//! validates `Authorization: Bearer` JWTs signed with the shared secret
//! and exposes the [`AuthUser`] extractor consumed by every handler.
//! Minting lives here too so tests and tooling can produce valid tokens.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::user::UserRole;
use crate::errors::ServiceError;
use crate::AppState;

const TOKEN_ISSUER: &str = "glowcart-auth";

/// Claim structure shared with the external token issuer.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub role: UserRole,
    pub name: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Authenticated caller extracted from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Staff privileges; admins pass every staff gate.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Staff | UserRole::Admin)
    }

    pub fn is_customer(&self) -> bool {
        self.role == UserRole::Customer
    }

    pub fn require_staff(&self) -> Result<(), ServiceError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Staff privileges required".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator privileges required".to_string(),
            ))
        }
    }

    pub fn require_customer(&self) -> Result<(), ServiceError> {
        if self.is_customer() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Customer account required".to_string(),
            ))
        }
    }
}

/// Validates and mints tokens against the shared secret.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    expiration_secs: u64,
}

impl AuthService {
    pub fn new(secret: impl Into<String>, expiration_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expiration_secs,
        }
    }

    /// Mint a token for tooling and tests; production tokens come from
    /// the external issuer with the same claim layout.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        role: UserRole,
        name: Option<String>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            name,
            iat: now,
            exp: now + self.expiration_secs as i64,
            iss: TOKEN_ISSUER.to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {e}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {e}")))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".to_string()))?;

        Ok(AuthUser {
            user_id,
            role: data.claims.role,
            name: data.claims.name,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized("missing Authorization header".to_string())
            })?;

        let token = header_value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| ServiceError::Unauthorized("expected bearer token".to_string()))?;

        app.auth.validate_token(token)
    }
}

/// Argon2 hash for seeded accounts.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
    use argon2::Argon2;

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use argon2::Argon2;

    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}
