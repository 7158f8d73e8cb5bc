//! Administrator authentication.
//!
//! There is a single administrator whose email and argon2 password hash come
//! from configuration. A successful login yields an HS256 JWT; handlers that
//! need the administrator take an [`AdminUser`] argument.

use crate::{config::AppConfig, errors::ServiceError, AppState};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = "admin";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Administrator login is not configured")]
    NotConfigured,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::NotConfigured => ServiceError::Unauthorized(err.to_string()),
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(_) | AuthError::Hashing(_) => {
                ServiceError::InternalError(err.to_string())
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
    pub admin_email: Option<String>,
    pub admin_password_hash: Option<String>,
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            jwt_secret: cfg.jwt_secret.clone(),
            jwt_issuer: cfg.auth_issuer.clone(),
            token_expiration: Duration::from_secs(cfg.jwt_expiration as u64),
            admin_email: cfg.admin_email.clone(),
            admin_password_hash: cfg.admin_password_hash.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "admin@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: u64,
}

/// Produces an argon2id PHC string for `admin_password_hash`.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "Configured admin password hash is not a valid PHC string");
            false
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn login(&self, request: &LoginRequest) -> Result<TokenResponse, AuthError> {
        let (email, hash) = match (
            self.config.admin_email.as_deref(),
            self.config.admin_password_hash.as_deref(),
        ) {
            (Some(email), Some(hash)) => (email, hash),
            _ => return Err(AuthError::NotConfigured),
        };

        let email_matches = request.email.trim().eq_ignore_ascii_case(email.trim());
        if !email_matches || !verify_password(&request.password, hash) {
            warn!("Rejected administrator login");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.issue_token(email)?;
        info!("Administrator logged in");
        Ok(token)
    }

    pub fn issue_token(&self, subject: &str) -> Result<TokenResponse, AuthError> {
        let now = Utc::now().timestamp();
        let expires_in = self.config.token_expiration.as_secs();
        let claims = Claims {
            sub: subject.to_string(),
            role: ADMIN_ROLE.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + expires_in as i64,
            iss: self.config.jwt_issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }
}

/// The authenticated administrator.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
    pub token_id: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAuth)?;

        let claims = state.auth.validate_token(token)?;
        if claims.role != ADMIN_ROLE {
            return Err(AuthError::InsufficientPermissions.into());
        }

        Ok(AdminUser {
            email: claims.sub,
            token_id: claims.jti,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "q7Vn2Lr9Tx4Kb8Mz1Wc6Hs3Pd0Jf5Gy-wholesale-unit-test-secret-Ua7Ei2Oo9";

    fn service(hash: Option<String>) -> AuthService {
        AuthService::new(AuthConfig {
            jwt_secret: SECRET.into(),
            jwt_issuer: "wholesale-api".into(),
            token_expiration: Duration::from_secs(3600),
            admin_email: Some("admin@example.com".into()),
            admin_password_hash: hash,
        })
    }

    #[test]
    fn login_issues_verifiable_token() {
        let auth = service(Some(hash_password("s3cret-pass").unwrap()));
        let token = auth
            .login(&LoginRequest {
                email: "Admin@Example.com".into(),
                password: "s3cret-pass".into(),
            })
            .unwrap();

        let claims = auth.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, "admin@example.com");
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(token.expires_in, 3600);
    }

    #[test]
    fn wrong_password_rejected() {
        let auth = service(Some(hash_password("s3cret-pass").unwrap()));
        let result = auth.login(&LoginRequest {
            email: "admin@example.com".into(),
            password: "guess".into(),
        });
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[test]
    fn login_without_configured_admin_fails() {
        let auth = service(None);
        let result = auth.login(&LoginRequest {
            email: "admin@example.com".into(),
            password: "anything".into(),
        });
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[test]
    fn tampered_token_rejected() {
        let auth = service(None);
        let token = auth.issue_token("admin@example.com").unwrap().access_token;
        let tampered = format!("{}x", token);
        assert!(matches!(
            auth.validate_token(&tampered),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn token_from_other_issuer_rejected() {
        let other = AuthService::new(AuthConfig {
            jwt_issuer: "someone-else".into(),
            ..service(None).config
        });
        let token = other.issue_token("admin@example.com").unwrap().access_token;
        assert!(service(None).validate_token(&token).is_err());
    }
}
