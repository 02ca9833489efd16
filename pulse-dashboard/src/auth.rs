//! Bearer-token authentication for the dashboard API.
//!
//! Tokens are HS256 JWTs issued by the account service; this module only
//! verifies them. The `sub` claim is the owning user id for baskets.

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::DashboardError;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Authentication state shared across requests.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: Arc<String>,
    pub audience: Option<Arc<String>>,
}

impl AuthState {
    pub fn new(jwt_secret: impl Into<String>, audience: Option<String>) -> Self {
        Self {
            jwt_secret: Arc::new(jwt_secret.into()),
            audience: audience.map(Arc::new),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud.as_str()]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Issue a token for a user. Used by tooling and tests.
    pub fn generate_token(&self, user_id: &str, ttl_secs: u64) -> Result<String> {
        let now = chrono::Utc::now().timestamp() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + ttl_secs as usize,
            iat: now,
            email: None,
            aud: self.audience.as_ref().map(|a| a.to_string()),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate a JWT token and return the claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &self.validation(),
        )?;

        Ok(token_data.claims)
    }
}

/// Authenticated caller, inserted as a request extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .map(str::to_string);

    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return DashboardError::Unauthorized("missing bearer token".into()).into_response();
    };

    match auth_state.validate_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser {
                user_id: claims.sub,
                email: claims.email,
            });
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected bearer token");
            DashboardError::Unauthorized("invalid or expired token".into()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-32-bytes-long!!!";

    #[test]
    fn test_token_roundtrip() {
        let auth = AuthState::new(SECRET, None);
        let token = auth.generate_token("user123", 3600).unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user123");
    }

    #[test]
    fn test_invalid_token() {
        let auth = AuthState::new(SECRET, None);
        assert!(auth.validate_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = AuthState::new(SECRET, None);
        let verifier = AuthState::new("another-secret-key-32-bytes-long!", None);
        let token = issuer.generate_token("user123", 3600).unwrap();
        assert!(verifier.validate_token(&token).is_err());
    }

    #[test]
    fn test_audience_checked_when_configured() {
        let issuer = AuthState::new(SECRET, Some("other-app".into()));
        let verifier = AuthState::new(SECRET, Some("pulse".into()));
        let token = issuer.generate_token("user123", 3600).unwrap();
        assert!(verifier.validate_token(&token).is_err());

        let token = verifier.generate_token("user123", 3600).unwrap();
        assert_eq!(verifier.validate_token(&token).unwrap().sub, "user123");
    }
}
