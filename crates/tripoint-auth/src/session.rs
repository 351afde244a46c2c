//! Admin session token creation and validation
//!
//! Signed session tokens using the jsonwebtoken crate. A valid token is the
//! opaque trusted-admin check: it either verifies or it does not.

use crate::claims::SessionClaims;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, warn};
use tripoint_core::error::AppError;

/// Session service for admin token lifecycle
#[derive(Clone)]
pub struct SessionService {
    /// Session lifetime in seconds
    ttl_secs: i64,

    /// Encoding key (cached)
    encoding_key: EncodingKey,

    /// Decoding key (cached)
    decoding_key: DecodingKey,
}

impl SessionService {
    /// Create a new session service
    ///
    /// # Arguments
    ///
    /// * `secret` - The secret key used to sign tokens
    /// * `ttl_secs` - Session lifetime in seconds
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Session lifetime in seconds
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Create a signed admin session token
    pub fn create_session(&self) -> Result<String, AppError> {
        let claims = SessionClaims::new(self.ttl_secs);
        debug!(exp = claims.exp, "Creating admin session token");

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            warn!("Failed to create session token: {}", e);
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    /// Verify a session token and return its claims
    ///
    /// # Errors
    ///
    /// - `AppError::SessionExpired` for expired tokens
    /// - `AppError::InvalidToken` for anything else that fails verification
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AppError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::SessionExpired,
                _ => {
                    debug!("Session token rejected: {}", e);
                    AppError::InvalidToken(e.to_string())
                }
            })?;

        if !data.claims.is_admin() {
            return Err(AppError::InvalidToken("not an admin session".to_string()));
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify() {
        let service = SessionService::new("test-secret", 3600);
        let token = service.create_session().unwrap();
        let claims = service.verify_session(&token).unwrap();
        assert!(claims.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = SessionService::new("test-secret", 3600);
        let other = SessionService::new("other-secret", 3600);
        let token = service.create_session().unwrap();
        assert!(matches!(
            other.verify_session(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = SessionService::new("test-secret", 3600);
        assert!(service.verify_session("not-a-token").is_err());
    }
}
