//! Actix-web admin session extractor
//!
//! Guards admin endpoints: extraction fails with 401 unless the request
//! carries a valid admin session token.

use crate::claims::SessionClaims;
use crate::session::SessionService;
use actix_web::{dev::Payload, error::ErrorUnauthorized, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use std::sync::Arc;
use tracing::debug;

/// Name of the admin session cookie
pub const SESSION_COOKIE_NAME: &str = "tripoint_admin_session";

/// Extract the session token from a request
///
/// Checks, in order:
/// 1. The admin session cookie
/// 2. Authorization header (Bearer token)
fn extract_token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        return Some(cookie.value().to_string());
    }

    if let Some(auth_header) = req.headers().get("Authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Authenticated admin session extractor
///
/// # Examples
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use tripoint_auth::AdminSession;
///
/// async fn protected_handler(_admin: AdminSession) -> HttpResponse {
///     HttpResponse::Ok().finish()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AdminSession {
    /// Verified session claims
    pub claims: SessionClaims,
}

impl FromRequest for AdminSession {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session_service = match req.app_data::<web::Data<Arc<SessionService>>>() {
            Some(service) => service,
            None => {
                return ready(Err(ErrorUnauthorized("Session service not configured")));
            }
        };

        let token = match extract_token_from_request(req) {
            Some(token) => token,
            None => {
                debug!("Admin request without session token");
                return ready(Err(ErrorUnauthorized("Not authenticated")));
            }
        };

        match session_service.verify_session(&token) {
            Ok(claims) => ready(Ok(AdminSession { claims })),
            Err(e) => {
                debug!("Admin session rejected: {}", e);
                ready(Err(ErrorUnauthorized("Not authenticated")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_extract_token_from_cookie() {
        let req = TestRequest::default()
            .cookie(actix_web::cookie::Cookie::new(SESSION_COOKIE_NAME, "tok"))
            .to_http_request();
        assert_eq!(extract_token_from_request(&req), Some("tok".to_string()));
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer tok2"))
            .to_http_request();
        assert_eq!(extract_token_from_request(&req), Some("tok2".to_string()));
    }

    #[test]
    fn test_extract_token_missing() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(extract_token_from_request(&req), None);
    }
}
