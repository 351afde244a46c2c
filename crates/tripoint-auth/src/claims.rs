//! Admin session claims

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Claims encoded in an admin session token
///
/// The system has a single trusted-admin identity; the token carries no user
/// id, only the admin marker and validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject, always `admin`
    pub sub: String,

    /// Admin marker
    pub admin: bool,

    /// Issued-at (unix timestamp)
    pub iat: i64,

    /// Expiry (unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    /// Create fresh claims valid for `ttl_secs`
    pub fn new(ttl_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: "admin".to_string(),
            admin: true,
            iat: now,
            exp: now + ttl_secs,
        }
    }

    /// Whether the claims grant admin access
    pub fn is_admin(&self) -> bool {
        self.admin
    }
}
