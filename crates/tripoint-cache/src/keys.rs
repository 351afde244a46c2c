//! Cache key constants and builders
//!
//! Standardized key naming for all cached entities, preventing collisions
//! across the application.
//!
//! # Key Patterns
//!
//! - `zone:{postcode}` - Cached zone classification results
//! - `login_attempts:{ip}` - Login rate-limit counters
//!
//! # Example
//!
//! ```
//! use tripoint_cache::keys;
//!
//! let key = keys::zone_key("TN9 1PP");
//! assert_eq!(key, "zone:tn91pp");
//! ```

/// Prefix for cached zone classifications
///
/// Format: `zone:{normalized postcode}`
pub const ZONE_KEY_PREFIX: &str = "zone";

/// Prefix for login rate-limit counters
///
/// Format: `login_attempts:{client ip}`
pub const LOGIN_ATTEMPTS_PREFIX: &str = "login_attempts";

/// TTL for cached zone results (10 minutes)
///
/// Drive times drift with traffic; a short TTL keeps classifications fresh
/// while absorbing repeated lookups within one booking session.
pub const ZONE_TTL_SECS: u64 = 600;

/// Build a zone cache key from a raw postcode
///
/// Normalizes case and whitespace so `TN9 1PP` and `tn9 1pp` share an entry.
pub fn zone_key(postcode: &str) -> String {
    let normalized: String = postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    format!("{}:{}", ZONE_KEY_PREFIX, normalized)
}

/// Build a login rate-limit counter key for a client address
pub fn login_attempts_key(ip: &str) -> String {
    format!("{}:{}", LOGIN_ATTEMPTS_PREFIX, ip)
}
