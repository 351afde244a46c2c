//! Admin authentication for the TriPoint booking system
//!
//! The admin surface is a single trusted identity: a configured password
//! hash, signed session tokens, a cookie/bearer extractor, and a keyed
//! login rate limiter.

pub mod claims;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod session;

pub use claims::SessionClaims;
pub use middleware::{AdminSession, SESSION_COOKIE_NAME};
pub use password::PasswordService;
pub use rate_limit::{LoginRateLimiter, MemoryCounterStore};
pub use session::SessionService;
