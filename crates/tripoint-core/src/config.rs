//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub booking: BookingConfig,
    pub routing: RoutingConfig,
    pub calendar: CalendarConfig,
    pub payments: PaymentsConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Default TTL for cached items in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,
}

fn default_pool_size() -> u32 {
    5
}

fn default_cache_ttl() -> u64 {
    300
}

/// Admin authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Argon2 hash of the admin password (PHC string)
    pub admin_password_hash: String,

    /// Secret for signing admin session tokens
    pub session_secret: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,

    /// Maximum login attempts per window
    #[serde(default = "default_login_max_attempts")]
    pub login_max_attempts: i64,

    /// Login rate-limit window in seconds
    #[serde(default = "default_login_window")]
    pub login_window_secs: u64,
}

fn default_session_ttl() -> i64 {
    604_800 // 7 days
}

fn default_login_max_attempts() -> i64 {
    5
}

fn default_login_window() -> u64 {
    60
}

/// Booking business configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// IANA timezone of the business (slot grid, pricing hours)
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Public site URL used to build payment links
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Minutes an unpaid reservation holds its slot before expiry
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_minutes: i64,

    /// Internal notification address for manual-review and new-booking mail
    #[serde(default = "default_notification_email")]
    pub notification_email: String,
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_site_url() -> String {
    "https://tripointdiagnostics.co.uk".to_string()
}

fn default_pending_ttl() -> i64 {
    30
}

fn default_notification_email() -> String {
    "contact@tripointdiagnostics.co.uk".to_string()
}

/// Drive-time routing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    /// Ordered list of dispatch bases; definition order breaks drive-time ties
    #[serde(default = "default_bases")]
    pub bases: Vec<BaseConfig>,

    /// Routing provider region
    #[serde(default = "default_region")]
    pub region: String,

    /// Request timeout in seconds for route lookups
    #[serde(default = "default_routing_timeout")]
    pub timeout_secs: u64,
}

/// A single dispatch base
#[derive(Debug, Deserialize, Clone)]
pub struct BaseConfig {
    /// Display name
    pub name: String,

    /// Address or postcode used as routing origin
    pub address: String,
}

fn default_bases() -> Vec<BaseConfig> {
    vec![
        BaseConfig {
            name: "Tonbridge".to_string(),
            address: "TN9 1PP".to_string(),
        },
        BaseConfig {
            name: "Eltham".to_string(),
            address: "SE9 4HA".to_string(),
        },
    ]
}

fn default_region() -> String {
    "EU".to_string()
}

fn default_routing_timeout() -> u64 {
    15
}

/// Calendar collaborator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    /// Calendar identifier
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// REST API base URL
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,

    /// OAuth bearer token for the calendar API
    #[serde(default)]
    pub access_token: String,

    /// Case-insensitive substrings marking early/late-shift events
    #[serde(default = "default_shift_markers")]
    pub shift_markers: Vec<String>,

    /// Buffer minutes applied to marked shift events
    #[serde(default = "default_shift_buffer")]
    pub shift_buffer_minutes: i64,
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_shift_markers() -> Vec<String> {
    vec![
        "early shift".to_string(),
        "late shift".to_string(),
        "early/late shift".to_string(),
    ]
}

fn default_shift_buffer() -> i64 {
    60
}

/// Payment gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Gateway secret API key
    #[serde(default)]
    pub secret_key: String,

    /// Webhook signing secret
    #[serde(default)]
    pub webhook_secret: String,

    /// Gateway REST API base URL
    #[serde(default = "default_payments_api_base")]
    pub api_base: String,

    /// Base URL for checkout success/cancel redirects (falls back to site_url)
    #[serde(default)]
    pub success_url_base: Option<String>,

    /// ISO currency code
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_payments_api_base() -> String {
    "https://api.stripe.com".to_string()
}

fn default_currency() -> String {
    "gbp".to_string()
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("redis.pool_size", 5)?
            .set_default("redis.default_ttl_secs", 300)?
            .set_default("auth.session_ttl_secs", 604_800)?
            .set_default("auth.login_max_attempts", 5)?
            .set_default("auth.login_window_secs", 60)?
            .set_default("booking.timezone", "Europe/London")?
            .set_default("booking.pending_ttl_minutes", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with TRIPOINT_ prefix
            .add_source(
                Environment::with_prefix("TRIPOINT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("TRIPOINT").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
