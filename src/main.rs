//! TriPoint Booking Backend Server
//!
//! Mobile-diagnostic-visit booking: zone classification, availability,
//! reservations, and the deposit/completion/payment lifecycle.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tripoint_api::{
    configure_admin, configure_availability, configure_bookings, configure_payments,
    configure_services, configure_webhooks, configure_zones, Classifier, Intervals, Manager,
};
use tripoint_auth::{LoginRateLimiter, PasswordService, SessionService};
use tripoint_cache::RedisCache;
use tripoint_core::AppConfig;
use tripoint_db::{create_pool, run_migrations, PgBookingRepository, PgPaymentEventRepository};
use tripoint_gateways::{
    GoogleCalendarClient, LogMailer, StripeCheckoutClient, WazeRoutingClient,
};
use tripoint_services::{BookingManager, IntervalStore, ZoneClassifier};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "tripoint-booking",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health_check))
            // Zone classification
            .configure(configure_zones)
            // Service catalog
            .configure(configure_services)
            // Availability grid
            .configure(configure_availability)
            // Reservations
            .configure(configure_bookings)
            // Payment pages
            .configure(configure_payments)
            // Payment webhooks
            .configure(configure_webhooks)
            // Admin dashboard
            .configure(configure_admin),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tripoint_booking={},tripoint_api={},tripoint_services={},tripoint_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting TriPoint booking backend v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().expect("Failed to load configuration");

    let tz: chrono_tz::Tz = config
        .booking
        .timezone
        .parse()
        .expect("booking.timezone must be a valid IANA timezone");

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .expect("Failed to create database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    info!("Connecting to Redis...");
    let cache = Arc::new(
        RedisCache::new(&config.redis.url)
            .await
            .expect("Failed to connect to Redis"),
    );

    // Repositories
    let booking_repo = Arc::new(PgBookingRepository::new(pool.clone()));
    let payment_event_repo = Arc::new(PgPaymentEventRepository::new(pool.clone()));

    // External collaborators
    let routing = Arc::new(
        WazeRoutingClient::new(&config.routing.region, config.routing.timeout_secs)
            .expect("Failed to build routing client"),
    );
    let calendar = Arc::new(
        GoogleCalendarClient::new(
            &config.calendar.api_base,
            &config.calendar.calendar_id,
            &config.calendar.access_token,
        )
        .expect("Failed to build calendar client"),
    );
    let payments = Arc::new(
        StripeCheckoutClient::new(
            &config.payments.api_base,
            &config.payments.secret_key,
            &config.payments.webhook_secret,
            config
                .payments
                .success_url_base
                .as_deref()
                .unwrap_or(&config.booking.site_url),
            &config.payments.currency,
        )
        .expect("Failed to build payment gateway client"),
    );
    let mailer = Arc::new(LogMailer::new());

    // Services
    let classifier: Arc<Classifier> = Arc::new(ZoneClassifier::new(
        routing,
        cache.clone(),
        config.routing.bases.clone(),
        tripoint_cache::keys::ZONE_TTL_SECS,
    ));
    let intervals: Arc<Intervals> = Arc::new(IntervalStore::new(
        calendar.clone(),
        booking_repo.clone(),
        config.calendar.shift_markers.clone(),
        config.calendar.shift_buffer_minutes,
    ));
    let manager: Arc<Manager> = Arc::new(BookingManager::new(
        booking_repo,
        payment_event_repo,
        calendar,
        payments.clone(),
        mailer,
        tz,
        config.booking.site_url.clone(),
        config.booking.notification_email.clone(),
        config.booking.pending_ttl_minutes,
    ));

    // Admin auth
    let sessions = Arc::new(SessionService::new(
        &config.auth.session_secret,
        config.auth.session_ttl_secs,
    ));
    let passwords = Arc::new(PasswordService::new());
    let limiter = Arc::new(LoginRateLimiter::new(
        cache.clone(),
        config.auth.login_max_attempts,
        config.auth.login_window_secs,
    ));

    // CORS configuration
    let cors_origins =
        env::var("CORS_ORIGINS").unwrap_or_else(|_| config.booking.site_url.clone());

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!("Starting HTTP server on {} with {} workers", bind_addr, workers);

    let app_config = config.clone();

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
                header::COOKIE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_config.clone()))
            .app_data(web::Data::new(classifier.clone()))
            .app_data(web::Data::new(intervals.clone()))
            .app_data(web::Data::new(manager.clone()))
            .app_data(web::Data::new(payments.clone()))
            .app_data(web::Data::new(sessions.clone()))
            .app_data(web::Data::new(passwords.clone()))
            .app_data(web::Data::new(limiter.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
