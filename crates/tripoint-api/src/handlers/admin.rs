//! Admin handlers
//!
//! Session-cookie guarded dashboard endpoints plus the rate-limited login.

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    web, HttpRequest, HttpResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tripoint_auth::{AdminSession, LoginRateLimiter, PasswordService, SessionService, SESSION_COOKIE_NAME};
use tripoint_cache::keys;
use tripoint_core::models::BookingStatus;
use tripoint_core::{AppConfig, AppError};
use validator::Validate;

use crate::dto::{AdminBookingsQuery, AdminLoginRequest};
use crate::Manager;

/// Client address for rate limiting
fn client_ip(request: &HttpRequest) -> String {
    request
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string()
}

/// Start of a date as a UTC instant
fn day_start(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}

/// End of a date as a UTC instant
fn day_end(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59).map(|naive| naive.and_utc())
}

/// Admin login: sets the session cookie on success
///
/// POST /api/v1/admin/login
#[instrument(skip_all)]
pub async fn login(
    config: web::Data<AppConfig>,
    sessions: web::Data<Arc<SessionService>>,
    passwords: web::Data<Arc<PasswordService>>,
    limiter: web::Data<Arc<LoginRateLimiter>>,
    payload: web::Json<AdminLoginRequest>,
    request: HttpRequest,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let ip = client_ip(&request);
    limiter.check(&keys::login_attempts_key(&ip)).await?;

    let valid = passwords.verify_password(&payload.password, &config.auth.admin_password_hash)?;
    if !valid {
        info!("Admin login failed from {}", ip);
        return Err(AppError::InvalidCredentials);
    }

    let token = sessions.create_session()?;
    let cookie = Cookie::build(SESSION_COOKIE_NAME, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(sessions.ttl_secs()))
        .finish();

    info!("Admin login from {}", ip);
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({"authenticated": true})))
}

/// Check whether the current session is valid
///
/// GET /api/v1/admin/session
pub async fn session_status(
    sessions: web::Data<Arc<SessionService>>,
    request: HttpRequest,
) -> HttpResponse {
    let authenticated = request
        .cookie(SESSION_COOKIE_NAME)
        .map(|cookie| sessions.verify_session(cookie.value()).is_ok())
        .unwrap_or(false);

    HttpResponse::Ok().json(json!({"authenticated": authenticated}))
}

/// Clear the admin session cookie
///
/// POST /api/v1/admin/logout
pub async fn logout() -> HttpResponse {
    let mut cookie = Cookie::build(SESSION_COOKIE_NAME, "")
        .path("/")
        .finish();
    cookie.make_removal();

    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({"authenticated": false}))
}

/// List bookings for the dashboard
///
/// GET /api/v1/admin/bookings
#[instrument(skip(manager, _admin))]
pub async fn list_bookings(
    manager: web::Data<Arc<Manager>>,
    query: web::Query<AdminBookingsQuery>,
    _admin: AdminSession,
) -> Result<HttpResponse, AppError> {
    let status = match &query.status {
        Some(raw) => Some(
            BookingStatus::from_str(raw)
                .ok_or_else(|| AppError::InvalidInput(format!("Unknown status: {}", raw)))?,
        ),
        None => None,
    };

    let bookings = manager
        .list_bookings(
            status,
            query.date_from.and_then(day_start),
            query.date_to.and_then(day_end),
            query.limit.clamp(1, 1000),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({"bookings": bookings})))
}

/// Mark a visit as completed
///
/// POST /api/v1/admin/bookings/{id}/complete
#[instrument(skip(manager, _admin))]
pub async fn complete_booking(
    manager: web::Data<Arc<Manager>>,
    booking_id: web::Path<String>,
    _admin: AdminSession,
) -> Result<HttpResponse, AppError> {
    let booking = manager.mark_complete(&booking_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": booking.status,
        "booking_id": booking.id,
    })))
}

/// Settle the balance without the payment gateway
///
/// POST /api/v1/admin/bookings/{id}/mark-paid
#[instrument(skip(manager, _admin))]
pub async fn mark_paid(
    manager: web::Data<Arc<Manager>>,
    booking_id: web::Path<String>,
    _admin: AdminSession,
) -> Result<HttpResponse, AppError> {
    let booking = manager.admin_mark_paid(&booking_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": booking.status,
        "booking_id": booking.id,
    })))
}

/// Regenerate and send the balance payment link
///
/// POST /api/v1/admin/bookings/{id}/balance-link
#[instrument(skip(manager, _admin))]
pub async fn generate_balance_link(
    manager: web::Data<Arc<Manager>>,
    booking_id: web::Path<String>,
    _admin: AdminSession,
) -> Result<HttpResponse, AppError> {
    let payment_url = manager.generate_balance_link(&booking_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "payment_url": payment_url,
        "email_sent": true,
    })))
}

/// Configure admin routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/login", web::post().to(login))
            .route("/session", web::get().to(session_status))
            .route("/logout", web::post().to(logout))
            .route("/bookings", web::get().to(list_bookings))
            .route("/bookings/{id}/complete", web::post().to(complete_booking))
            .route("/bookings/{id}/mark-paid", web::post().to(mark_paid))
            .route(
                "/bookings/{id}/balance-link",
                web::post().to(generate_balance_link),
            ),
    );
}
