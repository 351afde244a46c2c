//! Payment-page and webhook handlers

use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use tripoint_core::traits::PaymentGateway;
use tripoint_core::AppError;
use tripoint_gateways::StripeCheckoutClient;

use crate::dto::{CheckoutUrlResponse, PaymentDetailsResponse};
use crate::Manager;

/// Booking summary for the payment page
///
/// GET /api/v1/payments/{token}
#[instrument(skip(manager, token))]
pub async fn get_payment_details(
    manager: web::Data<Arc<Manager>>,
    token: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let booking = manager.payment_details(&token).await?;
    let details = PaymentDetailsResponse::from_booking(&booking, manager.timezone());
    Ok(HttpResponse::Ok().json(details))
}

/// Create a deposit checkout session
///
/// POST /api/v1/payments/{token}/deposit-session
#[instrument(skip(manager, token))]
pub async fn create_deposit_session(
    manager: web::Data<Arc<Manager>>,
    token: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let checkout_url = manager.create_deposit_session(&token).await?;
    Ok(HttpResponse::Ok().json(CheckoutUrlResponse { checkout_url }))
}

/// Create a balance checkout session
///
/// POST /api/v1/payments/{token}/balance-session
#[instrument(skip(manager, token))]
pub async fn create_balance_session(
    manager: web::Data<Arc<Manager>>,
    token: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let checkout_url = manager.create_balance_session(&token).await?;
    Ok(HttpResponse::Ok().json(CheckoutUrlResponse { checkout_url }))
}

/// Receive a payment webhook
///
/// POST /api/v1/webhooks/payment
///
/// The raw body feeds signature verification; an unverifiable payload is
/// rejected before any booking state is touched. Verified events the core
/// does not act on are still acknowledged.
#[instrument(skip(gateway, manager, body, request))]
pub async fn payment_webhook(
    gateway: web::Data<Arc<StripeCheckoutClient>>,
    manager: web::Data<Arc<Manager>>,
    body: web::Bytes,
    request: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let signature = request
        .headers()
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = gateway.verify_webhook(&body, signature)?;
    manager.handle_webhook(&event).await?;

    Ok(HttpResponse::Ok().json(json!({"received": true})))
}

/// Configure payment-page routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("/{token}", web::get().to(get_payment_details))
            .route(
                "/{token}/deposit-session",
                web::post().to(create_deposit_session),
            )
            .route(
                "/{token}/balance-session",
                web::post().to(create_balance_session),
            ),
    );
}

/// Configure webhook routes
pub fn configure_webhooks(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhooks").route("/payment", web::post().to(payment_webhook)));
}
