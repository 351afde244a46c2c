//! Reservation handlers

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{instrument, warn};
use tripoint_core::AppError;
use tripoint_services::booking::{ReservationOutcome, ReservationRequest};
use validator::Validate;

use crate::dto::{BookingRequest, BookingResponse};
use crate::{Classifier, Manager};

/// Reserve a slot
///
/// POST /api/v1/bookings
#[instrument(skip(classifier, manager, payload), fields(postcode = %payload.postcode))]
pub async fn reserve_booking(
    classifier: web::Data<Arc<Classifier>>,
    manager: web::Data<Arc<Manager>>,
    payload: web::Json<BookingRequest>,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| {
        warn!("Reservation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    if !payload.safe_location_confirmed {
        return Err(AppError::InvalidInput(
            "Safe working location confirmation is required".to_string(),
        ));
    }

    let slot_start: DateTime<Utc> = DateTime::parse_from_rfc3339(&payload.slot_start_iso)
        .map_err(|e| AppError::InvalidInput(format!("Invalid slot start: {}", e)))?
        .with_timezone(&Utc);

    let zone = classifier.classify(payload.postcode.trim()).await?;

    let request = ReservationRequest {
        service_ids: payload.service_ids.clone(),
        slot_start,
        full_name: payload.full_name.clone(),
        email: payload.email.clone(),
        phone: payload.phone.clone(),
        postcode: payload.postcode.clone(),
        address_line_1: payload.address_line_1.clone(),
        town_city: payload.town_city.clone(),
        vehicle_reg: payload.vehicle_registration.clone(),
        vehicle_make: payload.vehicle_make.clone(),
        vehicle_model: payload.vehicle_model.clone(),
        approx_mileage: payload.approximate_mileage.clone(),
        symptoms: payload.symptoms.clone(),
        additional_notes: payload.additional_notes.clone(),
        safe_location_confirmed: payload.safe_location_confirmed,
    };

    let response = match manager.reserve(&request, &zone, Utc::now()).await? {
        ReservationOutcome::Reserved {
            booking,
            payment_url,
            fixed_price,
            deposit,
        } => BookingResponse {
            status: "pending_deposit".to_string(),
            message: "Slot reserved. Please pay your deposit to confirm your booking.".to_string(),
            payment_url: Some(payment_url),
            booking_id: Some(booking.id),
            zone: zone.zone,
            fixed_price_gbp: Some(fixed_price),
            deposit_gbp: Some(deposit),
        },
        ReservationOutcome::ManualReview => BookingResponse {
            status: "pending_manual_review".to_string(),
            message: "Drive time exceeds 60 minutes. We've received your request and will \
                      contact you with a quote."
                .to_string(),
            payment_url: None,
            booking_id: None,
            zone: zone.zone,
            fixed_price_gbp: None,
            deposit_gbp: None,
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Configure booking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/bookings", web::post().to(reserve_booking));
}
