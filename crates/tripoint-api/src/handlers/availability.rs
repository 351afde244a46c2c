//! Availability handlers
//!
//! Composes the zone classifier, interval store, and slot generator into the
//! availability query: classify, expire stale holds, collect blocked
//! intervals over a padded window, then emit the annotated slot grid.

use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::instrument;
use tripoint_core::models::resolve_bundle;
use tripoint_core::AppError;
use tripoint_services::constants::{BOOKING_WINDOW_DAYS, WORKDAY_START_HOUR};
use tripoint_services::pricing::{booking_requirements, deposit, fixed_price, min_notice_hours};
use tripoint_services::slots::{generate_slots, local_day_hour};

use crate::dto::{AvailabilityQuery, AvailabilityResponse};
use crate::{Classifier, Intervals, Manager};

/// Get the slot grid and pricing for a location and service bundle
///
/// GET /api/v1/availability
#[instrument(skip(classifier, intervals, manager, query), fields(postcode = %query.postcode))]
pub async fn get_availability(
    classifier: web::Data<Arc<Classifier>>,
    intervals: web::Data<Arc<Intervals>>,
    manager: web::Data<Arc<Manager>>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse, AppError> {
    let service_ids: Vec<String> = query
        .service_ids
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if service_ids.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one service must be selected".to_string(),
        ));
    }

    let zone = classifier.classify(query.postcode.trim()).await?;
    let requirements = booking_requirements(&service_ids, zone.time_minutes)?;
    let services = resolve_bundle(&service_ids)?;
    let min_notice = min_notice_hours(&services);

    let tz = manager.timezone();
    let now_local = Utc::now().with_timezone(&tz);

    let mut start_day = now_local.date_naive();
    if let Some(from) = query.from_date {
        if from > start_day {
            start_day = from;
        }
    }

    if !zone.zone.is_serviceable() {
        return Ok(HttpResponse::Ok().json(AvailabilityResponse {
            postcode: query.postcode.clone(),
            zone: zone.zone,
            drive_time_minutes: zone.time_minutes,
            travel_buffer_minutes: requirements.travel_buffer_mins,
            service_duration_minutes: requirements.service_duration_mins,
            booking_duration_minutes: requirements.total_duration_mins,
            fixed_price_gbp: None,
            deposit_gbp: None,
            manual_review_required: true,
            slots: vec![],
        }));
    }

    // Pad the query window so buffers reaching past the grid edges still see
    // their neighbours.
    let window_start = (local_day_hour(tz, start_day, WORKDAY_START_HOUR)
        .unwrap_or_else(|| now_local.clone())
        - Duration::hours(4))
    .with_timezone(&Utc);
    let window_end = window_start + Duration::days(BOOKING_WINDOW_DAYS + 2);

    // Release stale holds before reading busy intervals
    manager.expire_stale().await?;

    let blocked = intervals
        .blocked_intervals(window_start, window_end, requirements.travel_buffer_mins)
        .await?;

    let slots = generate_slots(
        now_local.clone(),
        start_day,
        requirements.service_duration_mins,
        requirements.travel_buffer_mins,
        min_notice,
        &blocked,
    );

    // Price the first bookable slot as the representative example
    let example_start = slots
        .iter()
        .find(|s| s.available)
        .map(|s| s.start.with_timezone(&tz))
        .unwrap_or(now_local);

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        postcode: query.postcode.clone(),
        zone: zone.zone,
        drive_time_minutes: zone.time_minutes,
        travel_buffer_minutes: requirements.travel_buffer_mins,
        service_duration_minutes: requirements.service_duration_mins,
        booking_duration_minutes: requirements.total_duration_mins,
        fixed_price_gbp: fixed_price(&services, zone.zone, &example_start),
        deposit_gbp: deposit(&services, zone.zone),
        manual_review_required: false,
        slots,
    }))
}

/// Configure availability routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/availability", web::get().to(get_availability));
}
