//! Service catalog handlers

use actix_web::{web, HttpResponse};
use serde::Serialize;
use tripoint_core::models::{all_services, ServiceId, ZonePrices};

/// Public view of a bookable service
#[derive(Debug, Serialize)]
pub struct ServicePublic {
    pub id: ServiceId,
    pub label: &'static str,
    pub duration_minutes: i32,
    pub min_notice_hours: i64,
    pub zone_price: ZonePrices,
}

/// List bookable services
///
/// GET /api/v1/services
pub async fn list_services() -> HttpResponse {
    let services: Vec<ServicePublic> = all_services()
        .iter()
        .map(|def| ServicePublic {
            id: def.id,
            label: def.label,
            duration_minutes: def.duration_minutes,
            min_notice_hours: def.min_notice_hours,
            zone_price: def.zone_price,
        })
        .collect();

    HttpResponse::Ok().json(services)
}

/// Configure service catalog routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/services", web::get().to(list_services));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_list_services_includes_catalog() {
        let response = list_services().await;
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }

    #[test]
    fn test_service_public_serialization() {
        let def = tripoint_core::models::service_definition(ServiceId::DiagnosticCallout);
        let public = ServicePublic {
            id: def.id,
            label: def.label,
            duration_minutes: def.duration_minutes,
            min_notice_hours: def.min_notice_hours,
            zone_price: def.zone_price,
        };
        let json = serde_json::to_value(&public).unwrap();
        assert_eq!(json["id"], "diagnostic-callout");
        assert_eq!(json["zone_price"]["A"], 120);
        assert_eq!(json["zone_price"]["B"], 135);
    }
}
