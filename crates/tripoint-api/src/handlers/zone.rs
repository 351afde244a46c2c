//! Zone classification handlers

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use tripoint_core::AppError;

use crate::Classifier;

/// Query parameters for zone classification
#[derive(Debug, Deserialize)]
pub struct ZoneQuery {
    pub postcode: String,
}

/// Classify a postcode into a service zone
///
/// GET /api/v1/zones/classify
#[instrument(skip(classifier))]
pub async fn classify_zone(
    classifier: web::Data<Arc<Classifier>>,
    query: web::Query<ZoneQuery>,
) -> Result<HttpResponse, AppError> {
    let result = classifier.classify(query.postcode.trim()).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Configure zone routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/zones").route("/classify", web::get().to(classify_zone)));
}
