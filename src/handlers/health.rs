use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::config::AppSettings;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

pub async fn health_check(app_settings: web::Data<AppSettings>) -> impl Responder {
    // Public health endpoint - only return basic status, no sensitive metrics
    let response = HealthResponse {
        status: "ok".to_string(),
        service: app_settings.app.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    HttpResponse::Ok().json(response)
}
