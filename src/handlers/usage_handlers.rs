use actix_web::{web, HttpRequest, HttpResponse};
use log::error;

use crate::config::AppSettings;
use crate::error::AppError;
use crate::middleware::client_ip::resolve_from_parts;
use crate::middleware::rate_limiting::RateLimiter;
use crate::models::authenticated_user::AuthenticatedUser;

/// Current rate-limit standing for the calling client. Reads the window
/// without consuming a request slot, so clients can poll it freely.
pub async fn get_rate_limit_status(
    req: HttpRequest,
    user: AuthenticatedUser,
    limiter: web::Data<RateLimiter>,
    app_settings: web::Data<AppSettings>,
) -> Result<HttpResponse, AppError> {
    let address = resolve_from_parts(
        req.headers(),
        req.peer_addr(),
        &app_settings.client.forwarded_header,
    );

    let status = limiter.remaining(&address).await.map_err(|e| {
        error!("Rate limit store read failed for {}: {}", user.subject_id, e);
        AppError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(status))
}
