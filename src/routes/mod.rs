use actix_web::web;

use crate::handlers::{generate_handlers, session_handlers, usage_handlers};

// Configure authenticated API routes (/api/*). No rate limiting here; the
// limits endpoint must stay readable while a client is throttled.
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/usage").route("/limits", web::get().to(usage_handlers::get_rate_limit_status)),
    );
}

// Configure the rate-limited content routes (/api/content/*). Generation is
// the expensive downstream action the per-client ceiling protects.
pub fn configure_content_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(generate_handlers::generate_content);
}

// Configure public auth routes (/auth/*). Client check and rate limiting
// apply, but no session token is required yet.
pub fn configure_public_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(session_handlers::create_session);
    cfg.service(session_handlers::validate_session);
}
