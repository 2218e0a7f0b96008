use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures_util::future::{ok, Ready};
use log::{debug, error, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::config::settings::AppSettings;
use crate::error::AppError;
use crate::middleware::client_ip::resolve_client_addr;
use crate::middleware::rate_limiting::{RateLimiter, StoreError};
use crate::models::rate_limit::{insert_rate_limit_headers, RateLimitStatus};
use crate::security::session_token::SessionTokenService;

/// Cookie holding the session token. Takes precedence over the Authorization
/// header when both are present.
pub const SESSION_COOKIE_NAME: &str = "copysmith_session";

/// Header carrying the client's declared type.
pub const CLIENT_TYPE_HEADER: &str = "x-client-type";

/// Which admission checks apply to a wrapped scope. Every variant starts with
/// the client-type check; a request that declares no client type is treated
/// as a non-matching client.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AdmissionPolicy {
    /// Client-type check and rate limiting, no authentication (login routes).
    PublicRateLimited,
    /// Client-type check and authentication only.
    Authenticated,
    /// Client-type check, authentication and rate limiting, in that order.
    /// Used for the expensive generation action.
    Protected,
}

impl AdmissionPolicy {
    fn requires_auth(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Protected)
    }

    fn enforces_rate_limit(&self) -> bool {
        matches!(self, Self::PublicRateLimited | Self::Protected)
    }
}

/// Admission middleware. Sequences the per-request checks ahead of business
/// logic and short-circuits at the first failure: client type, then token
/// verification, then the rate-limit window.
#[derive(Clone)]
pub struct AdmissionGateway {
    tokens: Arc<SessionTokenService>,
    limiter: RateLimiter,
    policy: AdmissionPolicy,
    allowed_client_type: String,
    forwarded_header: String,
}

impl AdmissionGateway {
    pub fn new(
        tokens: Arc<SessionTokenService>,
        limiter: RateLimiter,
        app_settings: &AppSettings,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            tokens,
            limiter,
            policy,
            allowed_client_type: app_settings.client.allowed_client_type.clone(),
            forwarded_header: app_settings.client.forwarded_header.clone(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionGateway
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AdmissionService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdmissionService {
            service: Arc::new(service),
            gateway: self.clone(),
        })
    }
}

#[derive(Clone)]
pub struct AdmissionService<S> {
    service: Arc<S>,
    gateway: AdmissionGateway,
}

impl<S, B> Service<ServiceRequest> for AdmissionService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let gateway = self.gateway.clone();

        Box::pin(async move {
            // Skip admission checks for OPTIONS requests (CORS preflight)
            if req.method() == actix_web::http::Method::OPTIONS {
                return service.call(req).await;
            }

            let path = req.path().to_string();

            // 1. The declared client type must match the single supported
            //    first-party client.
            let declared = req
                .headers()
                .get(CLIENT_TYPE_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            if !declared.eq_ignore_ascii_case(&gateway.allowed_client_type) {
                warn!("Rejected client type {:?} for {}", declared, path);
                return Err(AppError::ForbiddenClient.into());
            }

            // 2. Authentication.
            if gateway.policy.requires_auth() {
                let token = extract_token(&req)?;
                let user = gateway.tokens.verify(&token).map_err(|e| {
                    warn!("Token verification failed for {}: {}", path, e);
                    e
                })?;
                debug!("Authenticated {} for {}", user.subject_id, path);
                req.extensions_mut().insert(user);
            }

            // 3. Rate limiting. A store failure denies service rather than
            //    letting unmetered requests through.
            let mut rate_status: Option<RateLimitStatus> = None;
            if gateway.policy.enforces_rate_limit() {
                let address = resolve_client_addr(&req, &gateway.forwarded_header);

                match gateway.limiter.admit(&address).await {
                    Ok(status) if status.allowed => {
                        rate_status = Some(status);
                    }
                    Ok(status) => {
                        warn!("Rate limit exceeded for {} from {}", path, address);
                        return Err(AppError::RateLimited(status).into());
                    }
                    Err(StoreError::Unavailable(reason)) => {
                        error!(
                            "Rate limit store unavailable for {} from {}: {}. Denying request (fail closed).",
                            path, address, reason
                        );
                        return Err(AppError::StoreUnavailable.into());
                    }
                }
            }

            // 4. Forward, then surface the window metadata on the admitted
            //    response as well.
            let mut res = service.call(req).await?;
            if let Some(status) = rate_status {
                insert_rate_limit_headers(res.headers_mut(), &status);
            }
            Ok(res)
        })
    }
}

fn extract_token(req: &ServiceRequest) -> Result<String, Error> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        let value = cookie.value().trim().to_string();
        if !value.is_empty() {
            return Ok(value);
        }
    }

    let auth_header = req.headers().get(AUTHORIZATION).ok_or(AppError::MissingToken)?;
    let auth_str = auth_header.to_str().map_err(|_| AppError::MalformedToken)?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AppError::MalformedToken.into());
    }

    let token = auth_str[7..].trim();
    if token.is_empty() {
        return Err(AppError::MissingToken.into());
    }

    Ok(token.to_string())
}
