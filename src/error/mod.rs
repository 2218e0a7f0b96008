use actix_web::{error::ResponseError, http::header::{HeaderValue, RETRY_AFTER}, http::StatusCode, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;

use crate::models::rate_limit::{insert_rate_limit_headers, RateLimitStatus};

#[derive(Debug)]
pub enum AppError {
    // Admission taxonomy. These variants carry no inner detail so the
    // user-facing message is always the fixed pair below; the specifics stay
    // in server-side logs.
    MissingToken,
    MalformedToken,
    InvalidSignature,
    ExpiredToken,
    ForbiddenClient,
    RateLimited(RateLimitStatus),
    StoreUnavailable,
    Auth(String),
    BadRequest(String),
    Validation(String),
    External(String),
    Configuration(String),
    Internal(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    code: u16,
    message: String,
    error_type: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingToken => write!(f, "Authentication token is missing"),
            AppError::MalformedToken => write!(f, "Authentication token is malformed"),
            AppError::InvalidSignature => write!(f, "Authentication token signature is invalid"),
            AppError::ExpiredToken => write!(f, "Authentication token has expired"),
            AppError::ForbiddenClient => write!(f, "Client type is not allowed to access this service"),
            AppError::RateLimited(_) => write!(f, "Rate limit exceeded. Please try again later."),
            AppError::StoreUnavailable => write!(f, "Service is temporarily unavailable. Please try again later."),
            AppError::Auth(e) => write!(f, "Authentication error: {}", e),
            AppError::BadRequest(e) => write!(f, "Bad request: {}", e),
            AppError::Validation(e) => write!(f, "Validation error: {}", e),
            AppError::External(e) => write!(f, "External service error: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl StdError for AppError {}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::MissingToken => "missing_token",
            AppError::MalformedToken => "malformed_token",
            AppError::InvalidSignature => "invalid_signature",
            AppError::ExpiredToken => "expired_token",
            AppError::ForbiddenClient => "forbidden_client",
            AppError::RateLimited(_) => "rate_limited",
            AppError::StoreUnavailable => "store_unavailable",
            AppError::Auth(_) => "authentication_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Validation(_) => "validation_error",
            AppError::External(_) => "external_service_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        let error_response = ErrorResponse {
            code: status_code.as_u16(),
            message: self.to_string(),
            error_type: self.error_type().to_string(),
        };

        let mut response = HttpResponse::build(status_code).json(error_response);

        // Window metadata rides on the rejection so clients can self-throttle.
        if let AppError::RateLimited(status) = self {
            insert_rate_limit_headers(response.headers_mut(), status);
            let retry_after_secs = (status.reset_at - Utc::now()).num_seconds().max(0);
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::MalformedToken => StatusCode::UNAUTHORIZED,
            AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenClient => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON deserialization/serialization error: {}", error))
    }
}

impl From<crate::middleware::rate_limiting::StoreError> for AppError {
    fn from(_error: crate::middleware::rate_limiting::StoreError) -> Self {
        // Store failure details are logged where they occur; the client only
        // learns that service was denied.
        AppError::StoreUnavailable
    }
}

impl From<crate::clients::generation_client::GenerationError> for AppError {
    fn from(error: crate::clients::generation_client::GenerationError) -> Self {
        match error {
            crate::clients::generation_client::GenerationError::Throttled => {
                AppError::External("Generation service is busy, please retry shortly".to_string())
            }
            other => AppError::External(other.to_string()),
        }
    }
}

// Define AppResult type alias for Result<T, AppError>
pub type AppResult<T> = Result<T, AppError>;
