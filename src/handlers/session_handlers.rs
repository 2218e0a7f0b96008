use actix_web::{
    cookie::{Cookie, SameSite},
    get, post, web, HttpRequest, HttpResponse,
};
use chrono::{Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppSettings;
use crate::error::AppError;
use crate::middleware::admission::SESSION_COOKIE_NAME;
use crate::security::session_token::SessionTokenService;
use crate::services::identity_verifier::IdentityVerifier;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub assertion: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub subject_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    pub subject_id: String,
    pub external_id: String,
}

/// Exchange a federated identity assertion for a first-party session token.
/// The token is returned in the body and also set as the session cookie.
#[post("/session")]
pub async fn create_session(
    req: HttpRequest,
    verifier: web::Data<dyn IdentityVerifier>,
    tokens: web::Data<SessionTokenService>,
    app_settings: web::Data<AppSettings>,
    session_request: web::Json<SessionRequest>,
) -> Result<HttpResponse, AppError> {
    let client_ip = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let request_id = format!("session_{}_{}", Utc::now().timestamp_millis(), Uuid::new_v4());

    info!("Session exchange attempt from IP: {} (request: {})", client_ip, request_id);

    let identity = verifier
        .verify_assertion(&session_request.assertion)
        .await
        .map_err(|e| {
            warn!("Identity assertion rejected (request: {}): {}", request_id, e);
            e
        })?;

    let ttl = Duration::days(app_settings.auth.token_duration_days);
    let expires_at = (Utc::now() + ttl).timestamp();
    let token = tokens.mint(&identity.subject_id, &identity.external_id, ttl)?;

    debug!(
        "Minted session token for {} (request: {})",
        identity.subject_id, request_id
    );

    let cookie = Cookie::build(SESSION_COOKIE_NAME, token.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(app_settings.app.environment == "production")
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(SessionResponse {
        token,
        subject_id: identity.subject_id,
        expires_at,
    }))
}

/// Verify a presented session token and return its identity fields. The
/// cookie takes precedence over the Authorization header, matching the
/// admission gateway.
#[get("/validate")]
pub async fn validate_session(
    req: HttpRequest,
    tokens: web::Data<SessionTokenService>,
) -> Result<HttpResponse, AppError> {
    let token = if let Some(cookie) = req.cookie(SESSION_COOKIE_NAME) {
        cookie.value().to_string()
    } else {
        let auth_header = req
            .headers()
            .get("Authorization")
            .ok_or(AppError::MissingToken)?;
        let auth_str = auth_header.to_str().map_err(|_| AppError::MalformedToken)?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or(AppError::MalformedToken)?
            .trim();
        if token.is_empty() {
            return Err(AppError::MissingToken);
        }
        token.to_string()
    };

    let user = tokens.verify(&token)?;

    Ok(HttpResponse::Ok().json(SessionInfoResponse {
        subject_id: user.subject_id,
        external_id: user.external_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity_verifier::FederatedIdentity;
    use actix_web::{http::StatusCode, test, App};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct FakeVerifier;

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn verify_assertion(&self, assertion: &str) -> Result<FederatedIdentity, AppError> {
            if assertion == "good-assertion" {
                Ok(FederatedIdentity {
                    subject_id: "user-42".to_string(),
                    external_id: "user-42@idp.example.com".to_string(),
                })
            } else {
                Err(AppError::Auth("Invalid identity assertion".to_string()))
            }
        }
    }

    fn test_settings() -> AppSettings {
        use crate::config::settings::{
            AppConfig, AuthConfig, ClientConfig, GenerationConfig, IdentityConfig,
            RateLimitConfig, ServerConfig,
        };

        AppSettings {
            app: AppConfig {
                name: "copysmith".to_string(),
                environment: "test".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
            },
            auth: AuthConfig {
                session_token_secret: "test-signing-secret-0123456789abcdef".to_string(),
                token_duration_days: 30,
            },
            client: ClientConfig {
                allowed_client_type: "web".to_string(),
                forwarded_header: "x-forwarded-for".to_string(),
            },
            rate_limit: RateLimitConfig {
                window_ms: 60_000,
                max_requests: 5,
                store_timeout_ms: 1000,
                redis_url: None,
                redis_key_prefix: None,
            },
            generation: GenerationConfig {
                api_url: "http://127.0.0.1:0".to_string(),
                api_key: "test-key".to_string(),
            },
            identity: IdentityConfig {
                userinfo_url: "http://127.0.0.1:0/userinfo".to_string(),
            },
        }
    }

    fn token_service() -> SessionTokenService {
        SessionTokenService::new("test-signing-secret-0123456789abcdef").unwrap()
    }

    async fn call_session(body: serde_json::Value) -> actix_web::dev::ServiceResponse {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(FakeVerifier);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(verifier))
                .app_data(web::Data::new(token_service()))
                .app_data(web::Data::new(test_settings()))
                .service(create_session)
                .service(validate_session),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/session")
            .set_json(body)
            .to_request();
        test::call_service(&app, req).await
    }

    #[actix_web::test]
    async fn exchanges_an_assertion_for_a_session_cookie() {
        let res = call_session(serde_json::json!({"assertion": "good-assertion"})).await;

        assert_eq!(res.status(), StatusCode::OK);
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .expect("session cookie missing");
        assert_eq!(cookie.http_only(), Some(true));

        let body: SessionResponse = test::read_body_json(res).await;
        assert_eq!(body.subject_id, "user-42");

        let user = token_service().verify(&body.token).unwrap();
        assert_eq!(user.subject_id, "user-42");
        assert_eq!(user.external_id, "user-42@idp.example.com");
        assert!(body.expires_at > Utc::now().timestamp());
    }

    #[actix_web::test]
    async fn a_rejected_assertion_yields_401() {
        let res = call_session(serde_json::json!({"assertion": "bad-assertion"})).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn validate_returns_the_token_identity() {
        let tokens = token_service();
        let token = tokens
            .mint("user-42", "user-42@idp.example.com", Duration::hours(1))
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(token_service()))
                .service(validate_session),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/validate")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: SessionInfoResponse = test::read_body_json(res).await;
        assert_eq!(body.subject_id, "user-42");
        assert_eq!(body.external_id, "user-42@idp.example.com");
    }

    #[actix_web::test]
    async fn validate_without_a_token_yields_401() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(token_service()))
                .service(validate_session),
        )
        .await;

        let req = test::TestRequest::get().uri("/validate").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
