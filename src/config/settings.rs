use std::env;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub client: ClientConfig,
    pub rate_limit: RateLimitConfig,
    pub generation: GenerationConfig,
    pub identity: IdentityConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub session_token_secret: String,
    pub token_duration_days: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// The single first-party client type admitted by the gateway.
    pub allowed_client_type: String,
    /// Forwarding header set by the trusted reverse proxy.
    pub forwarded_header: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u64,
    pub store_timeout_ms: u64,
    pub redis_url: Option<String>,
    pub redis_key_prefix: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub userinfo_url: String,
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // App config
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "copysmith".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // CORS origins
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        // Auth config. The signing secret has no fallback: a guessable default
        // would silently undermine every minted token.
        let session_token_secret = env::var("SESSION_TOKEN_SECRET")
            .map_err(|_| AppError::Configuration("SESSION_TOKEN_SECRET must be set".to_string()))?;
        if session_token_secret.trim().is_empty() {
            return Err(AppError::Configuration("SESSION_TOKEN_SECRET must not be empty".to_string()));
        }

        let token_duration_days = env::var("SESSION_TOKEN_DURATION_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .map_err(|_| AppError::Configuration("SESSION_TOKEN_DURATION_DAYS must be a valid number".to_string()))?;

        // First-party client admission
        let allowed_client_type = env::var("ALLOWED_CLIENT_TYPE").unwrap_or_else(|_| "web".to_string());
        let forwarded_header = env::var("TRUSTED_PROXY_HEADER")
            .unwrap_or_else(|_| "x-forwarded-for".to_string())
            .to_ascii_lowercase();

        // Rate limiting
        let rate_limit_window_ms = env::var("RATE_LIMIT_WINDOW_MS")
            .unwrap_or_else(|_| "60000".to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Configuration("RATE_LIMIT_WINDOW_MS must be a valid number".to_string()))?;

        let rate_limit_max_requests = env::var("RATE_LIMIT_MAX_REQUESTS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Configuration("RATE_LIMIT_MAX_REQUESTS must be a valid number".to_string()))?;

        let rate_limit_store_timeout_ms = env::var("RATE_LIMIT_STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Configuration("RATE_LIMIT_STORE_TIMEOUT_MS must be a valid number".to_string()))?;

        let redis_url = env::var("REDIS_URL").ok();
        let redis_key_prefix = env::var("RATE_LIMIT_KEY_PREFIX").ok();

        // Generation service
        let generation_api_url = env::var("GENERATION_API_URL")
            .map_err(|_| AppError::Configuration("GENERATION_API_URL must be set".to_string()))?;

        let generation_api_key = env::var("GENERATION_API_KEY")
            .map_err(|_| AppError::Configuration("GENERATION_API_KEY must be set".to_string()))?;

        // Federated identity provider
        let identity_userinfo_url = env::var("IDENTITY_USERINFO_URL")
            .map_err(|_| AppError::Configuration("IDENTITY_USERINFO_URL must be set".to_string()))?;

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            auth: AuthConfig {
                session_token_secret,
                token_duration_days,
            },
            client: ClientConfig {
                allowed_client_type,
                forwarded_header,
            },
            rate_limit: RateLimitConfig {
                window_ms: rate_limit_window_ms,
                max_requests: rate_limit_max_requests,
                store_timeout_ms: rate_limit_store_timeout_ms,
                redis_url,
                redis_key_prefix,
            },
            generation: GenerationConfig {
                api_url: generation_api_url,
                api_key: generation_api_key,
            },
            identity: IdentityConfig {
                userinfo_url: identity_userinfo_url,
            },
        })
    }
}
