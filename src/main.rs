use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;

mod clients;
mod config;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod security;
mod services;

use crate::clients::generation_client::GenerationClient;
use crate::config::AppSettings;
use crate::middleware::admission::{AdmissionGateway, AdmissionPolicy};
use crate::middleware::rate_limiting::{
    start_memory_store_cleanup_task, MemoryRateLimitStore, RateLimitStore, RateLimiter,
    RedisRateLimitStore,
};
use crate::routes::{configure_api_routes, configure_content_routes, configure_public_auth_routes};
use crate::security::session_token::SessionTokenService;
use crate::services::identity_verifier::{HttpIdentityVerifier, IdentityVerifier};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // Initialize the session token service. Refusing to start without a
    // signing secret beats falling back to a guessable default.
    let token_service = match SessionTokenService::new(&app_settings.auth.session_token_secret) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            log::error!("Failed to initialize session token service: {}", e);
            log::error!("Cannot start server without a signing secret");
            std::process::exit(1);
        }
    };

    // Rate limit store selection. Redis is the shared store for multi-instance
    // deployments; without it, counters live in this process only.
    let store_timeout = std::time::Duration::from_millis(app_settings.rate_limit.store_timeout_ms);
    let store: Arc<dyn RateLimitStore> = match &app_settings.rate_limit.redis_url {
        Some(url) => match RedisRateLimitStore::connect(url, store_timeout).await {
            Ok(store) => {
                log::info!("Redis connected for rate limiting");
                Arc::new(store)
            }
            Err(e) => {
                log::error!("Failed to connect to Redis for rate limiting: {}", e);
                log::error!("Cannot start server without the configured rate limit store");
                std::process::exit(1);
            }
        },
        None => {
            log::warn!("REDIS_URL is not set; using the in-memory rate limit store (single instance only)");
            let memory_store = Arc::new(MemoryRateLimitStore::new());
            tokio::spawn(start_memory_store_cleanup_task(memory_store.clone(), 300));
            memory_store
        }
    };
    let rate_limiter = RateLimiter::new(&app_settings.rate_limit, store);

    // Upstream collaborators
    let generation_client = match GenerationClient::new(&app_settings) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to initialize generation client: {}", e);
            std::process::exit(1);
        }
    };
    let identity_verifier: Arc<dyn IdentityVerifier> =
        Arc::new(HttpIdentityVerifier::new(&app_settings));

    // Get server host and port from settings
    let host = &app_settings.server.host;
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let server_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(server_addr)?;

    HttpServer::new(move || {
        // Clone the data for the factory closure
        let app_settings = app_settings.clone();

        // One gateway per scope, each with the checks that scope needs.
        let public_gateway = AdmissionGateway::new(
            token_service.clone(),
            rate_limiter.clone(),
            &app_settings,
            AdmissionPolicy::PublicRateLimited,
        );
        let api_gateway = AdmissionGateway::new(
            token_service.clone(),
            rate_limiter.clone(),
            &app_settings,
            AdmissionPolicy::Authenticated,
        );
        let content_gateway = AdmissionGateway::new(
            token_service.clone(),
            rate_limiter.clone(),
            &app_settings,
            AdmissionPolicy::Protected,
        );

        // Configure CORS using actix-cors
        let mut cors = Cors::default().supports_credentials();

        // Add allowed origins based on configuration
        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        // Common CORS settings for all origins
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings.clone()))
            .app_data(web::Data::from(token_service.clone()))
            .app_data(web::Data::new(rate_limiter.clone()))
            .app_data(web::Data::new(generation_client.clone()))
            .app_data(web::Data::from(identity_verifier.clone()))
            // Register health check endpoint without admission checks
            .service(web::resource("/health").route(web::get().to(handlers::health::health_check)))
            // Public auth routes: client check + rate limiting
            .service(
                web::scope("/auth")
                    .wrap(public_gateway)
                    .configure(configure_public_auth_routes),
            )
            // The generation action: client check + auth + rate limiting
            .service(
                web::scope("/api/content")
                    .wrap(content_gateway)
                    .configure(configure_content_routes),
            )
            // Remaining API routes: client check + auth
            .service(
                web::scope("/api")
                    .wrap(api_gateway)
                    .configure(configure_api_routes),
            )
    })
    .listen(listener)?
    .run()
    .await
}
