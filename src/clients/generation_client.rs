use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::settings::AppSettings;
use crate::error::AppError;

/// Failures from the upstream generation service. Throttling is its own
/// variant so callers can tell a transient condition from a hard failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation service throttled the request")]
    Throttled,
    #[error("generation service error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("generation service request failed: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    text: String,
}

#[derive(Clone, Debug)]
pub struct GenerationClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl GenerationClient {
    pub fn new(app_settings: &AppSettings) -> Result<Self, AppError> {
        if app_settings.generation.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "GENERATION_API_KEY must be set".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            api_url: app_settings.generation.api_url.clone(),
            api_key: app_settings.generation.api_key.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn for_base_url(api_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key: "test-key".to_string(),
        }
    }

    /// Sends an assembled prompt to the generation service and returns the
    /// generated text.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/generations", self.api_url);

        debug!("Dispatching generation request ({} prompt chars)", prompt.len());

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&GenerationRequest { prompt })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
            return Err(GenerationError::Throttled);
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Generation API error ({}): {}", status, message);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerationResponse = response.json().await?;
        Ok(body.text)
    }
}
