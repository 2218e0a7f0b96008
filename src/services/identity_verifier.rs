use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;

use crate::config::settings::AppSettings;
use crate::error::AppError;

/// Identity confirmed by the federated provider for a presented assertion.
#[derive(Clone, Debug)]
pub struct FederatedIdentity {
    pub subject_id: String,
    pub external_id: String,
}

/// Verifies a federated identity assertion presented at login. Injected so
/// handler tests can substitute a fake.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_assertion(&self, assertion: &str) -> Result<FederatedIdentity, AppError>;
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: String,
}

/// Verifier backed by the provider's userinfo endpoint.
#[derive(Clone, Debug)]
pub struct HttpIdentityVerifier {
    client: Client,
    userinfo_url: String,
}

impl HttpIdentityVerifier {
    pub fn new(app_settings: &AppSettings) -> Self {
        Self {
            client: Client::new(),
            userinfo_url: app_settings.identity.userinfo_url.clone(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify_assertion(&self, assertion: &str) -> Result<FederatedIdentity, AppError> {
        if assertion.trim().is_empty() {
            return Err(AppError::Auth("Empty identity assertion".to_string()));
        }

        let response = self
            .client
            .get(&self.userinfo_url)
            .header("Authorization", format!("Bearer {}", assertion))
            .send()
            .await
            .map_err(|e| {
                error!("Identity provider request failed: {}", e);
                AppError::External(format!("Identity provider request failed: {}", e))
            })?;

        if !response.status().is_success() {
            debug!("Identity provider rejected assertion ({})", response.status());
            return Err(AppError::Auth("Invalid identity assertion".to_string()));
        }

        let claims: UserInfoResponse = response.json().await.map_err(|e| {
            AppError::External(format!("Failed to read identity provider response: {}", e))
        })?;

        Ok(FederatedIdentity {
            subject_id: claims.sub,
            external_id: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn verifier_for(server: &mockito::ServerGuard) -> HttpIdentityVerifier {
        HttpIdentityVerifier {
            client: Client::new(),
            userinfo_url: format!("{}/userinfo", server.url()),
        }
    }

    #[tokio::test]
    async fn a_valid_assertion_yields_the_federated_identity() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer good-assertion")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sub":"user-42","email":"user-42@idp.example.com"}"#)
            .create_async()
            .await;

        let identity = verifier_for(&server)
            .verify_assertion("good-assertion")
            .await
            .unwrap();

        assert_eq!(identity.subject_id, "user-42");
        assert_eq!(identity.external_id, "user-42@idp.example.com");
    }

    #[tokio::test]
    async fn a_rejected_assertion_is_an_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/userinfo")
            .with_status(401)
            .create_async()
            .await;

        assert!(matches!(
            verifier_for(&server).verify_assertion("bad").await,
            Err(AppError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn an_empty_assertion_never_reaches_the_provider() {
        let server = mockito::Server::new_async().await;

        assert!(matches!(
            verifier_for(&server).verify_assertion("   ").await,
            Err(AppError::Auth(_))
        ));
    }
}
