use actix_web::{post, web, HttpResponse};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::clients::generation_client::GenerationClient;
use crate::error::AppError;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::services::prompt_builder::{build_prompt, GenerationRequestForm};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub text: String,
}

/// Assemble the prompt from the submitted form and invoke the generation
/// service on behalf of the authenticated user. The admission gateway has
/// already checked the client type, the token, and the rate-limit window.
#[post("/generate")]
pub async fn generate_content(
    user: AuthenticatedUser,
    generation_client: web::Data<GenerationClient>,
    form: web::Json<GenerationRequestForm>,
) -> Result<HttpResponse, AppError> {
    if form.topic.trim().is_empty() {
        return Err(AppError::Validation("topic must not be empty".to_string()));
    }

    let prompt = build_prompt(&form);
    info!(
        "Generation request from {} ({} prompt chars)",
        user.subject_id,
        prompt.len()
    );

    let text = generation_client.generate(&prompt).await.map_err(|e| {
        warn!("Generation failed for {}: {}", user.subject_id, e);
        AppError::from(e)
    })?;

    Ok(HttpResponse::Ok().json(GenerateResponse { text }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{dev::Service as _, http::StatusCode, test, App, HttpMessage};
    use pretty_assertions::assert_eq;

    fn form_json(topic: &str) -> serde_json::Value {
        serde_json::json!({
            "topic": topic,
            "tone": "friendly",
            "keyPoints": ["lower bills"]
        })
    }

    async fn call_generate(
        server: &mockito::ServerGuard,
        body: serde_json::Value,
    ) -> actix_web::dev::ServiceResponse {
        let client = GenerationClient::for_base_url(server.url());

        // The gateway normally attaches the identity; tests inject it with a
        // small wrapper instead.
        let app = test::init_service(
            App::new()
                .wrap_fn(|req, srv| {
                    req.extensions_mut().insert(AuthenticatedUser {
                        subject_id: "user-42".to_string(),
                        external_id: "user-42@idp.example.com".to_string(),
                    });
                    srv.call(req)
                })
                .app_data(web::Data::new(client))
                .service(generate_content),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/generate")
            .set_json(body)
            .to_request();
        test::call_service(&app, req).await
    }

    #[actix_web::test]
    async fn returns_the_generated_text_for_a_valid_form() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/generations")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"Shine brighter with solar."}"#)
            .create_async()
            .await;

        let res = call_generate(&server, form_json("solar panels")).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: GenerateResponse = test::read_body_json(res).await;
        assert_eq!(body.text, "Shine brighter with solar.");
    }

    #[actix_web::test]
    async fn a_blank_topic_is_a_validation_error() {
        let server = mockito::Server::new_async().await;
        let res = call_generate(&server, form_json("   ")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn upstream_throttling_maps_to_a_gateway_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/generations")
            .with_status(429)
            .create_async()
            .await;

        let res = call_generate(&server, form_json("solar panels")).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }
}
