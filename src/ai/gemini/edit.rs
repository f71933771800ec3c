use super::client::GeminiHttpClient;
use super::types::{Content, Part};
use crate::ai::PhotoEditService;
use crate::models::EncodedImage;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct EditRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: EditGenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EditGenerationConfig {
    response_modalities: Vec<String>,
}

pub struct GeminiEditClient {
    http: GeminiHttpClient,
}

impl GeminiEditClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(
                api_key,
                model,
                Duration::from_secs(120),
                client,
            ),
        }
    }
}

super::impl_with_gemini_base_url!(GeminiEditClient);

#[async_trait]
impl PhotoEditService for GeminiEditClient {
    async fn edit_photo(&self, image: &EncodedImage, prompt: &str) -> Result<EncodedImage> {
        tracing::debug!(
            "Requesting edit of {} image ({} base64 chars) from {}",
            image.mime_type,
            image.data.len(),
            self.http.model()
        );

        let request = EditRequest {
            contents: vec![Content::user(vec![
                Part::image(image),
                Part::text(prompts::render(
                    prompts::EDIT_INSTRUCTION,
                    &[("prompt", prompt)],
                )),
            ])],
            generation_config: EditGenerationConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        };

        let candidate = self.http.first_candidate(&request).await?;

        let inline_data = candidate
            .parts()
            .iter()
            .find_map(|p| match p {
                Part::InlineData { inline_data } => Some(inline_data),
                Part::Text { .. } | Part::Other(_) => None,
            })
            .ok_or_else(|| {
                let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
                Error::AiProvider(format!(
                    "No image data in Gemini response (finish reason: {})",
                    reason
                ))
            })?;

        tracing::debug!(
            "Gemini returned edited image with mime_type: {}",
            inline_data.mime_type
        );

        let edited = EncodedImage::new(inline_data.data.clone(), inline_data.mime_type.clone());
        edited.decode().map_err(|e| {
            Error::AiProvider(format!("Failed to decode Gemini base64 image: {}", e))
        })?;

        Ok(edited)
    }
}
