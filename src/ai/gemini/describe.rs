use super::client::GeminiHttpClient;
use super::types::{Content, Part};
use crate::ai::PhotoDescriptionService;
use crate::models::EncodedImage;
use crate::{prompts, Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct DescribeRequest {
    contents: Vec<Content>,
}

pub struct GeminiDescriptionClient {
    http: GeminiHttpClient,
}

impl GeminiDescriptionClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(
                api_key,
                model,
                Duration::from_secs(60),
                client,
            ),
        }
    }
}

super::impl_with_gemini_base_url!(GeminiDescriptionClient);

#[async_trait]
impl PhotoDescriptionService for GeminiDescriptionClient {
    async fn describe_photo(&self, image: &EncodedImage) -> Result<String> {
        tracing::debug!(
            "Requesting architectural analysis of {} image from {}",
            image.mime_type,
            self.http.model()
        );

        let request = DescribeRequest {
            contents: vec![Content::user(vec![
                Part::image(image),
                Part::text(prompts::DESCRIBE_ARCHITECTURE),
            ])],
        };

        let candidate = self.http.first_candidate(&request).await?;

        let text: String = candidate
            .parts()
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } | Part::Other(_) => None,
            })
            .collect();

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::AiProvider(
                "No text in Gemini description response".to_string(),
            ));
        }

        Ok(text.to_string())
    }
}
