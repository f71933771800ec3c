//! Data models and configuration
//!
//! Defines the encoded image payloads passed between the encoder, the
//! controller and the remote services, plus environment configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub const DEFAULT_EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_DESCRIBE_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Base64 image content paired with its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    pub fn new(data: String, mime_type: String) -> Self {
        Self { data, mime_type }
    }

    /// Approximate size of the decoded bytes.
    pub fn decoded_len(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        (self.data.len() / 4 * 3).saturating_sub(padding)
    }

    pub fn decode(&self) -> crate::Result<Vec<u8>> {
        use base64::Engine as _;
        Ok(base64::engine::general_purpose::STANDARD.decode(&self.data)?)
    }
}

/// The photograph currently loaded into the session.
///
/// `id` is fresh for every upload, so responses issued against an earlier
/// upload can be recognised when they land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub id: Uuid,
    pub encoded: EncodedImage,
}

impl UploadedImage {
    pub fn new(encoded: EncodedImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            encoded,
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub edit_model: String,
    pub describe_model: String,
    pub gemini_base_url: String,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .ok_or_else(|| crate::Error::Config("GEMINI_API_KEY not set".to_string()))?;

        Ok(Self {
            gemini_api_key,
            edit_model: non_empty("GEMINI_EDIT_MODEL")
                .unwrap_or_else(|| DEFAULT_EDIT_MODEL.to_string()),
            describe_model: non_empty("GEMINI_DESCRIBE_MODEL")
                .unwrap_or_else(|| DEFAULT_DESCRIBE_MODEL.to_string()),
            gemini_base_url: non_empty("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            output_dir: non_empty("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
        })
    }
}
