use super::{PhotoDescriptionService, PhotoEditService};
use crate::models::EncodedImage;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Tiny valid PNG used when no edit response is configured.
const MOCK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Holds a mock call open until the test releases it.
#[derive(Default)]
pub struct CallGate {
    started: Notify,
    release: Notify,
}

impl CallGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Resolves once a gated call has begun.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Lets one gated call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

/// Canned responses cycled in order, shared between clones.
struct Script<T> {
    responses: Arc<Mutex<Vec<std::result::Result<T, String>>>>,
    call_count: Arc<Mutex<usize>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    fn push(&self, response: std::result::Result<T, String>) {
        self.responses.lock().unwrap().push(response);
    }

    /// Records a call and returns its 1-based index.
    fn record_call(&self) -> usize {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        *count
    }

    fn response_for(&self, call: usize) -> Option<Result<T>> {
        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return None;
        }
        let index = (call - 1) % responses.len();
        Some(responses[index].clone().map_err(Error::AiProvider))
    }

    fn count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl<T> Clone for Script<T> {
    fn clone(&self) -> Self {
        Self {
            responses: Arc::clone(&self.responses),
            call_count: Arc::clone(&self.call_count),
        }
    }
}

#[derive(Clone)]
pub struct MockPhotoEditClient {
    script: Script<EncodedImage>,
    prompts: Arc<Mutex<Vec<String>>>,
    gate: Option<Arc<CallGate>>,
}

impl MockPhotoEditClient {
    pub fn new() -> Self {
        Self {
            script: Script::new(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            gate: None,
        }
    }

    pub fn with_image_response(self, response: EncodedImage) -> Self {
        self.script.push(Ok(response));
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.script.push(Err(message.to_string()));
        self
    }

    pub fn with_gate(mut self, gate: Arc<CallGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.script.count()
    }

    /// Prompts received so far, in call order.
    pub fn received_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockPhotoEditClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhotoEditService for MockPhotoEditClient {
    async fn edit_photo(&self, _image: &EncodedImage, prompt: &str) -> Result<EncodedImage> {
        let call = self.script.record_call();
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        self.script.response_for(call).unwrap_or_else(|| {
            use base64::Engine as _;
            Ok(EncodedImage::new(
                base64::engine::general_purpose::STANDARD.encode(MOCK_PNG),
                "image/png".to_string(),
            ))
        })
    }
}

#[derive(Clone)]
pub struct MockPhotoDescriptionClient {
    script: Script<String>,
    gate: Option<Arc<CallGate>>,
}

impl MockPhotoDescriptionClient {
    pub fn new() -> Self {
        Self {
            script: Script::new(),
            gate: None,
        }
    }

    pub fn with_description_response(self, response: String) -> Self {
        self.script.push(Ok(response));
        self
    }

    pub fn with_failure(self, message: &str) -> Self {
        self.script.push(Err(message.to_string()));
        self
    }

    pub fn with_gate(mut self, gate: Arc<CallGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.script.count()
    }
}

impl Default for MockPhotoDescriptionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhotoDescriptionService for MockPhotoDescriptionClient {
    async fn describe_photo(&self, image: &EncodedImage) -> Result<String> {
        let call = self.script.record_call();

        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        self.script.response_for(call).unwrap_or_else(|| {
            Ok(format!(
                "A mock architectural analysis of a {} image",
                image.mime_type
            ))
        })
    }
}
