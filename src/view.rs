//! Terminal presentation derived purely from [`AppState`].

use crate::controller::AppState;
use crate::models::EncodedImage;

pub const ORIGINAL_TITLE: &str = "Original Photo";
pub const EDITED_TITLE: &str = "Edited Photo";
pub const ANALYSIS_TITLE: &str = "Architectural Analysis";
pub const ANALYSIS_PLACEHOLDER: &str =
    "Analysis will appear here after clicking \"Analyze Architecture\".";
pub const UPLOAD_HINT: &str = "Use `open <path>` to upload a photo (PNG, JPG, GIF or WEBP)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelContent {
    Loading,
    Image { mime_type: String, bytes: usize },
    Uploader,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePanel {
    pub title: &'static str,
    pub content: PanelContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionContent {
    Loading,
    Text(String),
    Placeholder,
}

/// Everything the terminal shows for one state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub error_banner: Option<String>,
    pub original: ImagePanel,
    pub edited: ImagePanel,
    pub prompt: String,
    pub edit_button: Button,
    pub describe_button: Button,
    pub description: DescriptionContent,
}

fn image_content(
    image: Option<&EncodedImage>,
    loading: bool,
    fallback: PanelContent,
) -> PanelContent {
    if loading {
        return PanelContent::Loading;
    }
    match image {
        Some(image) => PanelContent::Image {
            mime_type: image.mime_type.clone(),
            bytes: image.decoded_len(),
        },
        None => fallback,
    }
}

impl ViewModel {
    pub fn from_state(state: &AppState) -> Self {
        let triggers_enabled = state.original_image.is_some() && !state.is_busy();

        let description = if state.is_describing {
            DescriptionContent::Loading
        } else {
            match &state.description {
                Some(text) => DescriptionContent::Text(text.clone()),
                None => DescriptionContent::Placeholder,
            }
        };

        Self {
            error_banner: state.error.clone(),
            original: ImagePanel {
                title: ORIGINAL_TITLE,
                content: image_content(
                    state.original_image.as_ref().map(|image| &image.encoded),
                    false,
                    PanelContent::Uploader,
                ),
            },
            edited: ImagePanel {
                title: EDITED_TITLE,
                content: image_content(
                    state.edited_image.as_ref(),
                    state.is_editing,
                    PanelContent::Empty,
                ),
            },
            prompt: state.prompt.clone(),
            edit_button: Button {
                label: if state.is_editing {
                    "Editing..."
                } else {
                    "Edit Photo"
                },
                enabled: triggers_enabled,
            },
            describe_button: Button {
                label: if state.is_describing {
                    "Analyzing..."
                } else {
                    "Analyze Architecture"
                },
                enabled: triggers_enabled,
            },
            description,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(error) = &self.error_banner {
            out.push_str(&format!("Error: {}\n\n", error));
        }

        for panel in [&self.original, &self.edited] {
            let body = match &panel.content {
                PanelContent::Loading => "Loading...".to_string(),
                PanelContent::Image { mime_type, bytes } => {
                    format!("[{} image, {}]", mime_type, format_size(*bytes))
                }
                PanelContent::Uploader => UPLOAD_HINT.to_string(),
                PanelContent::Empty => "No image".to_string(),
            };
            out.push_str(&format!("== {} ==\n{}\n\n", panel.title, body));
        }

        out.push_str(&format!("Edit Prompt: {}\n", self.prompt));
        for button in [&self.edit_button, &self.describe_button] {
            let marker = if button.enabled { ' ' } else { 'x' };
            out.push_str(&format!("[{}] {}\n", marker, button.label));
        }
        out.push('\n');

        let analysis = match &self.description {
            DescriptionContent::Loading => "Loading...",
            DescriptionContent::Text(text) => text.as_str(),
            DescriptionContent::Placeholder => ANALYSIS_PLACEHOLDER,
        };
        out.push_str(&format!("== {} ==\n{}\n", ANALYSIS_TITLE, analysis));

        out
    }
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
