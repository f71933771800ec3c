//! Turns a user-selected file into a transportable base64 payload.

use crate::ai::mime;
use crate::models::EncodedImage;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// A file the user picked, with the media type it claims to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub declared_type: String,
}

impl SelectedFile {
    /// Selects `path`, deriving its declared type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let declared_type = mime::declared_type(&path);
        Self {
            path,
            declared_type,
        }
    }

    pub fn with_declared_type(path: impl AsRef<Path>, declared_type: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            declared_type: declared_type.to_string(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.declared_type.starts_with("image/")
    }
}

/// Reads the file and encodes its bytes as standard base64.
pub async fn encode_file(file: &SelectedFile) -> Result<EncodedImage> {
    let bytes = tokio::fs::read(&file.path).await.map_err(|source| Error::Read {
        path: file.path.clone(),
        source,
    })?;

    tracing::debug!(
        "Encoding {} ({} bytes, {})",
        file.path.display(),
        bytes.len(),
        file.declared_type
    );

    use base64::Engine as _;
    Ok(EncodedImage::new(
        base64::engine::general_purpose::STANDARD.encode(&bytes),
        file.declared_type.clone(),
    ))
}
