// Utility functions for the CLI

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Largest profile picture the backend accepts
pub const MAX_PICTURE_BYTES: usize = 5 * 1024 * 1024;

/// Image mime type for a file name, judged by its extension
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// An image file ready for upload
pub struct PictureFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Read a profile picture from disk, refusing non-images and oversized files
pub async fn read_picture(path: &Path) -> Result<PictureFile> {
    let Some(mime_type) = image_mime_type(path) else {
        bail!("Please upload an image file (png, jpg, gif, webp or svg)");
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() > MAX_PICTURE_BYTES {
        bail!("Image size should be less than 5MB");
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picture".to_string());

    Ok(PictureFile {
        file_name,
        mime_type,
        bytes,
    })
}
