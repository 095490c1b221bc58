//! Image upload route handler.
//!
//! Accepts multipart form data with an `image` field, stores the file under
//! the configured upload directory with a random hex name, and returns the
//! public path. The directory is served at `/uploads` by the main router.

use std::path::Path;

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use rand::RngCore;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::middleware::CurrentAdmin;
use crate::state::AppState;

/// File extensions accepted for product images.
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Pick a random 32-hex-character filename, preserving the extension.
fn random_file_name(extension: &str) -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}.{extension}", hex::encode(bytes))
}

/// Validate and normalize the uploaded file's extension.
fn image_extension(file_name: &str) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| AppError::Validation("Images only (jpg, jpeg, png, webp)".to_owned()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(
            "Images only (jpg, jpeg, png, webp)".to_owned(),
        ));
    }

    Ok(extension)
}

/// POST /api/products/uploads - Store a product image (admin).
pub async fn upload_image(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let extension = image_extension(&file_name)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(AppError::Validation("Please upload an image".to_owned()));
        }

        let name = random_file_name(&extension);
        let path = state.config().upload_dir.join(&name);

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::Internal(format!("failed to store upload: {e}")))?;

        tracing::info!(file = %name, size = data.len(), "image uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": "Image uploaded successfully",
                "image": format!("/uploads/{name}"),
            })),
        ));
    }

    Err(AppError::Validation("Please upload an image".to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_image_extensions() {
        assert_eq!(image_extension("photo.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("a.b.png").unwrap(), "png");
        assert_eq!(image_extension("pic.webp").unwrap(), "webp");
    }

    #[test]
    fn rejects_other_extensions() {
        assert!(image_extension("script.sh").is_err());
        assert!(image_extension("archive.tar.gz").is_err());
        assert!(image_extension("no-extension").is_err());
    }

    #[test]
    fn random_names_keep_extension_and_differ() {
        let a = random_file_name("png");
        let b = random_file_name("png");

        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), 32 + 4);
        assert_ne!(a, b);
    }
}
