use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::ImageFormat;
use std::io::Cursor;
use tracing::{info, warn};
use uuid::Uuid;

use crate::infra::storage::ObjectStorage;

/// Dimensions of a derived image rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    /// Optional crop origin, applied only when both are set.
    pub x: Option<u32>,
    pub y: Option<u32>,
}

impl ImageSize {
    pub const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
            x: None,
            y: None,
        }
    }
}

pub const POST_THUMBNAIL: ImageSize = ImageSize::square(400);
pub const AVATAR: ImageSize = ImageSize::square(250);

/// Rewrites an image URL (or storage key) so it addresses a derived
/// rendition, by inserting a transformation segment right after `upload/`:
///
/// `.../upload/a/b.jpg` → `.../upload/x_10,y_20,w_400,h_400,c_thumb/a/b.jpg`
///
/// Values without an `upload/` segment are returned unchanged.
pub fn format_image_url(url: &str, size: ImageSize, thumb: bool) -> String {
    let Some((head, tail)) = url.split_once("upload/") else {
        return url.to_string();
    };

    let mut transformation = String::new();
    if let (Some(x), Some(y)) = (size.x, size.y) {
        transformation.push_str(&format!("x_{},y_{},", x, y));
    }
    transformation.push_str(&format!("w_{},h_{}", size.width, size.height));
    if thumb {
        transformation.push_str(",c_thumb");
    }

    format!("{}upload/{}/{}", head, transformation, tail)
}

/// Undoes [`format_image_url`]: drops the transformation segment after
/// `upload/`, if there is one.
pub fn original_image_url(url: &str) -> String {
    let Some((head, tail)) = url.split_once("upload/") else {
        return url.to_string();
    };
    match tail.split_once('/') {
        Some((segment, rest)) if is_transformation(segment) => format!("{}upload/{}", head, rest),
        _ => url.to_string(),
    }
}

fn is_transformation(segment: &str) -> bool {
    segment.split(',').all(|part| {
        matches!(
            part.split_once('_'),
            Some(("x" | "y" | "w" | "h" | "c", value)) if !value.is_empty()
        )
    })
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub image: String,
    pub thumbnail: String,
}

/// Stores uploaded images together with their thumbnail rendition.
#[derive(Clone)]
pub struct ImageService {
    storage: ObjectStorage,
    max_bytes: usize,
}

impl ImageService {
    pub fn new(storage: ObjectStorage, max_bytes: usize) -> Self {
        Self { storage, max_bytes }
    }

    /// Validates and stores `data`, returning the public URLs of the full
    /// image and of the `size` rendition.
    pub async fn store(&self, owner_id: Uuid, data: Vec<u8>, size: ImageSize) -> Result<StoredImage> {
        if let Some(problem) = self.upload_problem(&data) {
            return Err(anyhow!(problem));
        }

        let format = image::guess_format(&data).map_err(|_| anyhow!("unsupported image format"))?;
        let (extension, content_type) = format_metadata(format)?;

        let key = format!("upload/{}/{}.{}", owner_id, Uuid::new_v4(), extension);
        let thumbnail_key = format_image_url(&key, size, true);

        let (original, thumbnail) = tokio::task::spawn_blocking(move || render_thumbnail(data, format, size))
            .await
            .map_err(|err| anyhow!("thumbnail task failed: {}", err))??;

        self.storage.put_object(&key, content_type, original).await?;
        self.storage
            .put_object(&thumbnail_key, content_type, thumbnail)
            .await?;

        info!(owner_id = %owner_id, key = %key, "stored image");
        Ok(StoredImage {
            image: self.storage.public_url(&key),
            thumbnail: self.storage.public_url(&thumbnail_key),
        })
    }

    pub fn upload_problem(&self, data: &[u8]) -> Option<String> {
        upload_problem(data, self.max_bytes)
    }

    /// Deletes the stored objects behind `urls`. URLs outside our storage
    /// are skipped and failures are only logged.
    pub async fn discard(&self, urls: &[&str]) {
        for url in urls {
            let Some(key) = self.storage.key_for_url(url) else {
                continue;
            };
            if let Err(err) = self.storage.delete_object(key).await {
                warn!(error = ?err, key = %key, "failed to delete stored image");
            }
        }
    }

    /// Deletes a stored image from its thumbnail URL, full image included.
    pub async fn discard_with_original(&self, thumbnail_url: &str) {
        let original = original_image_url(thumbnail_url);
        self.discard(&[thumbnail_url, original.as_str()]).await;
    }
}

/// Describes why `data` cannot be accepted as an upload, if it cannot.
fn upload_problem(data: &[u8], max_bytes: usize) -> Option<String> {
    if data.is_empty() {
        return Some("Please provide the image to upload.".to_string());
    }
    if data.len() > max_bytes {
        return Some(format!("Images may be at most {} bytes.", max_bytes));
    }
    match image::guess_format(data) {
        Ok(format) if format_metadata(format).is_ok() => None,
        _ => Some("Only JPEG, PNG and WebP images are supported.".to_string()),
    }
}

fn format_metadata(format: ImageFormat) -> Result<(&'static str, &'static str)> {
    match format {
        ImageFormat::Jpeg => Ok(("jpg", "image/jpeg")),
        ImageFormat::Png => Ok(("png", "image/png")),
        ImageFormat::WebP => Ok(("webp", "image/webp")),
        _ => Err(anyhow!("unsupported image format")),
    }
}

fn render_thumbnail(data: Vec<u8>, format: ImageFormat, size: ImageSize) -> Result<(Vec<u8>, Vec<u8>)> {
    let decoded = image::load_from_memory_with_format(&data, format)
        .map_err(|err| anyhow!("failed to decode image: {}", err))?;
    let thumbnail = decoded.resize_to_fill(size.width, size.height, FilterType::Triangle);

    let mut encoded = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut encoded, format)
        .map_err(|err| anyhow!("failed to encode thumbnail: {}", err))?;
    Ok((data, encoded.into_inner()))
}
