use std::path::Path;

use anyhow::Context;
use image::RgbaImage;

use crate::state::ImageKey;

static SUPPORTED_IMAGE_EXTS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif", "ico", "tga",
];

/// A decoded image ready to be handed to the session.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub key: ImageKey,
    pub name: String,
    pub pixels: RgbaImage,
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

/// Returns `true` if the path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

/// Decodes `bytes` if they hold an image.
///
/// Content that is not recognisably an image yields `Ok(None)`; a file that
/// looks like an image but fails to decode is an error.
pub fn decode(name: &str, bytes: &[u8]) -> anyhow::Result<Option<LoadedImage>> {
    let Ok(format) = image::guess_format(bytes) else {
        tracing::debug!(name, "ignoring non-image input");
        return Ok(None);
    };
    let pixels = image::load_from_memory_with_format(bytes, format)
        .with_context(|| format!("decode failed for {}", name))?
        .into_rgba8();
    Ok(Some(LoadedImage {
        key: ImageKey::from_bytes(bytes),
        name: name.to_string(),
        pixels,
    }))
}

/// Reads and decodes the file at `path`, skipping unsupported extensions.
pub fn open(path: &Path) -> anyhow::Result<Option<LoadedImage>> {
    if !is_supported_image(path) {
        tracing::debug!(path = %path.display(), "ignoring unsupported file");
        return Ok(None);
    }
    let bytes = std::fs::read(path).with_context(|| format!("read failed for {}", path.display()))?;
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    decode(&name, &bytes)
}
