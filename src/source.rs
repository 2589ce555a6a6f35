use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::encoder::Surface;
use crate::error::{CompressError, Result};
use crate::size::format_size;

lazy_static! {
    static ref IMAGE_MIME: Regex = Regex::new(r"(?i)^image/[a-z0-9.+-]+$").unwrap();
}

pub fn is_image_mime(mime: &str) -> bool {
    IMAGE_MIME.is_match(mime.trim())
}

/// The uploaded file, checked and decoded.
#[derive(Debug, Clone)]
pub struct SourceImage {
    mime: String,
    original_size: u64,
    surface: Arc<Surface>,
}

impl SourceImage {
    /// Validates and decodes `bytes`. Without a declared MIME type the
    /// type is sniffed from the content.
    pub fn from_bytes(bytes: &[u8], declared_mime: Option<&str>) -> Result<Self> {
        let mime = match declared_mime {
            Some(m) if !m.trim().is_empty() => m.trim().to_string(),
            _ => image::guess_format(bytes)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
        };
        if !is_image_mime(&mime) {
            return Err(CompressError::NotAnImage(mime));
        }

        let surface = image::load_from_memory(bytes).map_err(CompressError::Decode)?;
        debug!(
            "loaded {} image {}x{}, {}",
            mime,
            surface.width(),
            surface.height(),
            format_size(bytes.len() as u64)
        );

        Ok(Self {
            mime,
            original_size: bytes.len() as u64,
            surface: Arc::new(surface),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, None)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// The decoded pixels without copying them.
    pub fn shared_surface(&self) -> Arc<Surface> {
        Arc::clone(&self.surface)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.surface.width(), self.surface.height())
    }
}
