use wasm_bindgen::prelude::*;

pub mod compress;
pub mod crop;
pub mod encoder;
pub mod error;
pub mod progress;
pub mod search;
pub mod session;
pub mod size;
pub mod source;

pub use compress::{compress, CompressionOutcome, DOWNLOAD_FILE_NAME};
pub use crop::{crop, AspectRatio, CropBox};
pub use encoder::{EncodeResult, Encoder, JpegSurfaceEncoder, Surface};
pub use error::{CompressError, Result};
pub use progress::{progress_percent, Progress};
pub use search::{CancelToken, SearchOptions, SearchReport, Strategy};
pub use session::{CropPreview, RunHandle, Session};
pub use size::{format_size, TargetSize};
pub use source::SourceImage;

/// Crop box used when the caller only picks an aspect ratio.
pub fn default_crop(width: u32, height: u32, aspect: AspectRatio) -> CropBox {
    match aspect {
        AspectRatio::Free => CropBox::full(width, height),
        _ => CropBox::auto(width, height, aspect),
    }
}

#[wasm_bindgen]
pub fn compress_image(
    input: &[u8],
    mime: &str,
    target_kb: i32,
    method: &str,
    aspect: &str,
    on_progress: Option<js_sys::Function>,
) -> std::result::Result<Vec<u8>, JsError> {
    let target = TargetSize::from_kb(target_kb as i64)?;
    let strategy: Strategy = method.parse()?;
    let aspect: AspectRatio = aspect.parse()?;

    let source = SourceImage::from_bytes(input, Some(mime))?;
    let (width, height) = source.dimensions();
    let surface = crop(source.surface(), &default_crop(width, height, aspect))?;

    // No sleeping on the main thread of the page
    let options = SearchOptions::immediate();
    let outcome = compress(
        &JpegSurfaceEncoder,
        &surface,
        source.original_size(),
        target,
        strategy,
        &options,
        &mut |p| {
            let status = p.status();
            web_sys::console::log_1(&status.clone().into());
            if let Some(callback) = &on_progress {
                if let Err(err) = callback.call2(
                    &JsValue::NULL,
                    &JsValue::from(p.percent()),
                    &JsValue::from_str(&status),
                ) {
                    web_sys::console::error_1(&err);
                }
            }
        },
    )
    .map_err(|e| JsError::new(&format!("Compression failed: {}", e)))?;

    Ok(outcome.blob)
}

#[wasm_bindgen]
pub fn format_file_size(bytes: f64) -> String {
    format_size(bytes.max(0.0) as u64)
}
