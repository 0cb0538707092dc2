//! Frame decoding and PNG encoding.

use std::io::Cursor;

use anyhow::Context;
use image::{ImageFormat, RgbaImage};
use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::CaptureFrame;

/// Decode frame `index` of a bracket into RGBA pixels.
///
/// An empty payload or undecodable bytes fail with `CaptureBufferInvalid`.
pub fn decode_frame(index: usize, frame: &CaptureFrame) -> StackResult<RgbaImage> {
    if frame.is_empty() {
        return Err(StackError::buffer_invalid(index, "capture buffer is empty"));
    }
    let decoded = image::load_from_memory(&frame.image_bytes)
        .map_err(|e| StackError::buffer_invalid(index, e.to_string()))?;
    Ok(decoded.to_rgba8())
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> StackResult<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(bytes.into_inner())
}
