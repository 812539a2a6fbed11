//! WebAssembly exports for the Averager filter.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! ## Bit Depth Support
//!
//! The filter has two versions:
//! - **u8**: 8-bit per channel (0-255), standard for web/display
//! - **u16**: 16-bit per channel (0-65535), for high-depth sources
//!
//! Both versions use identical Rust implementations.

use ndarray::Array3;
use wasm_bindgen::prelude::*;

use crate::filters::average::{average_u16, average_u8};

// ============================================================================
// Adaptive averaging - u8 (8-bit)
// ============================================================================

/// Average runs of similar pixels row-wise, then column-wise.
///
/// # Arguments
/// * `data` - Flat array of channel bytes (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - Channels per pixel (1, 2, 3, or 4)
/// * `threshold_x` - Row-pass threshold (0-255)
/// * `threshold_y` - Column-pass threshold (0-255)
/// * `wrap_around` - Treat the image as cyclic instead of repeating edges
/// * `keep_alpha` - Restore the source alpha channel verbatim
///
/// # Returns
/// Flat array of channel bytes with runs averaged
#[wasm_bindgen]
pub fn average_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    threshold_x: u8,
    threshold_y: u8,
    wrap_around: bool,
    keep_alpha: bool,
) -> Result<Vec<u8>, JsError> {
    let input = Array3::from_shape_vec((height, width, channels), data.to_vec())
        .map_err(|e| JsError::new(&e.to_string()))?;

    let result = average_u8(
        input.view(),
        threshold_x,
        threshold_y,
        wrap_around,
        keep_alpha,
    )
    .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(result.into_raw_vec_and_offset().0)
}

// ============================================================================
// Adaptive averaging - u16 (16-bit)
// ============================================================================

/// Average runs of similar pixels row-wise, then column-wise (16-bit).
///
/// # Arguments
/// * `data` - Flat array of channel values (length = width * height * channels)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `channels` - Channels per pixel (1, 2, 3, or 4)
/// * `threshold_x` - Row-pass threshold (0-65535)
/// * `threshold_y` - Column-pass threshold (0-65535)
/// * `wrap_around` - Treat the image as cyclic instead of repeating edges
/// * `keep_alpha` - Restore the source alpha channel verbatim
///
/// # Returns
/// Flat array of channel values with runs averaged
#[wasm_bindgen]
pub fn average_16bit_wasm(
    data: &[u16],
    width: usize,
    height: usize,
    channels: usize,
    threshold_x: u16,
    threshold_y: u16,
    wrap_around: bool,
    keep_alpha: bool,
) -> Result<Vec<u16>, JsError> {
    let input = Array3::from_shape_vec((height, width, channels), data.to_vec())
        .map_err(|e| JsError::new(&e.to_string()))?;

    let result = average_u16(
        input.view(),
        threshold_x,
        threshold_y,
        wrap_around,
        keep_alpha,
    )
    .map_err(|e| JsError::new(&e.to_string()))?;
    Ok(result.into_raw_vec_and_offset().0)
}
