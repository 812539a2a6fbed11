//! Averager Rust Extensions
//!
//! High-performance adaptive color averaging implemented in Rust
//! with Python bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Image Format
//! The filter supports multiple channel configurations:
//! - **Grayscale**: (height, width, 1) - single channel
//! - **Grayscale + alpha**: (height, width, 2) - single channel + alpha
//! - **RGB**: (height, width, 3) - 3 color channels
//! - **RGBA**: (height, width, 4) - 3 color channels + alpha
//!
//! Both bit depths are supported:
//! - `u8`: 8-bit per channel (0-255)
//! - `u16`: 16-bit per channel (0-65535)
//!
//! Channel count is inferred from input array dimensions. Thresholds are
//! plain numbers in the same units as channel values; callers working with
//! 16-bit data rescale their thresholds first (see `scale_threshold`).
//!
//! ## Filter Architecture
//! The filter is a pure in-memory transform: it reads a caller-owned pixel
//! buffer, runs a row-wise then a column-wise adaptive averaging pass, and
//! returns a freshly allocated buffer of identical shape. Decoding, encoding
//! and any UI wiring belong to the host application.

pub mod filters;

#[cfg(feature = "wasm")]
pub mod wasm;

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::filters::average::{
        average_u16, average_u8, scale_threshold as scale_threshold_impl,
    };

    /// Average runs of similar pixels row-wise, then column-wise (8-bit).
    ///
    /// Each scan line keeps an averaging run going until some color channel
    /// of the next pixel deviates from the running average by more than the
    /// threshold; the finished run is flushed to its truncated average and
    /// the deviating pixel starts the next run.
    ///
    /// # Arguments
    /// * `image` - Input image (1, 2, 3, or 4 channels)
    /// * `threshold_x` - Row-pass threshold (0-255)
    /// * `threshold_y` - Column-pass threshold (0-255)
    /// * `wrap_around` - Treat the image as cyclic instead of repeating edges
    /// * `keep_alpha` - Restore the source alpha channel verbatim
    #[pyfunction]
    #[pyo3(signature = (image, threshold_x, threshold_y, wrap_around=false, keep_alpha=false))]
    pub fn average<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        threshold_x: u8,
        threshold_y: u8,
        wrap_around: bool,
        keep_alpha: bool,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let input = image.as_array();
        let result = average_u8(input, threshold_x, threshold_y, wrap_around, keep_alpha)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(result.into_pyarray(py))
    }

    /// Average runs of similar pixels row-wise, then column-wise (16-bit).
    ///
    /// Thresholds are in 16-bit channel units; use `scale_threshold` to map
    /// a 0-255 threshold to a wider color depth.
    #[pyfunction]
    #[pyo3(signature = (image, threshold_x, threshold_y, wrap_around=false, keep_alpha=false))]
    pub fn average_16bit<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u16>,
        threshold_x: u16,
        threshold_y: u16,
        wrap_around: bool,
        keep_alpha: bool,
    ) -> PyResult<Bound<'py, PyArray3<u16>>> {
        let input = image.as_array();
        let result = average_u16(input, threshold_x, threshold_y, wrap_around, keep_alpha)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(result.into_pyarray(py))
    }

    /// Rescale an 8-bit threshold to an image's color depth:
    /// `maxcolors * threshold // 255`.
    #[pyfunction]
    pub fn scale_threshold(threshold: u16, maxcolors: u16) -> u16 {
        scale_threshold_impl(threshold, maxcolors)
    }

    /// Averager Rust extension module
    #[pymodule]
    pub fn averager_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(average, m)?)?;
        m.add_function(wrap_pyfunction!(average_16bit, m)?)?;
        m.add_function(wrap_pyfunction!(scale_threshold, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::averager_rust;
