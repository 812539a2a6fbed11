//! Adaptive averaging filter: run-length color flattening.
//!
//! Averages pixels along each row until the next pixel differs from the
//! running average by more than a threshold, then repeats the same along
//! each column. Smooth image areas collapse to flat color while detailed
//! edges between them survive untouched.
//!
//! ## Supported Formats
//!
//! All entry points accept images with 1, 2, 3, or 4 channels:
//! - **Grayscale**: (height, width, 1) - single luminance channel
//! - **Grayscale + alpha**: (height, width, 2) - luminance, alpha
//! - **RGB**: (height, width, 3) - 3 color channels
//! - **RGBA**: (height, width, 4) - 3 color channels + alpha
//!
//! Alpha, when present, is averaged along with the run but never takes part
//! in the threshold comparison. Channel values are plain integers; the
//! filter applies thresholds exactly as given, without rescaling for bit
//! depth, and all averaging uses truncating integer division.

use log::debug;
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use rayon::prelude::*;
use thiserror::Error;

/// Failures detected at the filter boundary. The filter performs no I/O and
/// has no transient failure modes; every error here is a caller error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// Zero-sized image buffer.
    #[error("invalid image dimensions {height}x{width}: both must be non-zero")]
    InvalidDimensions { height: usize, width: usize },
    /// Channel count outside 1..=4.
    #[error("unsupported channel count {0}: expected 1 (L), 2 (LA), 3 (RGB) or 4 (RGBA)")]
    UnsupportedChannelCount(usize),
}

// ============================================================================
// Edge handling
// ============================================================================

/// Out-of-range coordinate policy, applied to both passes of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// Saturate to the nearest valid edge index (repeat edge).
    Clamp,
    /// Treat the lane as cyclic (modulo indexing).
    Wrap,
}

impl EdgeMode {
    /// Map a possibly out-of-range index to a valid index into a lane of
    /// `len` elements. `len` must be non-zero.
    #[inline]
    pub fn resolve(self, index: isize, len: usize) -> usize {
        match self {
            EdgeMode::Clamp => index.clamp(0, len as isize - 1) as usize,
            EdgeMode::Wrap => index.rem_euclid(len as isize) as usize,
        }
    }

    /// Extra scan length past the lane end. Wrap mode scans one full extra
    /// lap so a run crossing the edge still meets a breach that closes it;
    /// clamp mode never reads past the end and needs none.
    #[inline]
    fn overhead(self, len: usize) -> usize {
        match self {
            EdgeMode::Clamp => 0,
            EdgeMode::Wrap => len,
        }
    }
}

// ============================================================================
// Averaging scan
// ============================================================================

/// Channel sample depth the filter operates on. Accumulation always happens
/// in u64, which cannot overflow for any realistic image: 16-bit samples
/// summed over at most two laps of a lane.
trait Sample: Copy + Send + Sync {
    const ZERO: Self;
    fn widen(self) -> u64;
    fn narrow(value: u64) -> Self;
}

impl Sample for u8 {
    const ZERO: Self = 0;
    fn widen(self) -> u64 {
        u64::from(self)
    }
    fn narrow(value: u64) -> Self {
        value as u8
    }
}

impl Sample for u16 {
    const ZERO: Self = 0;
    fn widen(self) -> u64 {
        u64::from(self)
    }
    fn narrow(value: u64) -> Self {
        value as u16
    }
}

/// Accumulator for the run currently being averaged. Local to one lane scan,
/// reseeded from the breaching pixel on every flush.
struct RunState {
    start: usize,
    count: u64,
    sum: [u64; 4],
    pixel: [u64; 4],
}

impl RunState {
    fn seeded(pixel: [u64; 4], start: usize) -> Self {
        RunState {
            start,
            count: 1,
            sum: pixel,
            pixel,
        }
    }
}

/// Channels taking part in the breach test: all of them for L and RGB, all
/// but the last for LA and RGBA.
#[inline]
fn color_channel_count(channels: usize) -> usize {
    if channels == 1 || channels == 3 {
        channels
    } else {
        (channels - 1).min(3)
    }
}

#[inline]
fn read_pixel<T: Sample>(lane: &ArrayView2<T>, index: usize, channels: usize) -> [u64; 4] {
    let mut pixel = [0u64; 4];
    for c in 0..channels {
        pixel[c] = lane[[index, c]].widen();
    }
    pixel
}

/// Scan one lane (a row or a column), averaging runs of similar pixels.
///
/// `src` and `dst` are (length, channels) views of identical shape. The run
/// grows while every color channel of the newly read pixel stays within
/// `threshold` of the running average; the pixel read on the previous step
/// joins the sum before the new one is read, so a pixel never weighs in on
/// the average it is tested against. On breach the finished run is flushed
/// to its truncated per-channel average, excluding the breaching pixel,
/// which seeds the next run. The current pixel is always written literally
/// at its own position, so a run still open when the scan ends stays as
/// per-pixel copies.
fn average_lane<T: Sample>(
    src: ArrayView2<T>,
    mut dst: ArrayViewMut2<T>,
    threshold: u64,
    edge: EdgeMode,
) {
    let (len, channels) = src.dim();
    let colors = color_channel_count(channels);

    let mut run = RunState::seeded(read_pixel(&src, 0, channels), 0);
    for x in 0..len + edge.overhead(len) {
        run.count += 1;
        for c in 0..channels {
            run.sum[c] += run.pixel[c];
        }
        let xi = edge.resolve(x as isize, len);
        run.pixel = read_pixel(&src, xi, channels);

        // |pixel - sum / count| > threshold on any color channel, compared
        // exactly via cross-multiplication.
        let breach = (0..colors)
            .any(|c| (run.pixel[c] * run.count).abs_diff(run.sum[c]) > threshold * run.count);
        if breach {
            let mut average = [T::ZERO; 4];
            for c in 0..channels {
                average[c] = T::narrow(run.sum[c] / run.count);
            }
            for i in run.start..x {
                let ii = edge.resolve(i as isize, len);
                for c in 0..channels {
                    dst[[ii, c]] = average[c];
                }
            }
            run = RunState::seeded(run.pixel, x);
        }
        for c in 0..channels {
            dst[[xi, c]] = T::narrow(run.pixel[c]);
        }
    }
}

// ============================================================================
// Two-pass driver
// ============================================================================

fn average_impl<T: Sample>(
    input: ArrayView3<T>,
    threshold_x: u64,
    threshold_y: u64,
    edge: EdgeMode,
    keep_alpha: bool,
) -> Result<Array3<T>, FilterError> {
    let (height, width, channels) = input.dim();
    if height == 0 || width == 0 {
        return Err(FilterError::InvalidDimensions { height, width });
    }
    if channels == 0 || channels > 4 {
        return Err(FilterError::UnsupportedChannelCount(channels));
    }

    debug!(
        "averaging {height}x{width} image, {channels} channel(s), \
         thresholds {threshold_x}/{threshold_y}, {edge:?} edges"
    );

    // Horizontal pass: rows are independent, one worker per row.
    let mut intermediate = Array3::from_elem((height, width, channels), T::ZERO);
    intermediate
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(y, row)| average_lane(input.index_axis(Axis(0), y), row, threshold_x, edge));

    // Vertical pass over the horizontal result, one worker per column. Must
    // not start until the horizontal pass has fully written its buffer.
    let intermediate = intermediate.view();
    let mut result = Array3::from_elem((height, width, channels), T::ZERO);
    result
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(x, column)| {
            average_lane(intermediate.index_axis(Axis(1), x), column, threshold_y, edge)
        });

    // Alpha policy: either the filtered alpha stands, or the source alpha is
    // restored verbatim, bypassing both passes.
    if keep_alpha && (channels == 2 || channels == 4) {
        let alpha = channels - 1;
        for y in 0..height {
            for x in 0..width {
                result[[y, x, alpha]] = input[[y, x, alpha]];
            }
        }
    }

    Ok(result)
}

// ============================================================================
// Public API
// ============================================================================

/// Average runs of similar pixels row-wise, then column-wise - u8 version.
///
/// Each scan line keeps an averaging run going until some color channel of
/// the next pixel deviates from the running average by more than the
/// threshold; the finished run is flushed to its average and the deviating
/// pixel starts the next run. Alpha (2- and 4-channel images) is averaged
/// along but never compared against the threshold.
///
/// # Arguments
/// * `input` - Image with 1, 2, 3, or 4 channels (height, width, channels)
/// * `threshold_x` - Row-pass threshold, in channel-value units
/// * `threshold_y` - Column-pass threshold, in channel-value units
/// * `wrap_around` - Treat the image as cyclic instead of repeating edges
/// * `keep_alpha` - Restore the source alpha channel verbatim in the result
///
/// # Returns
/// Filtered image with the same shape, or an error for zero-sized input or
/// an unsupported channel count.
pub fn average_u8(
    input: ArrayView3<u8>,
    threshold_x: u8,
    threshold_y: u8,
    wrap_around: bool,
    keep_alpha: bool,
) -> Result<Array3<u8>, FilterError> {
    let edge = if wrap_around { EdgeMode::Wrap } else { EdgeMode::Clamp };
    average_impl(
        input,
        u64::from(threshold_x),
        u64::from(threshold_y),
        edge,
        keep_alpha,
    )
}

/// Average runs of similar pixels row-wise, then column-wise - u16 version.
///
/// Identical to [`average_u8`] for 16-bit channel values. Thresholds are in
/// 16-bit channel units; use [`scale_threshold`] to map an 8-bit threshold
/// to a wider color depth.
///
/// # Arguments
/// * `input` - Image with 1, 2, 3, or 4 channels (height, width, channels)
/// * `threshold_x` - Row-pass threshold, in channel-value units
/// * `threshold_y` - Column-pass threshold, in channel-value units
/// * `wrap_around` - Treat the image as cyclic instead of repeating edges
/// * `keep_alpha` - Restore the source alpha channel verbatim in the result
///
/// # Returns
/// Filtered image with the same shape, or an error for zero-sized input or
/// an unsupported channel count.
pub fn average_u16(
    input: ArrayView3<u16>,
    threshold_x: u16,
    threshold_y: u16,
    wrap_around: bool,
    keep_alpha: bool,
) -> Result<Array3<u16>, FilterError> {
    let edge = if wrap_around { EdgeMode::Wrap } else { EdgeMode::Clamp };
    average_impl(
        input,
        u64::from(threshold_x),
        u64::from(threshold_y),
        edge,
        keep_alpha,
    )
}

/// Rescale an 8-bit threshold to an image's color depth:
/// `maxcolors * threshold / 255`, truncating, saturating at `u16::MAX`.
///
/// The filter itself never rescales thresholds; callers working with 16-bit
/// images apply this to UI-style 0-255 threshold values first.
pub fn scale_threshold(threshold: u16, maxcolors: u16) -> u16 {
    let scaled = u32::from(maxcolors) * u32::from(threshold) / 255;
    scaled.min(u32::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn gray_row(values: &[u8]) -> Array3<u8> {
        let mut img = Array3::<u8>::zeros((1, values.len(), 1));
        for (x, &v) in values.iter().enumerate() {
            img[[0, x, 0]] = v;
        }
        img
    }

    fn row_values(img: &Array3<u8>) -> Vec<u8> {
        (0..img.dim().1).map(|x| img[[0, x, 0]]).collect()
    }

    #[test]
    fn test_flat_run_flushes_to_average() {
        let img = gray_row(&[10, 16, 10, 16, 100]);

        let result = average_u8(img.view(), 10, 10, false, false).unwrap();

        // The first four pixels stay within threshold of the running
        // average and flush to 12 when 100 breaches; 100 stays literal.
        assert_eq!(row_values(&result), vec![12, 12, 12, 12, 100]);
    }

    #[test]
    fn test_breach_pixel_starts_new_run() {
        let img = gray_row(&[10, 10, 10, 200, 10]);

        let result = average_u8(img.view(), 5, 5, false, false).unwrap();

        // 200 breaches and seeds a new run; 10 then breaches against {200}
        // immediately, so every pixel keeps its literal value.
        assert_eq!(row_values(&result), vec![10, 10, 10, 200, 10]);
    }

    #[test]
    fn test_threshold_zero_is_near_identity() {
        let img = gray_row(&[1, 2, 1, 2]);

        let result = average_u8(img.view(), 0, 0, false, false).unwrap();

        // Every differing neighbor breaches, runs degenerate to single
        // pixels, and each flush writes back the run's own seed.
        assert_eq!(row_values(&result), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_uniform_image_unchanged() {
        let img = Array3::<u8>::from_elem((6, 7, 3), 137);

        let result = average_u8(img.view(), 0, 0, false, false).unwrap();

        assert_eq!(result, img);
    }

    #[test]
    fn test_wrap_and_clamp_diverge() {
        let img = gray_row(&[0, 10, 20, 30, 40]);

        let clamped = average_u8(img.view(), 12, 12, false, false).unwrap();
        let wrapped = average_u8(img.view(), 12, 12, true, false).unwrap();

        // First and last pixels differ by more than the threshold, so the
        // second lap re-runs the head with a different seed and the run
        // boundaries shift.
        assert_eq!(row_values(&clamped), vec![2, 2, 23, 23, 40]);
        assert_eq!(row_values(&wrapped), vec![3, 3, 23, 23, 40]);
        assert_ne!(clamped, wrapped);
    }

    #[test]
    fn test_vertical_pass_averages_columns() {
        let mut img = Array3::<u8>::zeros((5, 1, 1));
        for (y, v) in [10, 16, 10, 16, 100].into_iter().enumerate() {
            img[[y, 0, 0]] = v;
        }

        let result = average_u8(img.view(), 10, 10, false, false).unwrap();

        let column: Vec<u8> = (0..5).map(|y| result[[y, 0, 0]]).collect();
        assert_eq!(column, vec![12, 12, 12, 12, 100]);
    }

    #[test]
    fn test_passes_compose() {
        let rows = [[10u8, 16, 10, 16, 100], [12, 14, 12, 14, 100]];
        let img = Array3::from_shape_fn((2, 5, 1), |(y, x, _)| rows[y][x]);

        let result = average_u8(img.view(), 10, 50, false, false).unwrap();

        // Both rows flush to 12 horizontally; the vertical pass then finds
        // every column uniform and leaves it alone.
        for y in 0..2 {
            let row: Vec<u8> = (0..5).map(|x| result[[y, x, 0]]).collect();
            assert_eq!(row, vec![12, 12, 12, 12, 100]);
        }
    }

    #[test]
    fn test_alpha_excluded_from_breach_test() {
        // Luminance stays within threshold while alpha jumps to 255; the
        // jump must not end the run.
        let la = [[10u8, 0], [12, 255], [90, 10]];
        let img = Array3::from_shape_fn((1, 3, 2), |(_, x, c)| la[x][c]);

        let result = average_u8(img.view(), 5, 5, false, false).unwrap();

        assert_eq!(result[[0, 0, 0]], 10);
        assert_eq!(result[[0, 1, 0]], 10);
        assert_eq!(result[[0, 2, 0]], 90);
        // Alpha was averaged along with the flushed run: 255 / 4 = 63.
        assert_eq!(result[[0, 0, 1]], 63);
        assert_eq!(result[[0, 1, 1]], 63);
        assert_eq!(result[[0, 2, 1]], 10);
    }

    #[test]
    fn test_keep_alpha_restores_source_alpha() {
        let la = [[10u8, 0], [12, 255], [90, 10]];
        let img = Array3::from_shape_fn((1, 3, 2), |(_, x, c)| la[x][c]);

        let result = average_u8(img.view(), 5, 5, false, true).unwrap();

        assert_eq!(result[[0, 0, 0]], 10);
        assert_eq!(result[[0, 1, 0]], 10);
        assert_eq!(result[[0, 2, 0]], 90);
        for x in 0..3 {
            assert_eq!(result[[0, x, 1]], img[[0, x, 1]]);
        }
    }

    /// 3x3 RGBA with two flat color blocks and a gradient alpha plane.
    fn rgba_blocks() -> Array3<u8> {
        Array3::from_shape_fn((3, 3, 4), |(y, x, c)| match c {
            3 => 50 + 10 * (3 * y + x) as u8,
            _ if y < 2 => [100, 150, 200][c],
            _ => [10, 20, 30][c],
        })
    }

    #[test]
    fn test_rgba_blocks_keep_alpha() {
        let img = rgba_blocks();

        let result = average_u8(img.view(), 40, 40, false, true).unwrap();

        for y in 0..3 {
            for x in 0..3 {
                let expected = if y < 2 { [100, 150, 200] } else { [10, 20, 30] };
                for c in 0..3 {
                    assert_eq!(result[[y, x, c]], expected[c]);
                }
                assert_eq!(result[[y, x, 3]], img[[y, x, 3]]);
            }
        }
    }

    #[test]
    fn test_rgba_blocks_averaged_alpha() {
        let img = rgba_blocks();

        let result = average_u8(img.view(), 40, 40, false, false).unwrap();

        // Rows 0-1 of each column flush in the vertical pass; their alpha is
        // the truncated average (3 * a0 + a1) / 4 of the doubled-seed run.
        for y in 0..2 {
            assert_eq!(result[[y, 0, 3]], 57);
            assert_eq!(result[[y, 1, 3]], 67);
            assert_eq!(result[[y, 2, 3]], 77);
        }
        // The breaching row keeps its literal alpha.
        assert_eq!(result[[2, 0, 3]], 110);
        assert_eq!(result[[2, 1, 3]], 120);
        assert_eq!(result[[2, 2, 3]], 130);
    }

    #[test]
    fn test_keep_alpha_irrelevant_without_alpha() {
        let img = Array3::from_shape_fn((4, 4, 3), |(y, x, c)| ((y * 50 + x * 30 + c * 7) % 256) as u8);

        let kept = average_u8(img.view(), 20, 20, false, true).unwrap();
        let filtered = average_u8(img.view(), 20, 20, false, false).unwrap();

        assert_eq!(kept, filtered);
    }

    #[test]
    fn test_average_u16_wide_values() {
        let values = [1000u16, 1200, 1400, 60000, 1000];
        let img = Array3::from_shape_fn((1, 5, 1), |(_, x, _)| values[x]);

        let result = average_u16(img.view(), 500, 500, false, false).unwrap();

        let row: Vec<u16> = (0..5).map(|x| result[[0, x, 0]]).collect();
        assert_eq!(row, vec![1120, 1120, 1120, 60000, 1000]);
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = Array3::<u8>::zeros((0, 4, 3));
        let result = average_u8(img.view(), 10, 10, false, false);
        assert_eq!(
            result.unwrap_err(),
            FilterError::InvalidDimensions { height: 0, width: 4 }
        );

        let img = Array3::<u8>::zeros((4, 0, 3));
        let result = average_u8(img.view(), 10, 10, false, false);
        assert_eq!(
            result.unwrap_err(),
            FilterError::InvalidDimensions { height: 4, width: 0 }
        );
    }

    #[test]
    fn test_unsupported_channel_count() {
        let img = Array3::<u8>::zeros((2, 2, 5));
        let result = average_u8(img.view(), 10, 10, false, false);
        assert_eq!(result.unwrap_err(), FilterError::UnsupportedChannelCount(5));
    }

    #[test]
    fn test_resolve_clamp() {
        assert_eq!(EdgeMode::Clamp.resolve(-3, 5), 0);
        assert_eq!(EdgeMode::Clamp.resolve(0, 5), 0);
        assert_eq!(EdgeMode::Clamp.resolve(4, 5), 4);
        assert_eq!(EdgeMode::Clamp.resolve(10, 5), 4);
    }

    #[test]
    fn test_resolve_wrap() {
        assert_eq!(EdgeMode::Wrap.resolve(-1, 5), 4);
        assert_eq!(EdgeMode::Wrap.resolve(0, 5), 0);
        assert_eq!(EdgeMode::Wrap.resolve(5, 5), 0);
        assert_eq!(EdgeMode::Wrap.resolve(7, 5), 2);
    }

    #[test]
    fn test_scale_threshold() {
        assert_eq!(scale_threshold(16, 255), 16);
        assert_eq!(scale_threshold(16, 65535), 4112);
        assert_eq!(scale_threshold(0, 65535), 0);
        assert_eq!(scale_threshold(255, 255), 255);
    }

    #[quickcheck]
    fn prop_shape_preserved(
        height_seed: u8,
        width_seed: u8,
        channel_seed: u8,
        threshold: u8,
        wrap: bool,
        keep_alpha: bool,
    ) -> bool {
        let height = usize::from(height_seed % 9) + 1;
        let width = usize::from(width_seed % 9) + 1;
        let channels = usize::from(channel_seed % 4) + 1;
        let img = Array3::from_shape_fn((height, width, channels), |(y, x, c)| {
            ((y * 31 + x * 7 + c * 3) % 256) as u8
        });

        let result = average_u8(img.view(), threshold, threshold, wrap, keep_alpha).unwrap();
        result.dim() == img.dim()
    }

    #[quickcheck]
    fn prop_uniform_image_is_fixed_point(
        value: u8,
        threshold: u8,
        wrap: bool,
        keep_alpha: bool,
    ) -> bool {
        let img = Array3::<u8>::from_elem((4, 5, 4), value);
        let result = average_u8(img.view(), threshold, threshold, wrap, keep_alpha).unwrap();
        result == img
    }
}
