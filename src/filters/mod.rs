//! Filter modules for adaptive image averaging.
//!
//! ## Supported Formats
//!
//! All filters accept images with 1, 2, 3, or 4 channels:
//!
//! | Format | Shape | Type | Description |
//! |--------|-------|------|-------------|
//! | L8 | (H, W, 1) | u8 | Single luminance channel, 0-255 |
//! | L16 | (H, W, 1) | u16 | Single luminance channel, 0-65535 |
//! | LA8 | (H, W, 2) | u8 | Luminance + alpha, 0-255 |
//! | LA16 | (H, W, 2) | u16 | Luminance + alpha, 0-65535 |
//! | RGB8 | (H, W, 3) | u8 | Red, green, blue, 0-255 |
//! | RGB16 | (H, W, 3) | u16 | Red, green, blue, 0-65535 |
//! | RGBA8 | (H, W, 4) | u8 | RGB + alpha, 0-255 |
//! | RGBA16 | (H, W, 4) | u16 | RGB + alpha, 0-65535 |
//!
//! Channel count is inferred from input array dimensions. The alpha channel,
//! when present, never takes part in threshold comparisons.
//!
//! ## Architecture
//!
//! All filters follow these principles:
//! - **Multi-channel aware** - Handles 1, 2, 3, or 4 channels
//! - **Dual depth** - Both u8 (0-255) and u16 (0-65535) variants
//! - **Integer exact** - Truncating integer averaging, reproducible
//!   byte-for-byte; thresholds are applied exactly as given
//! - **Alpha policy** - Filtered or source-verbatim alpha, caller's choice
//! - **Thread-safe** - Scan lines are independent and processed in parallel
//!   with rayon

pub mod average;
