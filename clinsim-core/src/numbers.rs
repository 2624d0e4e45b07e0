//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Ratio of two counts as an `f64` percentage, or `None` when the denominator is zero.
#[must_use]
pub fn percent_of(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    let num = cast::<usize, f64>(numerator).unwrap_or(0.0);
    let den = cast::<usize, f64>(denominator).unwrap_or(1.0);
    Some(num / den * 100.0)
}

/// Round a f64 and clamp it into the 0..=100 score scale, returning 0 for NaN values.
#[must_use]
pub fn round_to_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    let clamped = value.clamp(0.0, 100.0).round();
    cast::<f64, u8>(clamped).unwrap_or(0)
}

/// Convert a count to f64, saturating to 0.0 if the cast fails.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert u32 to f64; lossless for every u32.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Convert i32 to f64; lossless for every i32.
#[must_use]
pub fn i32_to_f64(value: i32) -> f64 {
    f64::from(value)
}
