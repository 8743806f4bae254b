//! Conversion of operator-entered frequencies ("100 kHz", "6GHz") to hertz.

use crate::error::VnaError;

/// Unit suffixes, most specific first so "hz" never matches inside "ghz".
const UNITS: [(&str, f64); 4] = [("ghz", 1e9), ("mhz", 1e6), ("khz", 1e3), ("hz", 1.0)];

/// Parse a magnitude with an optional unit suffix into whole hertz.
///
/// Input is trimmed and case-folded. Without a recognised suffix the number is
/// taken as hertz. The scaled value is truncated toward zero. Returns `None`
/// for anything that is not a finite, non-negative number.
///
/// ```
/// use rusty_vna::parse_frequency;
///
/// assert_eq!(parse_frequency("100 kHz"), Some(100_000));
/// assert_eq!(parse_frequency("6GHz"), Some(6_000_000_000));
/// assert_eq!(parse_frequency("abc"), None);
/// ```
pub fn parse_frequency(text: &str) -> Option<u64> {
    let lowered = text.trim().to_lowercase();

    let (number, multiplier) = UNITS
        .iter()
        .find(|(suffix, _)| lowered.ends_with(suffix))
        .map(|(suffix, factor)| (lowered.replace(suffix, ""), *factor))
        .unwrap_or((lowered, 1.0));

    let value: f64 = number.trim().parse().ok()?;
    let hz = (value * multiplier).trunc();

    if !hz.is_finite() || hz < 0.0 || hz > u64::MAX as f64 {
        return None;
    }
    Some(hz as u64)
}

/// Like [`parse_frequency`], but reports which field was invalid.
pub fn require_frequency(field: &str, text: &str) -> Result<u64, VnaError> {
    parse_frequency(text).ok_or_else(|| {
        VnaError::InvalidConfiguration(format!("{field}: cannot parse frequency '{text}'"))
    })
}
