//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current time as an RFC 3339 string with millisecond precision.
pub fn iso_timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Next identifier in a timestamp-based scheme.
///
/// Never returns a value at or below `current_max`, so two ids allocated in
/// the same millisecond stay distinct.
pub fn next_timestamp_id(current_max: Option<i64>) -> i64 {
    let now = unix_millis_now();
    match current_max {
        Some(max) if max >= now => max.saturating_add(1),
        _ => now,
    }
}

/// Next identifier in a `max + 1` scheme (starts at 1).
pub fn next_sequential_id(current_max: Option<i64>) -> i64 {
    current_max.map_or(1, |max| max.saturating_add(1))
}

/// Parse a coordinate typed with either a decimal point or a decimal comma.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}
