//! Shared utilities for greenhouse-logger

/// Timestamp layout of the first column of every log row
pub const ROW_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Date layout used in day-file names
pub const FILE_DATE: &str = "%Y%m%d";

/// Format a duration in seconds to human readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Round to `places` decimals, ties to even like the existing log files
pub fn round_to(value: f64, places: u32) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).round_ties_even() / scale
}

/// Round and print in shortest form, always keeping a fractional part
/// (`23.5`, `25.0`) so log columns read the same as the existing files.
pub fn format_reading(value: f64, places: u32) -> String {
    let rounded = round_to(value, places);
    if !rounded.is_finite() {
        return rounded.to_string();
    }
    let text = rounded.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Same as [`format_reading`], with an empty cell for a missing value
pub fn format_optional(value: Option<f64>, places: u32) -> String {
    value.map(|v| format_reading(v, places)).unwrap_or_default()
}
