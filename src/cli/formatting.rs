//! Formatting utilities for CLI output.

use serde_json::Value;

use super::CliError;

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";
    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Formats warnings with yellow styling
pub fn format_warning(text: &str) -> String {
    format!("{}{}{}", Colors::YELLOW, text, Colors::RESET)
}

/// Formats usage hints with dim styling
pub fn format_usage(text: &str) -> String {
    format!("{}{}{}", Colors::DIM, text, Colors::RESET)
}

/// Renders a loaded configuration as indented JSON.
///
/// # Errors
/// Returns `CliError::OutputError` if the value cannot be serialized.
pub fn render_json(value: &Value) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::OutputError(e.to_string()))
}

/// Short summary of a value for one-line status output.
///
/// Containers show their size rather than their contents.
///
/// # Examples
///
/// ```
/// use dynconf::cli::formatting::summarize_value;
/// use serde_json::json;
///
/// assert_eq!(summarize_value(&json!("hello")), "\"hello\"");
/// assert_eq!(summarize_value(&json!({"a": 1, "b": 2})), "{2}");
/// ```
pub fn summarize_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => format!("\"{s}\""),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => format!("[{}]", arr.len()),
        Value::Object(map) => format!("{{{}}}", map.len()),
    }
}
