//! Shared output layer for pretty/text/JSON parity across all commands.
//!
//! Precedence (highest wins): `--json`, the `FORMAT` env var, `output` in
//! the user config, then pretty on a TTY and text when piped.

use chrono::{DateTime, Utc};
use civic_core::CivicError;
use serde::Serialize;
use std::io::{self, Write};

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Sections and aligned fields for people.
    Pretty,
    /// One tab-separated row per record, for pipes.
    Text,
    Json,
}

impl OutputMode {
    /// Map a resolved mode name (`pretty`, `text`, `json`).
    pub fn from_resolved(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Pretty,
        }
    }
}

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Stable `E####` code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
            retryable: false,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
            retryable: false,
        }
    }
}

impl From<&CivicError> for CliError {
    fn from(err: &CivicError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: Some(err.suggestion()),
            error_code: Some(err.code().code().to_string()),
            retryable: err.is_retryable(),
        }
    }
}

/// Marker for failures already written to stderr.
#[derive(Debug)]
pub struct Reported(pub String);

impl std::fmt::Display for Reported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Reported {}

/// Render `error` and hand back an error `main` will not print again.
pub fn fail(mode: OutputMode, error: &CliError) -> anyhow::Error {
    if let Err(render_err) = render_error(mode, error) {
        tracing::warn!(error = %render_err, "failed to render error");
    }
    Reported(error.message.clone()).into()
}

/// Shorthand for [`fail`] on a domain error.
pub fn fail_civic(mode: OutputMode, error: &CivicError) -> anyhow::Error {
    fail(mode, &CliError::from(error))
}

/// Render a serializable value to stdout in the requested format.
///
/// JSON mode serializes `value`; the other modes call `human_fn`.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            human_fn(value, &mut out)?;
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            match &error.error_code {
                Some(code) => writeln!(out, "error[{code}]: {}", error.message)?,
                None => writeln!(out, "error: {}", error.message)?,
            }
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

pub fn micros_to_rfc3339(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map_or_else(|| us.to_string(), |ts| ts.to_rfc3339())
}

/// "just now", "5m ago", "3h ago", "2d ago", then a calendar date.
pub fn time_ago(us: i64, now_us: i64) -> String {
    let secs = (now_us - us).max(0) / 1_000_000;
    match secs {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", secs / 60),
        3_600..=86_399 => format!("{}h ago", secs / 3_600),
        86_400..=604_799 => format!("{}d ago", secs / 86_400),
        _ => DateTime::<Utc>::from_timestamp_micros(us)
            .map_or_else(|| us.to_string(), |ts| ts.format("%Y-%m-%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::ErrorCode;

    const MINUTE: i64 = 60 * 1_000_000;

    #[test]
    fn resolved_names_map_to_modes() {
        assert_eq!(OutputMode::from_resolved("json"), OutputMode::Json);
        assert_eq!(OutputMode::from_resolved("text"), OutputMode::Text);
        assert_eq!(OutputMode::from_resolved("pretty"), OutputMode::Pretty);
        assert_eq!(OutputMode::from_resolved("anything"), OutputMode::Pretty);
    }

    #[test]
    fn civic_error_carries_code_and_hint() {
        let err = civic_core::CivicError::issue_not_found("iss-nope");
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some(ErrorCode::IssueNotFound.code()));
        assert!(cli.suggestion.is_some());
        assert!(!cli.retryable);
        assert!(cli.message.contains("iss-nope"));
    }

    #[test]
    fn retryable_flag_only_serialized_when_set() {
        let json = serde_json::to_value(CliError::new("boom")).expect("serialize");
        assert!(json.get("retryable").is_none());
        assert!(json.get("suggestion").is_none());
    }

    #[test]
    fn time_ago_buckets() {
        let now = 1_700_000_000_000_000;
        assert_eq!(time_ago(now, now), "just now");
        assert_eq!(time_ago(now - 5 * MINUTE, now), "5m ago");
        assert_eq!(time_ago(now - 180 * MINUTE, now), "3h ago");
        assert_eq!(time_ago(now - 2 * 24 * 60 * MINUTE, now), "2d ago");
        assert_eq!(time_ago(now - 30 * 24 * 60 * MINUTE, now), "2023-10-15");
        assert_eq!(time_ago(now + MINUTE, now), "just now");
    }

    #[test]
    fn rfc3339_formats_micros() {
        assert_eq!(micros_to_rfc3339(0), "1970-01-01T00:00:00+00:00");
    }
}
