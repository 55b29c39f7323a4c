//! Local input checks, run before any store call.

use crate::error::{CivicError, ErrorCode, Result};
use crate::model::issue::{GeoPoint, NewIssue};
use crate::store::IssueDraft;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4000;
pub const MAX_COMMENT_LEN: usize = 8192;
pub const MAX_BUG_REPORT_LEN: usize = 4000;
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

fn invalid(message: String) -> CivicError {
    CivicError::validation(ErrorCode::InvalidContent, message)
}

/// Non-blank, bounded, free of control characters (newline and tab are
/// allowed when `multiline`).
fn check_text(field: &str, value: &str, max: usize, multiline: bool) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CivicError::missing_field(field));
    }
    let len = value.chars().count();
    if len > max {
        return Err(invalid(format!("{field} must be <= {max} characters (got {len})")));
    }
    let bad_control = value
        .chars()
        .any(|ch| ch.is_control() && !(multiline && (ch == '\n' || ch == '\t')));
    if bad_control {
        return Err(invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

/// # Errors
///
/// Returns a validation error for blank, oversized, or control-laden titles.
pub fn validate_title(title: &str) -> Result<()> {
    check_text("title", title, MAX_TITLE_LEN, false)
}

/// # Errors
///
/// Returns a validation error for blank or oversized descriptions.
pub fn validate_description(description: &str) -> Result<()> {
    check_text("description", description, MAX_DESCRIPTION_LEN, true)
}

/// # Errors
///
/// Returns a validation error for blank or oversized comments.
pub fn validate_comment(content: &str) -> Result<()> {
    check_text("comment", content, MAX_COMMENT_LEN, true)
}

/// # Errors
///
/// Returns a validation error for blank or oversized reports.
pub fn validate_bug_report(description: &str) -> Result<()> {
    check_text("bug report", description, MAX_BUG_REPORT_LEN, true)
}

/// # Errors
///
/// Returns a validation error for blank or oversized names.
pub fn validate_display_name(name: &str) -> Result<()> {
    check_text("display name", name, MAX_DISPLAY_NAME_LEN, false)
}

/// # Errors
///
/// Returns a validation error when the point is missing or out of range.
pub fn validate_location(location: Option<GeoPoint>) -> Result<GeoPoint> {
    let point = location.ok_or_else(|| CivicError::missing_field("location"))?;
    if !point.latitude.is_finite() || !point.longitude.is_finite() || !point.is_valid() {
        return Err(invalid(format!(
            "location ({}, {}) is outside latitude -90..90 / longitude -180..180",
            point.latitude, point.longitude
        )));
    }
    Ok(point)
}

/// Check a report and turn it into a store draft (severity still unknown).
///
/// # Errors
///
/// Returns the first failing field as a validation error.
pub fn validate_new_issue(input: NewIssue) -> Result<IssueDraft> {
    let title = input.title.trim().to_string();
    validate_title(&title)?;
    validate_description(&input.description)?;
    let category = input
        .category
        .ok_or_else(|| CivicError::missing_field("category"))?;
    let location = validate_location(input.location)?;
    let image_url = input
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    Ok(IssueDraft {
        title,
        description: input.description,
        category,
        location,
        image_url,
        severity: None,
    })
}
