use std::fmt;

use crate::model::issue::Status;

/// Machine-readable error codes for scripting and UI decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MissingField,
    InvalidEnumValue,
    InvalidContent,
    NotAuthorized,
    InvalidStateTransition,
    IssueNotFound,
    ProfileNotFound,
    StoreUnavailable,
    StoreBusy,
    ClassificationUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingField => "E2001",
            Self::InvalidEnumValue => "E2002",
            Self::InvalidContent => "E2003",
            Self::NotAuthorized => "E3001",
            Self::InvalidStateTransition => "E3002",
            Self::IssueNotFound => "E4001",
            Self::ProfileNotFound => "E4002",
            Self::StoreUnavailable => "E5001",
            Self::StoreBusy => "E5002",
            Self::ClassificationUnavailable => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingField => "Required field missing",
            Self::InvalidEnumValue => "Invalid category/status/severity value",
            Self::InvalidContent => "Invalid text content",
            Self::NotAuthorized => "Not authorized",
            Self::InvalidStateTransition => "Invalid status transition",
            Self::IssueNotFound => "Issue not found",
            Self::ProfileNotFound => "Profile not found",
            Self::StoreUnavailable => "Store operation failed",
            Self::StoreBusy => "Store busy",
            Self::ClassificationUnavailable => "Severity classification unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `civ init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .civic/config.toml and retry."),
            Self::MissingField => Some("Provide title, description, category and a location."),
            Self::InvalidEnumValue => Some("Use one of the documented category/status values."),
            Self::InvalidContent => Some("Use plain UTF-8 text and keep within size limit."),
            Self::NotAuthorized => Some(
                "Only admins or officials assigned to the issue's category may change status.",
            ),
            Self::InvalidStateTransition => {
                Some("Re-opening is disabled; set lifecycle.allow_reopen = true to permit it.")
            }
            Self::IssueNotFound => Some("Check the issue ID with `civ list`."),
            Self::ProfileNotFound => None,
            Self::StoreUnavailable => Some("Retry the operation; no changes were applied."),
            Self::StoreBusy => Some("Retry after the other writer finishes."),
            Self::ClassificationUnavailable => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Issue,
    Profile,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Issue => "issue",
            Self::Profile => "profile",
        })
    }
}

/// Errors raised by the lifecycle, engagement, and fan-out operations.
#[derive(Debug, thiserror::Error)]
pub enum CivicError {
    /// Input rejected locally before any store call.
    #[error("{message}")]
    Validation { code: ErrorCode, message: String },

    /// Acting user lacks the capability for the requested operation.
    #[error("user '{user}' may not {action}")]
    Authorization { user: String, action: String },

    /// Backward status move while re-opening is disabled.
    #[error("cannot move issue from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("{what} '{id}' not found")]
    NotFound { what: Entity, id: String },

    /// Any failure of a store call. Prior state is left intact. `busy`
    /// marks lock contention as opposed to a broken store.
    #[error("store error during {op}: {source}")]
    Store {
        op: &'static str,
        busy: bool,
        #[source]
        source: rusqlite::Error,
    },
}

impl CivicError {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::validation(ErrorCode::MissingField, format!("{field} is required"))
    }

    pub fn issue_not_found(id: &str) -> Self {
        Self::NotFound {
            what: Entity::Issue,
            id: id.to_string(),
        }
    }

    pub fn profile_not_found(user_id: &str) -> Self {
        Self::NotFound {
            what: Entity::Profile,
            id: user_id.to_string(),
        }
    }

    /// Wrap a rusqlite failure, flagging lock contention as busy.
    pub fn store(op: &'static str, source: rusqlite::Error) -> Self {
        let busy = matches!(
            source.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        );
        Self::Store { op, busy, source }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::Authorization { .. } => ErrorCode::NotAuthorized,
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::NotFound {
                what: Entity::Issue,
                ..
            } => ErrorCode::IssueNotFound,
            Self::NotFound {
                what: Entity::Profile,
                ..
            } => ErrorCode::ProfileNotFound,
            Self::Store { busy, .. } => {
                if *busy {
                    ErrorCode::StoreBusy
                } else {
                    ErrorCode::StoreUnavailable
                }
            }
        }
    }

    /// Every store error is retryable, busy or not: nothing was applied.
    /// Everything else is terminal for the triggering interaction.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    #[must_use]
    pub fn suggestion(&self) -> String {
        self.code()
            .hint()
            .unwrap_or_else(|| self.code().message())
            .to_string()
    }
}

pub type Result<T> = std::result::Result<T, CivicError>;
