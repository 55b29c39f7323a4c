//! Issue lifecycle: `Pending -> InProgress -> Resolved`.
//!
//! The engine checks the requested status, then, with the issue row locked,
//! the acting user's capability and the re-open switch. Any store failure
//! is returned as-is; nothing is retried here.

use serde::Serialize;

use crate::error::{CivicError, ErrorCode, Result};
use crate::model::issue::{Issue, Status};
use crate::model::profile::Profile;
use crate::store::{StatusUpdate, Store};

/// Knobs for which transitions are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPolicy {
    /// Permit backward moves such as `Resolved -> Pending`.
    pub allow_reopen: bool,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self { allow_reopen: true }
    }
}

/// Outcome of a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub issue_id: String,
    pub from: Status,
    pub to: Status,
    /// False when the issue was already in the requested status.
    pub changed: bool,
}

/// Fail with `Authorization` unless `actor` may change `issue`'s status.
///
/// # Errors
///
/// Returns [`CivicError::Authorization`].
pub fn authorize(actor: &Profile, issue: &Issue) -> Result<()> {
    if actor.may_triage(issue) {
        Ok(())
    } else {
        Err(CivicError::Authorization {
            user: actor.user_id.clone(),
            action: format!("change status of {} issues", issue.category),
        })
    }
}

/// Decide whether `from -> to` is permitted under `policy`.
///
/// # Errors
///
/// Returns [`CivicError::InvalidTransition`] for a backward move while
/// re-opening is disabled.
pub fn check_transition(from: Status, to: Status, policy: TransitionPolicy) -> Result<()> {
    if from.is_backward(to) && !policy.allow_reopen {
        return Err(CivicError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Parse a status as typed by a person (`in-progress`, `In Progress`, ...).
///
/// # Errors
///
/// Returns a validation error naming the accepted values.
pub fn parse_status(requested: &str) -> Result<Status> {
    requested.parse::<Status>().map_err(|err| {
        let accepted = Status::ALL.map(Status::as_str).join(", ");
        CivicError::validation(
            ErrorCode::InvalidEnumValue,
            format!("{err} (expected one of: {accepted})"),
        )
    })
}

/// `transition_status(issue_id, requested_status, acting_user)`.
///
/// Requesting the current status succeeds without writing and without
/// announcing a change.
///
/// # Errors
///
/// Validation, authorization, and transition errors are raised before
/// the store is written; store errors propagate unchanged.
pub fn transition_status(
    store: &Store,
    issue_id: &str,
    requested: &str,
    actor: &Profile,
    policy: TransitionPolicy,
) -> Result<Transition> {
    let to = parse_status(requested)?;
    let update = store.update_issue_status(issue_id, &actor.user_id, |issue| {
        authorize(actor, issue)?;
        check_transition(issue.status, to, policy)?;
        Ok(to)
    })?;

    let StatusUpdate { issue, from, to } = update;
    let changed = from != to;
    if changed {
        tracing::info!(
            issue_id = %issue.id,
            %from,
            %to,
            actor = %actor.user_id,
            "issue status changed"
        );
    } else {
        tracing::debug!(issue_id = %issue.id, status = %to, "status unchanged");
    }

    Ok(Transition {
        issue_id: issue.id,
        from,
        to,
        changed,
    })
}
