//! `civ status`: move an issue through its lifecycle.

use anyhow::Result;
use civic_core::lifecycle::Transition;
use clap::Args;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Issue ID (supports partial IDs).
    pub id: String,

    /// pending, in-progress, or resolved.
    pub status: String,
}

/// # Errors
///
/// Validation, authorization, transition, and store errors are rendered
/// with their codes.
pub fn run_status(args: &StatusArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let id = ctx.resolve_issue(&app, &args.id)?;
    let transition = app
        .transition_status(&id, &args.status)
        .map_err(|e| ctx.fail(&e))?;

    render(ctx.output, &transition, |t: &Transition, w| {
        if t.changed {
            writeln!(w, "✓ {}: {} → {}", t.issue_id, t.from, t.to)
        } else {
            writeln!(w, "{} is already {}", t.issue_id, t.to)
        }
    })
}
