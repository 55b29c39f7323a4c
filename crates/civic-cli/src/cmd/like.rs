//! `civ like`: toggle the acting user's like.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct LikeArgs {
    /// Issue ID (supports partial IDs).
    pub id: String,
}

#[derive(Debug, Serialize)]
struct LikeOutput {
    issue_id: String,
    liked: bool,
    like_count: u64,
}

/// # Errors
///
/// Fails when the issue cannot be resolved or the store errors. Nothing
/// changes on failure.
pub fn run_like(args: &LikeArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let id = ctx.resolve_issue(&app, &args.id)?;
    let toggle = app.toggle_like(&id).map_err(|e| ctx.fail(&e))?;

    let out = LikeOutput {
        issue_id: id,
        liked: toggle.liked,
        like_count: toggle.new_count,
    };
    render(ctx.output, &out, |o, w| {
        let verb = if o.liked { "Liked" } else { "Unliked" };
        writeln!(w, "{verb} {} ({} like(s))", o.issue_id, o.like_count)
    })
}
