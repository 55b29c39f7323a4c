//! `civ comment` and `civ comments`.

use anyhow::Result;
use civic_core::model::engagement::Comment;
use civic_core::model::now_us;
use clap::Args;

use super::Context;
use crate::output::{render, time_ago};

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Issue ID (supports partial IDs).
    pub id: String,

    /// Comment text.
    pub content: String,
}

#[derive(Args, Debug)]
pub struct CommentsArgs {
    /// Issue ID (supports partial IDs).
    pub id: String,
}

/// # Errors
///
/// Validation errors before any store call; resolution and store errors.
pub fn run_comment(args: &CommentArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let id = ctx.resolve_issue(&app, &args.id)?;
    let comment = app.comment(&id, &args.content).map_err(|e| ctx.fail(&e))?;

    render(ctx.output, &comment, |c: &Comment, w| {
        writeln!(w, "✓ Commented on {}", c.issue_id)
    })
}

/// Comments on one issue, oldest first.
///
/// # Errors
///
/// Fails when the issue cannot be resolved or the store errors.
pub fn run_comments(args: &CommentsArgs, ctx: &Context) -> Result<()> {
    let app = ctx.open()?;
    let id = ctx.resolve_issue(&app, &args.id)?;
    let comments = app.comments(&id).map_err(|e| ctx.fail(&e))?;

    render(ctx.output, &comments, |comments, w| {
        if comments.is_empty() {
            return writeln!(w, "No comments.");
        }
        let now = now_us();
        for c in comments {
            writeln!(
                w,
                "{}\t{}\t{}",
                time_ago(c.created_at_us, now),
                c.author_id,
                c.content
            )?;
        }
        Ok(())
    })
}
