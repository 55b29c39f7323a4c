//! `civ show`: one issue with its comments. Counts a view.

use anyhow::Result;
use civic_core::model::issue::Severity;
use civic_core::model::now_us;
use civic_core::service::IssueDetail;
use clap::Args;
use std::io::{self, Write};

use super::Context;
use crate::output::{micros_to_rfc3339, pretty_kv, pretty_section, render, time_ago};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Issue ID (supports partial IDs).
    pub id: String,
}

/// # Errors
///
/// Fails when the issue cannot be resolved or the store errors.
pub fn run_show(args: &ShowArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let id = ctx.resolve_issue(&app, &args.id)?;
    let detail = app.view_issue(&id).map_err(|e| ctx.fail(&e))?;
    render(ctx.output, &detail, write_detail)
}

fn write_detail(detail: &IssueDetail, w: &mut dyn Write) -> io::Result<()> {
    let issue = &detail.issue;
    let now = now_us();
    pretty_section(w, &format!("{}  {}", issue.id, issue.title))?;
    pretty_kv(w, "status", issue.status.as_str())?;
    pretty_kv(w, "category", issue.category.as_str())?;
    pretty_kv(
        w,
        "severity",
        issue.severity.map_or("unknown", Severity::as_str),
    )?;
    pretty_kv(
        w,
        "reported",
        format!(
            "{} by {} ({})",
            time_ago(issue.created_at_us, now),
            issue.author_name,
            micros_to_rfc3339(issue.created_at_us)
        ),
    )?;
    if let Some(point) = issue.location {
        pretty_kv(w, "location", format!("{:.5}, {:.5}", point.latitude, point.longitude))?;
    }
    if let Some(url) = &issue.image_url {
        pretty_kv(w, "image", url)?;
    }
    pretty_kv(
        w,
        "likes",
        format!(
            "{}{}",
            issue.like_count,
            if detail.liked { " (you like this)" } else { "" }
        ),
    )?;
    pretty_kv(w, "views", issue.view_count.to_string())?;
    writeln!(w)?;
    writeln!(w, "{}", issue.description)?;
    writeln!(w)?;

    pretty_section(w, &format!("Comments ({})", detail.comments.len()))?;
    for comment in &detail.comments {
        writeln!(
            w,
            "{} · {}",
            comment.author_id,
            time_ago(comment.created_at_us, now)
        )?;
        writeln!(w, "  {}", comment.content)?;
    }
    Ok(())
}
