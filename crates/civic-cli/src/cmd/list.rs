//! `civ list`: the issue feed, with dashboard, activity, and map filters.

use anyhow::Result;
use civic_core::model::issue::{Issue, Status};
use civic_core::model::now_us;
use civic_core::store::{IssueFilter, SortKey};
use civic_core::{CivicError, ErrorCode};
use clap::Args;
use std::io::{self, Write};

use super::Context;
use super::report::parse_category;
use crate::output::{OutputMode, pretty_rule, render, time_ago};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// latest, likes, or views. Defaults to `feed.default_sort`.
    #[arg(long)]
    pub sort: Option<String>,

    /// Oldest / least first.
    #[arg(long)]
    pub asc: bool,

    /// Only this category (the department dashboard).
    #[arg(long)]
    pub category: Option<String>,

    /// pending, in-progress, or resolved.
    #[arg(long)]
    pub status: Option<String>,

    /// Only issues reported by the acting user.
    #[arg(long)]
    pub mine: bool,

    /// Only issues with a location (map view).
    #[arg(long)]
    pub located: bool,

    /// Maximum rows. Defaults to `feed.page_size`.
    #[arg(long)]
    pub limit: Option<u32>,

    /// Rows to skip.
    #[arg(long)]
    pub offset: Option<u32>,
}

fn invalid(ctx: &Context, message: String) -> anyhow::Error {
    ctx.fail(&CivicError::validation(ErrorCode::InvalidEnumValue, message))
}

/// # Errors
///
/// Fails on bad filter values, missing project or identity, or store errors.
pub fn run_list(args: &ListArgs, ctx: &Context) -> Result<()> {
    let category = args
        .category
        .as_deref()
        .map(|raw| parse_category(ctx, raw))
        .transpose()?;
    let status = args
        .status
        .as_deref()
        .map(|raw| raw.parse::<Status>().map_err(|e| invalid(ctx, e.to_string())))
        .transpose()?;
    let sort = args
        .sort
        .as_deref()
        .map(|raw| raw.parse::<SortKey>().map_err(|e| invalid(ctx, e.to_string())))
        .transpose()?;

    let app = ctx.open()?;
    let filter = IssueFilter {
        category,
        status,
        author_id: args.mine.then(|| app.session().user_id().to_string()),
        located_only: args.located,
        sort: sort.unwrap_or_else(|| app.config().feed.sort_key()),
        ascending: args.asc,
        limit: args.limit,
        offset: args.offset,
    };
    let issues = app.feed(&filter).map_err(|e| ctx.fail(&e))?;

    let mode = ctx.output;
    render(mode, &issues, |issues, w| write_rows(mode, issues, w))
}

fn write_rows(mode: OutputMode, issues: &[Issue], w: &mut dyn Write) -> io::Result<()> {
    if issues.is_empty() {
        return writeln!(w, "No issues found.");
    }
    let now = now_us();
    if mode == OutputMode::Text {
        writeln!(w, "id\tstatus\tcategory\tlikes\tviews\tage\ttitle")?;
        for issue in issues {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                issue.id,
                issue.status,
                issue.category.slug(),
                issue.like_count,
                issue.view_count,
                time_ago(issue.created_at_us, now),
                issue.title
            )?;
        }
        return Ok(());
    }

    for issue in issues {
        writeln!(
            w,
            "{:<14} {:<12} {:<20} ♥ {:<4} 👁 {:<5} {}",
            issue.id,
            issue.status.as_str(),
            issue.category.as_str(),
            issue.like_count,
            issue.view_count,
            time_ago(issue.created_at_us, now)
        )?;
        writeln!(w, "    {} (by {})", issue.title, issue.author_name)?;
    }
    pretty_rule(w)?;
    writeln!(w, "{} issue(s)", issues.len())
}
