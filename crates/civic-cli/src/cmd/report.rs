//! `civ report`: file a new issue.

use anyhow::Result;
use civic_core::model::issue::{Category, GeoPoint, Issue, NewIssue};
use clap::Args;

use super::Context;
use crate::output::{pretty_kv, render};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Short summary of the problem.
    #[arg(long)]
    pub title: String,

    /// What is wrong and where exactly.
    #[arg(long)]
    pub description: String,

    /// roads, waste, water, electricity, parks, or other.
    #[arg(long)]
    pub category: Option<String>,

    /// Latitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude in decimal degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lng: Option<f64>,

    /// URL of an uploaded photo.
    #[arg(long)]
    pub image: Option<String>,
}

pub(crate) fn parse_category(ctx: &Context, raw: &str) -> Result<Category> {
    raw.parse::<Category>().map_err(|e| {
        ctx.fail(&civic_core::CivicError::validation(
            civic_core::ErrorCode::InvalidEnumValue,
            format!(
                "{e} (expected one of: {})",
                Category::ALL.map(Category::slug).join(", ")
            ),
        ))
    })
}

/// # Errors
///
/// Fails on invalid input, missing project or identity, or store errors.
pub fn run_report(args: &ReportArgs, ctx: &Context) -> Result<()> {
    let category = args
        .category
        .as_deref()
        .map(|raw| parse_category(ctx, raw))
        .transpose()?;
    let location = match (args.lat, args.lng) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let mut app = ctx.open()?;
    let issue = app
        .report_issue(NewIssue {
            title: args.title.clone(),
            description: args.description.clone(),
            category,
            location,
            image_url: args.image.clone(),
        })
        .map_err(|e| ctx.fail(&e))?;

    render(ctx.output, &issue, |issue: &Issue, w| {
        writeln!(w, "✓ Reported {}: {}", issue.id, issue.title)?;
        pretty_kv(w, "category", issue.category.as_str())?;
        pretty_kv(
            w,
            "severity",
            issue.severity.unwrap_or_default().as_str(),
        )?;
        pretty_kv(w, "status", issue.status.as_str())
    })
}
