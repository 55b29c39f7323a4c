use anyhow::Result;
use civic_core::model::engagement::BugReport;
use clap::Args;

use super::Context;
use crate::output::render;

#[derive(Args, Debug)]
pub struct BugReportArgs {
    /// What went wrong.
    pub description: String,
}

/// # Errors
///
/// Validation or store errors.
pub fn run_bug_report(args: &BugReportArgs, ctx: &Context) -> Result<()> {
    let app = ctx.open()?;
    let report = app
        .report_bug(&args.description)
        .map_err(|e| ctx.fail(&e))?;
    render(ctx.output, &report, |r: &BugReport, w| {
        writeln!(w, "✓ Bug report #{} recorded. Thank you.", r.id)
    })
}
