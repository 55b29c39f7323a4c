//! `civ inbox` and `civ unread`.
//!
//! Opening the inbox marks every listed notification read. The listing
//! shows each row's read flag as it was before opening.

use anyhow::Result;
use civic_core::model::notification::Notification;
use civic_core::model::now_us;
use serde::Serialize;

use super::Context;
use crate::output::{render, time_ago};

#[derive(Debug, Serialize)]
struct UnreadOutput {
    user: String,
    unread: u64,
}

/// # Errors
///
/// Fails on missing project or identity, or store errors.
pub fn run_inbox(ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let notifications = app.open_inbox().map_err(|e| ctx.fail(&e))?;

    render(ctx.output, &notifications, |list: &Vec<Notification>, w| {
        if list.is_empty() {
            return writeln!(w, "No notifications.");
        }
        let now = now_us();
        for n in list {
            let marker = if n.is_read { ' ' } else { '•' };
            writeln!(
                w,
                "{marker} {:<9} {:<8} {}",
                time_ago(n.created_at_us, now),
                n.kind.as_str(),
                n.message
            )?;
        }
        Ok(())
    })
}

/// # Errors
///
/// Fails on missing project or identity, or store errors.
pub fn run_unread(ctx: &Context) -> Result<()> {
    let app = ctx.open()?;
    let unread = app.unread_count().map_err(|e| ctx.fail(&e))?;
    let out = UnreadOutput {
        user: app.session().user_id().to_string(),
        unread,
    };
    render(ctx.output, &out, |o, w| writeln!(w, "{}", o.unread))
}
