//! `civ admin`: role and department assignment. Admins only.

use anyhow::Result;
use civic_core::model::profile::Role;
use civic_core::{CivicError, ErrorCode};
use clap::{Args, Subcommand};

use super::Context;
use super::profile::write_profile;
use super::report::parse_category;
use crate::output::render;

#[derive(Args, Debug)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Set a user's role (citizen or admin).
    GrantRole {
        #[arg(value_name = "USER")]
        target: String,
        role: String,
    },
    /// Assign a user to a department category, or clear it with `none`.
    SetGovCategory {
        #[arg(value_name = "USER")]
        target: String,
        category: String,
    },
}

/// # Errors
///
/// `E3001` for non-admins; validation and store errors otherwise.
pub fn run_admin(args: &AdminArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let profile = match &args.command {
        AdminCommand::GrantRole { target, role } => {
            let role = role.parse::<Role>().map_err(|e| {
                ctx.fail(&CivicError::validation(ErrorCode::InvalidEnumValue, e.to_string()))
            })?;
            app.grant_role(target, role).map_err(|e| ctx.fail(&e))?
        }
        AdminCommand::SetGovCategory { target, category } => {
            let category = if category.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_category(ctx, category)?)
            };
            app.set_gov_category(target, category)
                .map_err(|e| ctx.fail(&e))?
        }
    };
    render(ctx.output, &profile, write_profile)
}
