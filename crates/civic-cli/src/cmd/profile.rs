//! `civ profile show|edit`.

use anyhow::Result;
use civic_core::model::issue::Category;
use civic_core::model::profile::Profile;
use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::Context;
use crate::output::{micros_to_rfc3339, pretty_kv, render};

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the acting user's profile (created on first access).
    Show,
    /// Change display name or avatar.
    Edit(ProfileEditArgs),
}

#[derive(Args, Debug)]
pub struct ProfileEditArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// Avatar image URL.
    #[arg(long)]
    pub avatar: Option<String>,
}

pub(crate) fn write_profile(p: &Profile, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "user", &p.user_id)?;
    pretty_kv(w, "name", &p.display_name)?;
    pretty_kv(w, "role", p.role.as_str())?;
    pretty_kv(w, "department", p.gov_category.map_or("-", Category::as_str))?;
    if let Some(avatar) = &p.avatar_url {
        pretty_kv(w, "avatar", avatar)?;
    }
    pretty_kv(w, "joined", micros_to_rfc3339(p.created_at_us))
}

/// # Errors
///
/// Fails on missing project or identity, validation, or store errors.
pub fn run_profile(args: &ProfileArgs, ctx: &Context) -> Result<()> {
    let mut app = ctx.open()?;
    let profile = match &args.command {
        ProfileCommand::Show => app.profile().clone(),
        ProfileCommand::Edit(edit) => {
            if edit.name.is_none() && edit.avatar.is_none() {
                return Err(ctx.fail(&civic_core::CivicError::missing_field("--name or --avatar")));
            }
            app.update_profile(edit.name.as_deref(), edit.avatar.as_deref())
                .map_err(|e| ctx.fail(&e))?
        }
    };
    render(ctx.output, &profile, write_profile)
}
