use anyhow::{Context as _, Result};
use civic_core::Store;
use civic_core::config::{self, CIVIC_DIR, CONFIG_FILE};
use civic_core::model::profile::Role;
use clap::Args;
use serde::Serialize;

use super::Context;
use crate::identity;
use crate::output::{CliError, fail, pretty_kv, render};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-initialize even if `.civic/` already exists (keeps the database).
    #[arg(long)]
    pub force: bool,

    /// Grant the admin role to this user. Defaults to the acting user.
    #[arg(long)]
    pub admin: Option<String>,
}

const GITIGNORE: &str = "civic.db\ncivic.db-wal\ncivic.db-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    path: String,
    schema_version: u32,
    admin: Option<String>,
}

/// Execute `civ init`. Creates the project skeleton:
///
/// ```text
/// .civic/
///   civic.db      (store, migrated to the latest schema)
///   config.toml   (default project config)
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if `.civic/` already exists and `--force` is not set,
/// or if any filesystem or store operation fails.
pub fn run_init(args: &InitArgs, ctx: &Context) -> Result<()> {
    let civic_dir = ctx.cwd.join(CIVIC_DIR);
    if civic_dir.exists() && !args.force {
        return Err(fail(
            ctx.output,
            &CliError::with_details(
                ".civic/ already exists",
                "Use `civ init --force` to reinitialize",
                "E1001",
            ),
        ));
    }

    std::fs::create_dir_all(&civic_dir)
        .with_context(|| format!("Failed to create {}", civic_dir.display()))?;

    let config_path = civic_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, config::default_config_toml())
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }
    std::fs::write(civic_dir.join(".gitignore"), GITIGNORE)
        .context("Failed to write .civic/.gitignore")?;

    let project = config::load_project_config(&ctx.cwd).map_err(|e| ctx.fail_any(e))?;
    let store = Store::open(&config::db_path(&ctx.cwd), project.store.busy_timeout())
        .map_err(|e| ctx.fail_any(e))?;
    let schema_version = civic_core::db::migrations::current_schema_version(store.connection())
        .context("read schema version")?;

    let admin = args
        .admin
        .clone()
        .or_else(|| identity::resolve_user(ctx.user_flag.as_deref(), ctx.config_user.as_deref()));
    if let Some(user) = &admin {
        store.set_role(user, Role::Admin).map_err(|e| ctx.fail(&e))?;
        tracing::info!(%user, "bootstrap admin granted");
    }

    let out = InitOutput {
        ok: true,
        path: civic_dir.display().to_string(),
        schema_version,
        admin,
    };
    render(ctx.output, &out, |o, w| {
        writeln!(w, "✓ Initialized civic project in {}", o.path)?;
        pretty_kv(w, "schema", o.schema_version.to_string())?;
        if let Some(admin) = &o.admin {
            pretty_kv(w, "admin", admin)?;
        }
        Ok(())
    })
}
