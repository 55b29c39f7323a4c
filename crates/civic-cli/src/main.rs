#![forbid(unsafe_code)]

mod cmd;
mod identity;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, Reported, render_error};
use std::env;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "civ: report and follow local civic issues",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Act as this user (skips env and config resolution).
    #[arg(long, global = true)]
    user: Option<String>,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a civic project",
        long_about = "Create .civic/ in the current directory, migrate the store, and bootstrap an admin.",
        after_help = "EXAMPLES:\n    # Initialize and make yourself admin\n    civ --user asha init\n\n    # Name a different admin\n    civ init --admin city-clerk"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Issues",
        about = "Report a new issue",
        long_about = "Report an issue at a location. Severity is assessed automatically.",
        after_help = "EXAMPLES:\n    # Report a pothole\n    civ report --title \"Pothole on 5th\" --description \"Deep, near the bus stop\" --category roads --lat 40.71 --lng -74.0\n\n    # Attach a photo\n    civ report --title \"Overflowing bin\" --description \"Not collected in a week\" --category waste --lat 40.7 --lng -74.0 --image https://img.example/bin.jpg"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        next_help_heading = "Issues",
        visible_alias = "feed",
        about = "List issues",
        long_about = "List issues with optional filters and sort order.",
        after_help = "EXAMPLES:\n    # Newest first (default)\n    civ list\n\n    # Most liked pending road issues\n    civ list --sort likes --category roads --status pending\n\n    # Only your own reports\n    civ list --mine --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Issues",
        about = "Show one issue",
        long_about = "Show an issue with its comments. Counts one view per session.",
        after_help = "EXAMPLES:\n    # Show an issue\n    civ show iss-3f2a9c01bd\n\n    # Use a unique prefix\n    civ show 3f2a"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Issues",
        about = "Change an issue's status",
        long_about = "Move an issue to pending, in-progress, or resolved. Only admins or officials of the issue's department may do this.",
        after_help = "EXAMPLES:\n    # Start work\n    civ status iss-3f2a in-progress\n\n    # Close it\n    civ status iss-3f2a resolved"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Engagement",
        about = "Like or unlike an issue",
        after_help = "EXAMPLES:\n    # Toggle your like\n    civ like iss-3f2a"
    )]
    Like(cmd::like::LikeArgs),

    #[command(
        next_help_heading = "Engagement",
        about = "Comment on an issue",
        after_help = "EXAMPLES:\n    # Add a comment\n    civ comment iss-3f2a \"Still there this morning\""
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Engagement",
        about = "List comments on an issue",
        after_help = "EXAMPLES:\n    civ comments iss-3f2a --json"
    )]
    Comments(cmd::comment::CommentsArgs),

    #[command(
        next_help_heading = "Engagement",
        about = "Open your inbox",
        long_about = "List your notifications, newest first, and mark them all read.",
        after_help = "EXAMPLES:\n    civ inbox\n    civ inbox --json"
    )]
    Inbox,

    #[command(
        next_help_heading = "Engagement",
        about = "Count unread notifications",
        after_help = "EXAMPLES:\n    civ unread"
    )]
    Unread,

    #[command(
        next_help_heading = "Account",
        about = "Show or edit your profile",
        after_help = "EXAMPLES:\n    civ profile show\n    civ profile edit --name \"Asha K\""
    )]
    Profile(cmd::profile::ProfileArgs),

    #[command(
        next_help_heading = "Account",
        about = "Administer roles and departments",
        after_help = "EXAMPLES:\n    # Make someone an admin\n    civ admin grant-role omar admin\n\n    # Assign a department\n    civ admin set-gov-category omar roads\n\n    # Clear it\n    civ admin set-gov-category omar none"
    )]
    Admin(cmd::admin::AdminArgs),

    #[command(
        next_help_heading = "Account",
        about = "Report a problem with the app",
        after_help = "EXAMPLES:\n    civ bug-report \"Map pin lands in the ocean\""
    )]
    BugReport(cmd::bug_report::BugReportArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    civ completions bash\n    civ completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_env("CIVIC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "civic=debug,info"
        } else if quiet {
            "error"
        } else {
            "civic=info,warn"
        })
    });

    let format = env::var("CIVIC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn build_context(cli: &Cli) -> anyhow::Result<cmd::Context> {
    let user_config = civic_core::config::load_user_config().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "ignoring unreadable user config");
        civic_core::config::UserConfig::default()
    });
    let format = env::var("FORMAT").ok();
    let output = OutputMode::from_resolved(&civic_core::config::resolve_output(
        cli.json,
        user_config.output.as_deref(),
        format.as_deref(),
    ));
    Ok(cmd::Context {
        output,
        user_flag: cli.user.clone(),
        config_user: user_config.user,
        cwd: env::current_dir()?,
    })
}

fn dispatch(cli: &Cli, ctx: &cmd::Context) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, ctx),
        Commands::Report(args) => cmd::report::run_report(args, ctx),
        Commands::List(args) => cmd::list::run_list(args, ctx),
        Commands::Show(args) => cmd::show::run_show(args, ctx),
        Commands::Status(args) => cmd::status::run_status(args, ctx),
        Commands::Like(args) => cmd::like::run_like(args, ctx),
        Commands::Comment(args) => cmd::comment::run_comment(args, ctx),
        Commands::Comments(args) => cmd::comment::run_comments(args, ctx),
        Commands::Inbox => cmd::inbox::run_inbox(ctx),
        Commands::Unread => cmd::inbox::run_unread(ctx),
        Commands::Profile(args) => cmd::profile::run_profile(args, ctx),
        Commands::Admin(args) => cmd::admin::run_admin(args, ctx),
        Commands::BugReport(args) => cmd::bug_report::run_bug_report(args, ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&cli, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_unhandled(&err, ctx.output);
            ExitCode::FAILURE
        }
    }
}

/// Print errors that no command rendered itself.
fn report_unhandled(err: &anyhow::Error, mode: OutputMode) {
    if err.downcast_ref::<Reported>().is_some() {
        return;
    }
    if let Err(render_err) = render_error(mode, &CliError::new(format!("{err:#}"))) {
        eprintln!("error: {err:#} ({render_err})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["civ", "list", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn user_flag_is_global() {
        let cli = Cli::parse_from(["civ", "like", "iss-1", "--user", "asha"]);
        assert_eq!(cli.user.as_deref(), Some("asha"));
        assert!(matches!(cli.command, Commands::Like(_)));
    }

    #[test]
    fn feed_is_an_alias_for_list() {
        let cli = Cli::parse_from(["civ", "feed", "--sort", "likes"]);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn inbox_takes_no_arguments() {
        let cli = Cli::parse_from(["civ", "inbox"]);
        assert!(matches!(cli.command, Commands::Inbox));
        assert!(Cli::try_parse_from(["civ", "inbox", "extra"]).is_err());
    }

    #[test]
    fn admin_subcommands_parse() {
        let cli = Cli::parse_from(["civ", "admin", "set-gov-category", "omar", "roads"]);
        let Commands::Admin(args) = cli.command else {
            panic!("expected admin");
        };
        assert!(matches!(
            args.command,
            cmd::admin::AdminCommand::SetGovCategory { ref target, ref category }
                if target == "omar" && category == "roads"
        ));
    }

    #[test]
    fn report_requires_title() {
        assert!(
            Cli::try_parse_from(["civ", "report", "--description", "d", "--category", "roads"])
                .is_err()
        );
    }

    #[test]
    fn status_help_names_who_may_triage() {
        let command = Cli::command();
        let status = command.find_subcommand("status").expect("status subcommand");
        let help = status.get_long_about().expect("long about").to_string();
        assert!(help.contains("admins"));
        assert!(!help.contains("author"));
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
