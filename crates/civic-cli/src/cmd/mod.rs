pub mod admin;
pub mod bug_report;
pub mod comment;
pub mod completions;
pub mod inbox;
pub mod init;
pub mod like;
pub mod list;
pub mod profile;
pub mod report;
pub mod show;
pub mod status;

use std::path::{Path, PathBuf};

use civic_core::config::CIVIC_DIR;
use civic_core::{Civic, CivicError, ErrorCode};

use crate::identity;
use crate::output::{CliError, OutputMode, fail, fail_civic};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub output: OutputMode,
    pub user_flag: Option<String>,
    pub config_user: Option<String>,
    pub cwd: PathBuf,
}

impl Context {
    /// Closest ancestor of the working directory holding `.civic/`.
    pub fn project_root(&self) -> anyhow::Result<PathBuf> {
        find_project_root(&self.cwd).ok_or_else(|| {
            let err = CivicError::validation(
                ErrorCode::NotInitialized,
                format!("Not a civic project: {CIVIC_DIR} directory not found"),
            );
            fail_civic(self.output, &err)
        })
    }

    pub fn require_user(&self) -> anyhow::Result<String> {
        identity::require_user(self.user_flag.as_deref(), self.config_user.as_deref()).map_err(
            |e| {
                fail(
                    self.output,
                    &CliError::with_details(
                        &e.message,
                        "Pass --user, or set CIVIC_USER",
                        e.code,
                    ),
                )
            },
        )
    }

    /// Open the project as the acting user.
    pub fn open(&self) -> anyhow::Result<Civic> {
        let root = self.project_root()?;
        let user = self.require_user()?;
        Civic::open(&root, &user).map_err(|err| self.fail_any(err))
    }

    /// Render any error, using the domain code when there is one.
    pub fn fail_any(&self, err: anyhow::Error) -> anyhow::Error {
        if let Some(civic) = err.downcast_ref::<CivicError>() {
            return fail_civic(self.output, civic);
        }
        let code = if civic_core::config::is_parse_error(&err) {
            ErrorCode::ConfigParseError
        } else {
            ErrorCode::StoreUnavailable
        };
        fail(
            self.output,
            &CliError::with_details(
                format!("{err:#}"),
                code.hint().unwrap_or_else(|| code.message()),
                code.code(),
            ),
        )
    }

    pub fn fail(&self, err: &CivicError) -> anyhow::Error {
        fail_civic(self.output, err)
    }

    /// Resolve a full or partial issue id.
    pub fn resolve_issue(&self, app: &Civic, raw: &str) -> anyhow::Result<String> {
        app.resolve_issue_id(raw).map_err(|e| self.fail(&e))
    }
}

pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CIVIC_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::find_project_root;

    #[test]
    fn project_root_is_found_from_subdirectory() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(dir.path().join(".civic")).expect("civic dir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("nested");

        assert_eq!(find_project_root(&nested).as_deref(), Some(dir.path()));
    }

    #[test]
    fn missing_project_root_is_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(find_project_root(dir.path()).is_none());
    }
}
