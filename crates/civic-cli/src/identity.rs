//! Acting-user resolution.
//!
//! Chain: `--user` flag > `CIVIC_USER` env > `user` in the user config >
//! `USER` env (TTY only). Every command that opens the store needs an
//! identity; `init`, `completions` work without one.

use std::env;

/// Why no identity could be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityError {
    pub message: String,
    pub code: &'static str,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdentityError {}

/// Environment reader, swappable in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_user_with(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(user) = non_empty(cli_flag) {
        return Some(user);
    }
    if let Some(user) = env.get("CIVIC_USER") {
        return Some(user.trim().to_string());
    }
    if let Some(user) = non_empty(config_user) {
        return Some(user);
    }
    if env.is_tty() {
        return env.get("USER");
    }
    None
}

pub fn resolve_user(cli_flag: Option<&str>, config_user: Option<&str>) -> Option<String> {
    resolve_user_with(cli_flag, config_user, &RealEnv)
}

/// Resolve the acting user or explain how to set one.
pub fn require_user(
    cli_flag: Option<&str>,
    config_user: Option<&str>,
) -> Result<String, IdentityError> {
    resolve_user(cli_flag, config_user).ok_or_else(|| IdentityError {
        message: "A user identity is required for this command.".to_string(),
        code: "E2001",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.trim().is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn flag_beats_everything() {
        let env = MockEnv::new().var("CIVIC_USER", "env").var("USER", "login").tty();
        assert_eq!(
            resolve_user_with(Some("flag"), Some("config"), &env).as_deref(),
            Some("flag")
        );
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("CIVIC_USER", "env");
        assert_eq!(
            resolve_user_with(None, Some("config"), &env).as_deref(),
            Some("env")
        );
    }

    #[test]
    fn config_beats_login_name() {
        let env = MockEnv::new().var("USER", "login").tty();
        assert_eq!(
            resolve_user_with(None, Some("config"), &env).as_deref(),
            Some("config")
        );
    }

    #[test]
    fn blank_values_are_skipped() {
        let env = MockEnv::new().var("CIVIC_USER", "  ");
        assert_eq!(
            resolve_user_with(Some(""), Some(" "), &env),
            None
        );
    }

    #[test]
    fn login_name_only_on_tty() {
        let env = MockEnv::new().var("USER", "login");
        assert_eq!(resolve_user_with(None, None, &env), None);

        let env = MockEnv::new().var("USER", "login").tty();
        assert_eq!(resolve_user_with(None, None, &env).as_deref(), Some("login"));
    }

    #[test]
    fn require_user_accepts_flag() {
        assert_eq!(require_user(Some("asha"), None).as_deref(), Ok("asha"));
    }
}
