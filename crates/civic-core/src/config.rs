use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::query::SortKey;
use crate::lifecycle::TransitionPolicy;

/// Directory holding the store and project config.
pub const CIVIC_DIR: &str = ".civic";
pub const DB_FILE: &str = "civic.db";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_classifier_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_classifier_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ClassifierConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_true")]
    pub allow_reopen: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            allow_reopen: default_true(),
        }
    }
}

impl LifecycleConfig {
    #[must_use]
    pub const fn policy(&self) -> TransitionPolicy {
        TransitionPolicy {
            allow_reopen: self.allow_reopen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_sort")]
    pub default_sort: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_sort: default_sort(),
            page_size: default_page_size(),
        }
    }
}

impl FeedConfig {
    /// Configured sort, falling back to newest-first on unknown values.
    #[must_use]
    pub fn sort_key(&self) -> SortKey {
        self.default_sort.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %self.default_sort, "unknown feed.default_sort, using latest");
            SortKey::Latest
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Default acting identity when no flag or env var is given.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

#[must_use]
pub fn civic_dir(project_root: &Path) -> PathBuf {
    project_root.join(CIVIC_DIR)
}

#[must_use]
pub fn db_path(project_root: &Path) -> PathBuf {
    civic_dir(project_root).join(DB_FILE)
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = civic_dir(project_root).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// True when `err` came from malformed TOML rather than I/O or the store.
#[must_use]
pub fn is_parse_error(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<toml::de::Error>().is_some())
}

/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("civic/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Returns an error if either config file is unreadable.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

/// `--json` beats `FORMAT`, which beats the user config, which beats TTY
/// detection.
#[must_use]
pub fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

/// Contents written by `civ init`.
#[must_use]
pub fn default_config_toml() -> String {
    format!(
        "[store]\n\
         busy_timeout_ms = {timeout}\n\
         \n\
         [classifier]\n\
         enabled = false\n\
         base_url = \"{url}\"\n\
         timeout_ms = {timeout}\n\
         \n\
         [lifecycle]\n\
         allow_reopen = true\n\
         \n\
         [feed]\n\
         default_sort = \"{sort}\"\n\
         page_size = {page}\n",
        timeout = default_timeout_ms(),
        url = default_classifier_url(),
        sort = default_sort(),
        page = default_page_size(),
    )
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    5_000
}

fn default_classifier_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_sort() -> String {
    "latest".to_string()
}

const fn default_page_size() -> u32 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.store.busy_timeout(), Duration::from_secs(5));
        assert!(!cfg.classifier.enabled);
        assert_eq!(cfg.classifier.timeout(), Duration::from_secs(5));
        assert!(cfg.lifecycle.allow_reopen);
        assert_eq!(cfg.feed.sort_key(), SortKey::Latest);
        assert_eq!(cfg.feed.page_size, 50);
    }

    #[test]
    fn default_config_round_trips_through_loader() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(civic_dir(root.path())).expect("mkdir");
        std::fs::write(
            civic_dir(root.path()).join(CONFIG_FILE),
            default_config_toml(),
        )
        .expect("write");

        let cfg = load_project_config(root.path()).expect("parse");
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
        assert_eq!(cfg.classifier.base_url, "http://127.0.0.1:7860");
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let cfg: ProjectConfig = toml::from_str(
            "[lifecycle]\nallow_reopen = false\n\n[feed]\ndefault_sort = \"likes\"\n",
        )
        .expect("parse");
        assert!(!cfg.lifecycle.policy().allow_reopen);
        assert_eq!(cfg.feed.sort_key(), SortKey::Likes);
        assert_eq!(cfg.feed.page_size, 50);
        assert_eq!(cfg.store.busy_timeout_ms, 5_000);
    }

    #[test]
    fn malformed_config_reports_path() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(civic_dir(root.path())).expect("mkdir");
        std::fs::write(civic_dir(root.path()).join(CONFIG_FILE), "[store\n").expect("write");
        let err = load_project_config(root.path()).expect_err("bad toml");
        assert!(err.to_string().contains("config.toml"));
        assert!(is_parse_error(&err));
    }

    #[test]
    fn only_toml_failures_count_as_parse_errors() {
        let root = tempfile::tempdir().expect("temp dir");
        std::fs::create_dir_all(civic_dir(root.path()).join(CONFIG_FILE)).expect("mkdir");
        let unreadable = load_project_config(root.path()).expect_err("directory, not a file");
        assert!(!is_parse_error(&unreadable));

        let store = anyhow::anyhow!("unable to open database").context("open /srv/parse/civic.db");
        assert!(!is_parse_error(&store));
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        assert_eq!(resolve_output(true, Some("pretty"), Some("text")), "json");
    }

    #[test]
    fn env_beats_user_config() {
        assert_eq!(resolve_output(false, Some("json"), Some("human")), "pretty");
        assert_eq!(resolve_output(false, Some("plain"), Some("bogus")), "text");
    }

    #[test]
    fn user_config_parses_identity() {
        let cfg: UserConfig = toml::from_str("output = \"json\"\nuser = \"asha\"\n").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.user.as_deref(), Some("asha"));
    }
}
