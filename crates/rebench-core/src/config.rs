//! Runtime configuration for the workspace manager, scorers and judge.
//!
//! Defaults come from `REBENCH_*` environment variables, falling back to
//! built-in values. Loading configuration files is left to callers.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default judge model identifier.
pub const DEFAULT_JUDGE_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Paths under these prefixes are tool infrastructure, not agent work.
pub const DEFAULT_INFRA_PREFIXES: &[&str] = &[".bobbin/", ".claude/"];

/// Workspace and scorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalConfig {
    /// Directory holding one `<key>.git` mirror per repository slug.
    pub cache_root: PathBuf,
    /// Parent directory for per-attempt temp workspaces (system temp if unset).
    pub workspace_root: Option<PathBuf>,
    /// Upstream URL pattern; `{slug}` is replaced with `owner/repo`.
    pub remote_url_template: String,
    /// Timeout for `clone --mirror` / `remote update` / `clone`.
    pub clone_timeout_secs: u64,
    /// Timeout for every other git call.
    pub git_timeout_secs: u64,
    pub setup_timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub test_timeout_secs: u64,
    /// Skip baseline verification during workspace creation.
    pub skip_verify: bool,
    /// Paths filtered out of both agent and truth file sets before scoring.
    pub infra_prefixes: Vec<String>,
    /// Mirror lock files older than this are considered abandoned.
    pub lock_stale_secs: u64,
    pub judge: JudgeConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            cache_root: std::env::var("REBENCH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_cache_root()),
            workspace_root: std::env::var("REBENCH_WORKSPACE_DIR").ok().map(PathBuf::from),
            remote_url_template: std::env::var("REBENCH_REMOTE_URL")
                .unwrap_or_else(|_| "https://github.com/{slug}.git".to_string()),
            clone_timeout_secs: env_u64("REBENCH_CLONE_TIMEOUT_SECS", 600),
            git_timeout_secs: env_u64("REBENCH_GIT_TIMEOUT_SECS", 120),
            setup_timeout_secs: env_u64("REBENCH_SETUP_TIMEOUT_SECS", 900),
            verify_timeout_secs: env_u64("REBENCH_VERIFY_TIMEOUT_SECS", 300),
            test_timeout_secs: env_u64("REBENCH_TEST_TIMEOUT_SECS", 300),
            skip_verify: std::env::var("REBENCH_SKIP_VERIFY").is_ok_and(|v| v == "1"),
            infra_prefixes: DEFAULT_INFRA_PREFIXES.iter().map(|p| p.to_string()).collect(),
            lock_stale_secs: env_u64("REBENCH_LOCK_STALE_SECS", 3600),
            judge: JudgeConfig::default(),
        }
    }
}

impl EvalConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config rooted at an explicit cache directory, other values default.
    pub fn with_cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    pub fn with_remote_url_template(mut self, template: impl Into<String>) -> Self {
        self.remote_url_template = template.into();
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn with_skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    pub fn with_infra_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.infra_prefixes = prefixes;
        self
    }

    /// Upstream URL for `slug`.
    pub fn remote_url(&self, slug: &str) -> String {
        self.remote_url_template.replace("{slug}", slug)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn setup_timeout(&self) -> Duration {
        Duration::from_secs(self.setup_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}

/// Judge backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeConfig {
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        JudgeConfig {
            model: std::env::var("REBENCH_JUDGE_MODEL")
                .unwrap_or_else(|_| DEFAULT_JUDGE_MODEL.to_string()),
            api_url: std::env::var("REBENCH_JUDGE_API_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            max_tokens: 2048,
            timeout_secs: env_u64("REBENCH_JUDGE_TIMEOUT_SECS", 180),
        }
    }
}

impl JudgeConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_cache_root() -> PathBuf {
    let base = std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".cache")))
        .unwrap_or_else(|_| std::env::temp_dir());
    base.join("rebench").join("repos")
}
