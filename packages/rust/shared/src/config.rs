//! Application configuration for notescout.
//!
//! User config lives at `~/.notescout/notescout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{NoteScoutError, Result};
use crate::types::SortPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "notescout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".notescout";

// ---------------------------------------------------------------------------
// Config structs (matching notescout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Session credentials.
    #[serde(default)]
    pub session: SessionConfig,

    /// Signing bridge process.
    #[serde(default)]
    pub signer: SignerConfig,

    /// Upstream endpoints.
    #[serde(default)]
    pub api: ApiConfig,

    /// Collection defaults.
    #[serde(default)]
    pub collect: CollectSection,
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the env var holding the session cookie (never store the cookie itself).
    #[serde(default = "default_cookie_env")]
    pub cookie_env: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_env: default_cookie_env(),
        }
    }
}

fn default_cookie_env() -> String {
    "NOTESCOUT_COOKIE".into()
}

/// `[signer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Program that runs the signing bridge (e.g., "node").
    #[serde(default = "default_signer_command")]
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default = "default_signer_args")]
    pub args: Vec<String>,

    /// Working directory for the bridge; defaults to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            command: default_signer_command(),
            args: default_signer_args(),
            working_dir: None,
        }
    }
}

fn default_signer_command() -> String {
    "node".into()
}
fn default_signer_args() -> Vec<String> {
    vec!["signer/bridge.js".into()]
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the JSON API host.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Base URL of the public web site (used for links, origin and referer).
    #[serde(default = "default_web_base")]
    pub web_base: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            web_base: default_web_base(),
        }
    }
}

fn default_api_base() -> String {
    "https://edith.xiaohongshu.com".into()
}
fn default_web_base() -> String {
    "https://www.xiaohongshu.com".into()
}

/// Inclusive millisecond range for a randomized pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// A range that never sleeps.
    pub const ZERO: Self = Self {
        min_ms: 0,
        max_ms: 0,
    };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms == 0
    }
}

/// `[collect]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectSection {
    /// Number of records to collect before stopping.
    #[serde(default = "default_target_count")]
    pub target_count: usize,

    /// Items requested per search page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Search ordering.
    #[serde(default)]
    pub sort: SortPolicy,

    /// Upstream note type filter (0 = all).
    #[serde(default)]
    pub note_type: u32,

    /// Attempts per request on transport failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed pause between attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Per-request socket timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause after each detail fetch.
    #[serde(default = "default_note_delay")]
    pub note_delay_ms: DelayRange,

    /// Pause after each search page.
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: DelayRange,
}

impl Default for CollectSection {
    fn default() -> Self {
        Self {
            target_count: default_target_count(),
            page_size: default_page_size(),
            sort: SortPolicy::default(),
            note_type: 0,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            timeout_secs: default_timeout(),
            note_delay_ms: default_note_delay(),
            page_delay_ms: default_page_delay(),
        }
    }
}

fn default_target_count() -> usize {
    100
}
fn default_page_size() -> u32 {
    20
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    5_000
}
fn default_timeout() -> u64 {
    15
}
fn default_note_delay() -> DelayRange {
    DelayRange::new(350, 800)
}
fn default_page_delay() -> DelayRange {
    DelayRange::new(800, 1_500)
}

// ---------------------------------------------------------------------------
// Collect config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime collection configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Search keyword for this run.
    pub keyword: String,
    /// Stop after this many records.
    pub target_count: usize,
    /// Items per search page.
    pub page_size: u32,
    /// Search ordering.
    pub sort: SortPolicy,
    /// Upstream note type filter.
    pub note_type: u32,
    /// Attempts per request on transport failure.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Per-request socket timeout.
    pub timeout: Duration,
    /// Pause after each detail fetch.
    pub note_delay: DelayRange,
    /// Pause after each search page.
    pub page_delay: DelayRange,
    /// JSON API base URL.
    pub api_base: String,
    /// Public web base URL.
    pub web_base: String,
}

impl From<&AppConfig> for CollectConfig {
    fn from(config: &AppConfig) -> Self {
        let collect = &config.collect;
        Self {
            keyword: String::new(),
            target_count: collect.target_count,
            page_size: collect.page_size,
            sort: collect.sort,
            note_type: collect.note_type,
            max_retries: collect.max_retries,
            retry_delay: Duration::from_millis(collect.retry_delay_ms),
            timeout: Duration::from_secs(collect.timeout_secs),
            note_delay: collect.note_delay_ms,
            page_delay: collect.page_delay_ms,
            api_base: config.api.api_base.trim_end_matches('/').to_string(),
            web_base: config.api.web_base.trim_end_matches('/').to_string(),
        }
    }
}

impl CollectConfig {
    /// Reject values that would make a run loop forever or never start.
    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().is_empty() {
            return Err(NoteScoutError::validation("keyword must not be empty"));
        }
        if self.target_count == 0 {
            return Err(NoteScoutError::validation("target_count must be positive"));
        }
        if self.page_size == 0 {
            return Err(NoteScoutError::validation("page_size must be positive"));
        }
        if self.max_retries == 0 {
            return Err(NoteScoutError::validation("max_retries must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(NoteScoutError::validation("timeout_secs must be positive"));
        }
        for (name, range) in [("note_delay_ms", self.note_delay), ("page_delay_ms", self.page_delay)] {
            if range.min_ms > range.max_ms {
                return Err(NoteScoutError::validation(format!(
                    "{name}: min_ms ({}) exceeds max_ms ({})",
                    range.min_ms, range.max_ms
                )));
            }
        }
        for (name, base) in [("api_base", &self.api_base), ("web_base", &self.web_base)] {
            Url::parse(base)
                .map_err(|e| NoteScoutError::validation(format!("{name} '{base}': {e}")))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.notescout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| NoteScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.notescout/notescout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NoteScoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        NoteScoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NoteScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NoteScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NoteScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the session cookie from the env var named in config.
pub fn read_cookie(config: &AppConfig) -> Result<String> {
    let var_name = &config.session.cookie_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(NoteScoutError::config(format!(
            "session cookie not found. Set the {var_name} environment variable to the cookie \
             header of a logged-in browser request."
        ))),
    }
}
