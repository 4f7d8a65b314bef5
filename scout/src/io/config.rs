//! Scout configuration loaded from `scout.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "scout.toml";

/// Scout configuration (TOML).
///
/// Missing fields default to the values used by the original discovery runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScoutConfig {
    /// Directory holding one knowledge JSON file per site.
    pub knowledge_dir: PathBuf,

    /// Maximum propose/validate cycles per section.
    pub max_retry_times: u32,

    /// Cleaned HTML beyond this many bytes is truncated before prompting.
    pub prompt_budget_bytes: usize,

    /// Upper bound on result pages visited by one walk.
    pub max_pages: u32,

    /// Wait this long for a page load before stopping it and using the partial DOM.
    pub page_load_timeout_secs: u64,

    /// Pause after each interaction so the page can re-render.
    pub settle_millis: u64,

    pub browser: BrowserConfig,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Command that answers a prompt on stdin (e.g. `["codex","exec","--skip-git-repo-check"]`).
    pub command: Vec<String>,

    /// Scratch directory for output schemas, responses and logs.
    pub work_dir: PathBuf,

    /// Per-proposal wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Truncate oracle stdout/stderr logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: PathBuf::from("knowledge"),
            max_retry_times: 3,
            prompt_budget_bytes: 120_000,
            max_pages: 100,
            page_load_timeout_secs: 10,
            settle_millis: 1_000,
            browser: BrowserConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "codex".to_string(),
                "exec".to_string(),
                "--skip-git-repo-check".to_string(),
            ],
            work_dir: PathBuf::from(".scout/oracle"),
            timeout_secs: 5 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl ScoutConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retry_times == 0 {
            return Err(anyhow!("max_retry_times must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.max_pages == 0 {
            return Err(anyhow!("max_pages must be > 0"));
        }
        if self.page_load_timeout_secs == 0 {
            return Err(anyhow!("page_load_timeout_secs must be > 0"));
        }
        if self.oracle.command.is_empty() || self.oracle.command[0].trim().is_empty() {
            return Err(anyhow!("oracle.command must be a non-empty array"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_millis)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ScoutConfig::default()`.
pub fn load_config(path: &Path) -> Result<ScoutConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = ScoutConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ScoutConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ScoutConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
