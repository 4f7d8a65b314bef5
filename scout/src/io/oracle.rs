//! Proposal oracle abstraction.
//!
//! The [`Oracle`] trait decouples discovery from the backend that proposes
//! locators (by default an LLM CLI such as `codex exec`). Tests use scripted
//! oracles that return queued answers without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::section::SectionKind;
use crate::io::config::OracleConfig;
use crate::io::process::run_command_with_timeout;

/// One proposal request.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub section: SectionKind,
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON Schema the answer must satisfy.
    pub output_schema: Value,
}

impl OracleRequest {
    /// Both prompts as one stdin document for single-channel backends.
    pub fn combined_prompt(&self) -> String {
        format!(
            "{}\n\n---\n\n{}\n",
            self.system_prompt.trim_end(),
            self.user_prompt.trim_end()
        )
    }
}

/// Source of locator proposals.
///
/// Returns the raw answer text. Shape checking is the caller's job; an `Err` here
/// means the oracle itself is unavailable and discovery cannot continue.
pub trait Oracle {
    fn propose(&self, request: &OracleRequest) -> Result<String>;
}

/// Oracle that spawns a configured command (default `codex exec`).
///
/// The command receives `--output-schema <file> --output-last-message <file> -`
/// and the combined prompt on stdin; the answer is read back from the
/// last-message file.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    cfg: OracleConfig,
}

impl CommandOracle {
    pub fn new(cfg: OracleConfig) -> Self {
        Self { cfg }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.cfg.timeout_secs)
    }
}

impl Oracle for CommandOracle {
    #[instrument(skip_all, fields(section = %request.section, timeout_secs = self.cfg.timeout_secs))]
    fn propose(&self, request: &OracleRequest) -> Result<String> {
        let (program, args) = self
            .cfg
            .command
            .split_first()
            .ok_or_else(|| anyhow!("oracle command is empty"))?;
        let paths = RunPaths::create(&self.cfg.work_dir, request.section)?;
        let mut schema = serde_json::to_string_pretty(&request.output_schema)
            .context("serialize output schema")?;
        schema.push('\n');
        fs::write(&paths.schema, schema)
            .with_context(|| format!("write output schema {}", paths.schema.display()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--output-schema")
            .arg(&paths.schema)
            .arg("--output-last-message")
            .arg(&paths.answer)
            .arg("-");

        info!(program = %program, "asking oracle");
        let output = run_command_with_timeout(
            cmd,
            Some(request.combined_prompt().as_bytes()),
            self.timeout(),
            self.cfg.output_limit_bytes,
        )
        .context("run oracle command")?;
        fs::write(
            &paths.log,
            output.transcript("oracle", self.cfg.output_limit_bytes),
        )
        .with_context(|| format!("write oracle log {}", paths.log.display()))?;

        if output.timed_out {
            warn!(log = %paths.log.display(), "oracle timed out");
            return Err(anyhow!("oracle timed out after {:?}", self.timeout()));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), log = %paths.log.display(), "oracle failed");
            return Err(anyhow!(
                "oracle command failed with status {:?} (see {})",
                output.status.code(),
                paths.log.display()
            ));
        }
        let answer = read_answer(&paths.answer)?;
        debug!(bytes = answer.len(), "oracle answered");
        Ok(answer)
    }
}

/// Files of one oracle run, unique per call.
struct RunPaths {
    schema: PathBuf,
    answer: PathBuf,
    log: PathBuf,
}

impl RunPaths {
    fn create(work_dir: &Path, section: SectionKind) -> Result<Self> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let dir = work_dir.join(format!("{}-{stamp}", section.as_str()));
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self {
            schema: dir.join("schema.json"),
            answer: dir.join("answer.json"),
            log: dir.join("oracle.log"),
        })
    }
}

fn read_answer(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(anyhow!("missing oracle answer {}", path.display()));
    }
    fs::read_to_string(path).with_context(|| format!("read oracle answer {}", path.display()))
}
