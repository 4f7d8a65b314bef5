//! Durable per-site knowledge of validated locators.
//!
//! One JSON file per site under the knowledge directory, named after
//! [`site_key`]. Saves are read-merge-write so a section saved later never
//! discards sections validated earlier.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::section::{SectionKind, SectionResult};
use crate::core::site_key::site_key;

/// Everything known about one site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Site URL as first given by the user.
    pub url: String,
    /// Storage section name to validated roles.
    pub sections: BTreeMap<String, SectionResult>,
}

impl KnowledgeRecord {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            sections: BTreeMap::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&SectionResult> {
        self.sections.get(name)
    }

    /// True when every role of `kind` is stored.
    pub fn covers(&self, kind: SectionKind) -> bool {
        self.section(kind.storage_section())
            .is_some_and(|section| section.covers(kind))
    }

    /// Stored roles of `kind`, if all are present.
    pub fn locators_for(&self, kind: SectionKind) -> Option<SectionResult> {
        let section = self.section(kind.storage_section())?;
        section.covers(kind).then(|| section.project(kind))
    }

    fn merge_section(&mut self, name: &str, result: &SectionResult) {
        self.sections
            .entry(name.to_string())
            .or_default()
            .merge(result);
    }
}

/// Filesystem-backed knowledge store.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    dir: PathBuf,
}

impl KnowledgeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, site: &str) -> PathBuf {
        self.dir.join(format!("{}.json", site_key(site)))
    }

    /// Load the record for `site`. A missing file is the normal first-visit signal.
    pub fn lookup(&self, site: &str) -> Result<Option<KnowledgeRecord>> {
        let path = self.path_for(site);
        if !path.exists() {
            debug!(path = %path.display(), "no knowledge file");
            return Ok(None);
        }
        let record = read_record(&path)?;
        debug!(path = %path.display(), sections = record.sections.len(), "knowledge loaded");
        Ok(Some(record))
    }

    /// Merge `result` into `sections[section]` of the site's record and persist it.
    ///
    /// Roles not present in `result` and all other sections are kept.
    pub fn save(&self, site: &str, section: &str, result: &SectionResult) -> Result<KnowledgeRecord> {
        let path = self.path_for(site);
        let mut record = match self.lookup(site)? {
            Some(existing) => existing,
            None => KnowledgeRecord::new(site),
        };
        record.merge_section(section, result);
        write_record(&path, &record)?;
        info!(site, section, path = %path.display(), "knowledge saved");
        Ok(record)
    }

    /// Delete the site's record. Returns whether a file existed.
    pub fn forget(&self, site: &str) -> Result<bool> {
        let path = self.path_for(site);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
        info!(site, path = %path.display(), "knowledge removed");
        Ok(true)
    }
}

fn read_record(path: &Path) -> Result<KnowledgeRecord> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read knowledge {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse knowledge {}", path.display()))
}

/// Atomically write a record (temp file + rename).
fn write_record(path: &Path, record: &KnowledgeRecord) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("knowledge path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(record).context("serialize knowledge")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp knowledge {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace knowledge {}", path.display()))?;
    Ok(())
}
