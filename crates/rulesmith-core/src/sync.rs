//! Writes emitted files to disk and removes what a previous run left behind.

use crate::emit::EmittedFile;
use crate::error::Result;
use crate::io;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }
}

/// Files generated into a directory by the last run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub files: Vec<PathBuf>,
}

impl Manifest {
    /// `None` when absent; a malformed manifest is logged and ignored.
    pub fn load(out_dir: &Path) -> Result<Option<Manifest>> {
        let path = paths::manifest_path(out_dir);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        match serde_yaml::from_str(&data) {
            Ok(m) => Ok(Some(m)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable manifest");
                Ok(None)
            }
        }
    }

    fn save(&self, out_dir: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::manifest_path(out_dir), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write `files` under `out_dir`, then delete files the previous manifest
/// listed that are no longer generated. Dry runs report without touching disk.
pub fn materialize(out_dir: &Path, files: &[EmittedFile], dry_run: bool) -> Result<SyncReport> {
    let previous = Manifest::load(out_dir)?;
    let mut report = write_files(out_dir, files, dry_run)?;

    let current: BTreeSet<&Path> = files.iter().map(|f| f.path.as_path()).collect();
    let stale: Vec<PathBuf> = previous
        .as_ref()
        .map(|m| {
            m.files
                .iter()
                .filter(|p| !current.contains(p.as_path()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    remove_files(out_dir, &stale, dry_run, &mut report)?;

    if !dry_run && (previous.is_none() || !report.is_noop()) {
        let manifest = Manifest {
            generated_at: Utc::now(),
            files: current.into_iter().map(Path::to_path_buf).collect(),
        };
        manifest.save(out_dir)?;
    }
    Ok(report)
}

/// Reset semantics: every file directly in `out_dir` with one of `exts` that
/// is not in `files` is deleted, then `files` are written.
pub fn replace(out_dir: &Path, files: &[EmittedFile], exts: &[&str], dry_run: bool) -> Result<SyncReport> {
    let current: BTreeSet<&Path> = files.iter().map(|f| f.path.as_path()).collect();
    let mut stale = Vec::new();
    if out_dir.is_dir() {
        for ext in exts {
            for path in paths::list_files(out_dir, ext)? {
                let rel = path.strip_prefix(out_dir).unwrap_or(&path).to_path_buf();
                if !current.contains(rel.as_path()) {
                    stale.push(rel);
                }
            }
        }
    }
    let mut report = write_files(out_dir, files, dry_run)?;
    remove_files(out_dir, &stale, dry_run, &mut report)?;
    Ok(report)
}

fn write_files(out_dir: &Path, files: &[EmittedFile], dry_run: bool) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    for file in files {
        paths::validate_relative(&file.path)?;
        let target = out_dir.join(&file.path);
        if io::content_matches(&target, file.text.as_bytes())? {
            report.unchanged.push(file.path.clone());
            continue;
        }
        if !dry_run {
            io::atomic_write(&target, file.text.as_bytes())?;
            tracing::info!(path = %target.display(), "wrote");
        }
        report.written.push(file.path.clone());
    }
    Ok(report)
}

fn remove_files(out_dir: &Path, stale: &[PathBuf], dry_run: bool, report: &mut SyncReport) -> Result<()> {
    for rel in stale {
        // Manifests are plain files anyone can edit.
        if paths::validate_relative(rel).is_err() {
            tracing::warn!(path = %rel.display(), "refusing to remove path outside output dir");
            continue;
        }
        let target = out_dir.join(rel);
        let removed = if dry_run {
            target.is_file()
        } else {
            io::remove_if_exists(&target)?
        };
        if !removed {
            continue;
        }
        if !dry_run {
            tracing::info!(path = %target.display(), "removed stale file");
            if let Some(parent) = target.parent() {
                io::prune_empty_dirs(parent, out_dir)?;
            }
        }
        report.removed.push(rel.clone());
    }
    Ok(())
}
