use crate::output::{print_json, print_sync};
use anyhow::Context;
use rulesmith_core::config::Config;
use rulesmith_core::convert::SourceFile;
use rulesmith_core::{master, paths, sync};
use std::path::Path;

pub fn run(root: &Path, restore: Option<&Path>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    match restore {
        Some(file) => restore_rules(root, file, dry_run, json),
        None => build(root, dry_run, json),
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

fn build(root: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let rules_dir = paths::rules_dir(root);
    let rules = SourceFile::load_dir(&rules_dir, &[paths::RULE_EXT])
        .with_context(|| format!("failed to read rules from {}", rules_dir.display()))?;

    let Some(text) = master::build(&rules) else {
        anyhow::bail!(
            "no master rules with content in {} (file names containing '00' or 'path')",
            rules_dir.display()
        );
    };
    let files = master::master_files(&text, &config.master_outputs);
    let report = sync::materialize(root, &files, dry_run).context("failed to write master files")?;

    if json {
        return print_json(&report);
    }
    print_sync("master files", Path::new(""), &report, dry_run);
    Ok(())
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

fn restore_rules(root: &Path, file: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let path = root.join(file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let master_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let rules_dir = paths::rules_dir(root);
    let existing = if rules_dir.is_dir() {
        SourceFile::load_dir(&rules_dir, &[paths::RULE_EXT])?
    } else {
        Vec::new()
    };

    let files = master::restore(&master_name, &content, &existing)?;
    let report = sync::replace(&rules_dir, &files, &[paths::RULE_EXT], dry_run)
        .context("failed to write rules")?;

    if json {
        return print_json(&report);
    }
    print_sync(paths::CURSOR_RULES_DIR, Path::new(paths::CURSOR_RULES_DIR), &report, dry_run);
    Ok(())
}
