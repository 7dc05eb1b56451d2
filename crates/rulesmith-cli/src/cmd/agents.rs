use crate::output::{print_json, print_sync};
use anyhow::Context;
use rulesmith_core::convert::{self, SourceFile};
use rulesmith_core::{paths, sync};
use std::path::Path;

pub fn run(root: &Path, reverse: bool, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let (from, to) = if reverse {
        (paths::CLAUDE_AGENTS_DIR, paths::CURSOR_RULES_DIR)
    } else {
        (paths::CURSOR_RULES_DIR, paths::CLAUDE_AGENTS_DIR)
    };
    let source_exts: &[&str] = if reverse { &["md", paths::RULE_EXT] } else { &[paths::RULE_EXT] };
    // The destination is reset: stale files with these extensions go away.
    let reset_exts: &[&str] = if reverse { &[paths::RULE_EXT] } else { &["md", paths::RULE_EXT] };

    let sources = SourceFile::load_dir(&root.join(from), source_exts)
        .with_context(|| format!("failed to read {from}"))?;
    let files = if reverse {
        convert::agents_to_rules(&sources)
    } else {
        convert::rules_to_agents(&sources)
    };
    if files.is_empty() {
        anyhow::bail!("nothing to convert in {from}");
    }

    let report = sync::replace(&root.join(to), &files, reset_exts, dry_run)
        .with_context(|| format!("failed to write {to}"))?;

    if json {
        return print_json(&report);
    }
    print_sync(to, Path::new(to), &report, dry_run);
    Ok(())
}
