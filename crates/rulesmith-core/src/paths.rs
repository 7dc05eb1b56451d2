use crate::error::{Result, RuleError};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CURSOR_DIR: &str = ".cursor";
pub const CURSOR_RULES_DIR: &str = ".cursor/rules";
pub const CLAUDE_AGENTS_DIR: &str = ".claude/agents";
pub const CLAUDE_SKILLS_DIR: &str = ".claude/skills";
pub const CODEX_SKILLS_DIR: &str = ".codex/skills";
pub const CURSOR_SKILLS_DIR: &str = ".cursor/skills";
pub const CLAUDE_COMMANDS_DIR: &str = ".claude/commands";

pub const CONFIG_FILE: &str = ".rulesmith/config.yaml";
pub const MANIFEST_FILE: &str = ".rulesmith-manifest.yaml";

pub const SKILL_MD: &str = "SKILL.md";
pub const CLAUDE_MD: &str = "CLAUDE.md";
pub const AGENTS_MD: &str = "AGENTS.md";
pub const QUESTIONS_DIR: &str = "questions";
pub const TEMPLATES_DIR: &str = "templates";
pub const SCRIPTS_DIR: &str = "scripts";
pub const NEXT_ACTION_TRIGGERS: &str = "triggers/next_action_triggers.md";

pub const RULE_EXT: &str = "mdc";
pub const FALLBACK_MASTER_RULE: &str = "00_master_rules.mdc";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn rules_dir(root: &Path) -> PathBuf {
    root.join(CURSOR_RULES_DIR)
}

pub fn agents_dir(root: &Path) -> PathBuf {
    root.join(CLAUDE_AGENTS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn manifest_path(out_dir: &Path) -> PathBuf {
    out_dir.join(MANIFEST_FILE)
}

/// Files in `dir` with extension `ext`, sorted by name. Missing directory is an error.
pub fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RuleError::DirNotFound(dir.display().to_string()));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == ext))
        .collect();
    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir` not starting with `.`, sorted. Missing
/// `dir` yields nothing.
pub fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| !p.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.')))
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Every file below `dir` accepted by `keep`, sorted. Missing `dir` yields nothing.
pub fn find_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if keep(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Every file with extension `ext` below `dir`.
pub fn find_with_ext(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    find_files(dir, |p| p.extension().is_some_and(|x| x == ext))
}

/// Reject absolute paths and `..` components in generated relative paths.
pub fn validate_relative(path: &Path) -> Result<()> {
    let ok = !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !ok {
        return Err(RuleError::InvalidOutputPath(path.display().to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rule file naming
// ---------------------------------------------------------------------------

/// Master rule files (`00_*`, `*path*`) are concatenated into master files and
/// copied verbatim instead of being converted.
pub fn is_master_rule(file_name: &str) -> bool {
    file_name.contains("00") || file_name.to_lowercase().contains("path")
}

/// Path definition files (`*_paths.mdc`) are no longer allowed.
pub fn is_paths_file(file_name: &str) -> bool {
    file_name.ends_with("_paths.mdc")
}

static ORDER_PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn order_prefix_re() -> &'static Regex {
    ORDER_PREFIX_RE.get_or_init(|| Regex::new(r"^\d+_").unwrap())
}

/// `07_pmbok_Executing` -> `pmbok-executing`.
pub fn skill_name_for_stem(stem: &str) -> String {
    order_prefix_re()
        .replace(stem, "")
        .replace('_', "-")
        .to_lowercase()
}

/// Resource file name for a section: the section name verbatim plus `.md`.
pub fn resource_file_name(section_name: &str) -> String {
    format!("{section_name}.md")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
