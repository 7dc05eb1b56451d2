//! Structural linting of rule, skill, agent and command files.

pub mod rules;
pub mod skills;

use crate::config::Config;
use crate::error::Result;
use crate::paths;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use rules::RuleLinter;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One diagnostic. `line` is 1-based; 0 means the whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: PathBuf,
    pub line: usize,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Finding {
    pub fn error(file: &Path, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            line,
            severity: Severity::Error,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(file: &Path, line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(file, line, message)
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    pub rule_files: usize,
    pub skill_files: usize,
    pub agent_files: usize,
    pub command_files: usize,
    pub findings: Vec<Finding>,
}

impl LintReport {
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Exit status hinges on errors only; warnings never fail a run.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn files_checked(&self) -> usize {
        self.rule_files + self.skill_files + self.agent_files + self.command_files
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Project lint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Rule file or directory; defaults to `.cursor/rules`.
    pub target: Option<PathBuf>,
    /// Mandatory sections and separator lines.
    pub strict: bool,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            target: None,
            strict: true,
        }
    }
}

/// Rule files under `target`; a single file is taken as given.
pub fn rule_files(root: &Path, target: Option<&Path>) -> Result<Vec<PathBuf>> {
    let target = match target {
        Some(t) if t.is_absolute() => t.to_path_buf(),
        Some(t) => root.join(t),
        None => paths::rules_dir(root),
    };
    if target.is_file() {
        return Ok(vec![target]);
    }
    paths::find_with_ext(&target, paths::RULE_EXT)
}

fn display_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

pub fn lint_project(root: &Path, config: &Config, opts: &LintOptions) -> Result<LintReport> {
    let linter = RuleLinter::new(&config.lint, opts.strict)?;
    let mut report = LintReport::default();

    for path in rule_files(root, opts.target.as_deref())? {
        let shown = display_path(root, &path);
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!(file = %shown.display(), "linting rule");
        report.findings.extend(linter.lint(&shown, &content));
        report.rule_files += 1;
    }

    for skills_dir in skill_roots(config) {
        for skill_dir in paths::list_dirs(&root.join(skills_dir))? {
            let path = skill_dir.join(paths::SKILL_MD);
            if !path.is_file() {
                report
                    .findings
                    .push(skills::missing_skill_md(&display_path(root, &skill_dir)));
                continue;
            }
            let shown = display_path(root, &path);
            let content = std::fs::read_to_string(&path)?;
            tracing::debug!(file = %shown.display(), "linting skill");
            report
                .findings
                .extend(skills::lint_skill(&shown, &path, &content, &config.lint));
            report.skill_files += 1;
        }
    }

    let agents = paths::agents_dir(root);
    if agents.is_dir() {
        for path in paths::list_files(&agents, "md")? {
            let shown = display_path(root, &path);
            let content = std::fs::read_to_string(&path)?;
            report.findings.extend(skills::lint_agent(&shown, &content));
            report.agent_files += 1;
        }
    }

    let commands = root.join(paths::CLAUDE_COMMANDS_DIR);
    if commands.is_dir() {
        for path in paths::list_files(&commands, "md")? {
            let shown = display_path(root, &path);
            let content = std::fs::read_to_string(&path)?;
            report.findings.extend(skills::lint_command(
                &shown,
                &content,
                config.lint.min_command_chars,
            ));
            report.command_files += 1;
        }
    }

    Ok(report)
}

/// Configured skill roots followed by any skill target not already listed.
fn skill_roots(config: &Config) -> Vec<&str> {
    let mut roots: Vec<&str> = config.lint.skill_roots.iter().map(String::as_str).collect();
    for target in &config.skill_targets {
        if !roots.contains(&target.dir.as_str()) {
            roots.push(&target.dir);
        }
    }
    roots
}
