//! Conversions between Cursor rules, Claude agents and skills.
//!
//! Everything here is pure: inputs are file names and contents, outputs are
//! [`EmittedFile`]s for [`crate::sync`] to write.

use crate::emit::{self, yaml_scalar, EmittedFile, Layout, SplitOptions};
use crate::error::Result;
use crate::frontmatter::{self, FrontMatter};
use crate::paths::{self, SCRIPTS_DIR};
use crate::section;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DEFAULT_AGENT_DESCRIPTION: &str = "Agent for handling specific presentation tasks";
pub const DEFAULT_RULE_DESCRIPTION: &str = "Rule for handling specific tasks";

// ---------------------------------------------------------------------------
// Source files
// ---------------------------------------------------------------------------

/// A rule or agent file as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name including extension, e.g. `10_plan.mdc`.
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Files in `dir` with any of `exts`, sorted by name.
    pub fn load_dir(dir: &Path, exts: &[&str]) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();
        for ext in exts {
            for path in paths::list_files(dir, ext)? {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                files.push(SourceFile::new(name, std::fs::read_to_string(&path)?));
            }
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    pub fn has_ext(&self, ext: &str) -> bool {
        Path::new(&self.name).extension().is_some_and(|e| e == ext)
    }

    /// Non-empty front matter `description`.
    pub fn description(&self) -> Option<String> {
        frontmatter::split(&self.content)
            .front_matter?
            .get("description")
            .filter(|d| !d.is_empty())
            .map(str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Front matter builders
// ---------------------------------------------------------------------------

/// Cursor rule front matter. Master rules always apply.
pub fn cursor_front_matter(stem: &str, description: &str) -> FrontMatter {
    let always = paths::is_master_rule(stem);
    FrontMatter::new(&format!(
        "description: {}\nglobs:\nalwaysApply: {always}",
        yaml_scalar(description)
    ))
}

pub fn agent_front_matter(name: &str, description: &str) -> FrontMatter {
    FrontMatter::new(&format!(
        "name: {}\ndescription: {}",
        yaml_scalar(name),
        yaml_scalar(description)
    ))
}

fn with_front_matter(fm: &FrontMatter, body: &str) -> String {
    format!("{}\n{}", fm.render(), body)
}

// ---------------------------------------------------------------------------
// Reference rewriting
// ---------------------------------------------------------------------------

static CALL_MDC_RE: OnceLock<Regex> = OnceLock::new();
static RULE_MDC_RE: OnceLock<Regex> = OnceLock::new();
static CALL_AGENT_RE: OnceLock<Regex> = OnceLock::new();
static RULE_AGENT_RE: OnceLock<Regex> = OnceLock::new();
static SCRIPT_REF_RE: OnceLock<Regex> = OnceLock::new();

fn call_mdc_re() -> &'static Regex {
    CALL_MDC_RE.get_or_init(|| Regex::new(r#"(action:\s*"call\s+)([^"\s=>]+)\.mdc"#).unwrap())
}

fn rule_mdc_re() -> &'static Regex {
    RULE_MDC_RE.get_or_init(|| Regex::new(r#"(rule:\s*")([^"]+)\.mdc""#).unwrap())
}

fn call_agent_re() -> &'static Regex {
    CALL_AGENT_RE
        .get_or_init(|| Regex::new(r#"(action:\s*"call\s+)\.claude/agents/([^"\s=>]+)\.md\b"#).unwrap())
}

fn rule_agent_re() -> &'static Regex {
    RULE_AGENT_RE.get_or_init(|| Regex::new(r#"(rule:\s*")\.claude/agents/([^"/]+)\.md""#).unwrap())
}

fn script_ref_re() -> &'static Regex {
    SCRIPT_REF_RE.get_or_init(|| {
        Regex::new(r"(?:scripts|commons_scripts)/([\w\-]+\.(?:py|sh|ps1))").unwrap()
    })
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `call X.mdc` and `rule: ".cursor/rules/X.mdc"` become `.claude/agents/X.md`.
pub fn to_agent_paths(text: &str) -> String {
    let calls = call_mdc_re().replace_all(text, |c: &Captures| {
        format!("{}{}/{}.md", &c[1], paths::CLAUDE_AGENTS_DIR, last_segment(&c[2]))
    });
    rule_mdc_re()
        .replace_all(&calls, |c: &Captures| {
            format!("{}{}/{}.md\"", &c[1], paths::CLAUDE_AGENTS_DIR, last_segment(&c[2]))
        })
        .into_owned()
}

/// Inverse of [`to_agent_paths`]; rule references come back as bare file names.
pub fn to_rule_paths(text: &str) -> String {
    let calls = call_agent_re().replace_all(text, "${1}${2}.mdc");
    rule_agent_re()
        .replace_all(&calls, "${1}${2}.mdc\"")
        .into_owned()
}

/// Script file names referenced as `scripts/x.py` or `commons_scripts/x.sh`.
pub fn referenced_scripts(text: &str) -> BTreeSet<String> {
    script_ref_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Rules <-> agents
// ---------------------------------------------------------------------------

/// `.cursor/rules` to `.claude/agents`. Master rules are copied as-is.
pub fn rules_to_agents(rules: &[SourceFile]) -> Vec<EmittedFile> {
    rules
        .iter()
        .map(|rule| {
            if paths::is_master_rule(&rule.name) {
                return EmittedFile {
                    path: PathBuf::from(&rule.name),
                    text: rule.content.clone(),
                };
            }
            let stem = rule.stem();
            let description = rule
                .description()
                .unwrap_or_else(|| DEFAULT_AGENT_DESCRIPTION.to_string());
            EmittedFile {
                path: PathBuf::from(format!("{stem}.md")),
                text: with_front_matter(
                    &agent_front_matter(stem, &description),
                    &frontmatter::strip(&rule.content),
                ),
            }
        })
        .collect()
}

/// `.claude/agents` back to `.cursor/rules`. Master `.mdc` copies return
/// verbatim; other `.mdc` files in the agents directory are ignored.
pub fn agents_to_rules(agents: &[SourceFile]) -> Vec<EmittedFile> {
    let mut out = Vec::new();
    for agent in agents {
        if agent.has_ext(paths::RULE_EXT) {
            if paths::is_master_rule(&agent.name) {
                out.push(EmittedFile {
                    path: PathBuf::from(&agent.name),
                    text: agent.content.clone(),
                });
            } else {
                tracing::debug!(file = %agent.name, "skipping non-master .mdc in agents");
            }
            continue;
        }
        let stem = agent.stem();
        let description = agent
            .description()
            .unwrap_or_else(|| DEFAULT_RULE_DESCRIPTION.to_string());
        out.push(EmittedFile {
            path: PathBuf::from(format!("{stem}.{}", paths::RULE_EXT)),
            text: with_front_matter(
                &cursor_front_matter(stem, &description),
                &frontmatter::strip(&agent.content),
            ),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// Generated skill: `files` are relative to the skill's own directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillBundle {
    pub name: String,
    pub files: Vec<EmittedFile>,
}

/// Rules that become skills: everything except master and path files.
pub fn is_skill_source(file_name: &str) -> bool {
    !file_name.to_lowercase().contains("paths") && !file_name.contains("00")
}

/// Scripts referenced anywhere in `rule`, resolved against `script_dirs`
/// under `root` (first hit wins). Unresolved names are logged and dropped.
pub fn find_scripts(root: &Path, script_dirs: &[String], rule: &SourceFile) -> Result<Vec<(String, String)>> {
    let mut found = Vec::new();
    for name in referenced_scripts(&rule.content) {
        let hit = script_dirs
            .iter()
            .map(|d| root.join(d).join(&name))
            .find(|p| p.is_file());
        match hit {
            Some(path) => found.push((name, std::fs::read_to_string(&path)?)),
            None => tracing::debug!(script = %name, rule = %rule.name, "referenced script not found"),
        }
    }
    Ok(found)
}

/// Split-layout skill for one rule, or `None` when the rule is excluded or
/// has no content.
pub fn skill_bundle(rule: &SourceFile, path_reference: &str, scripts: &[(String, String)]) -> Option<SkillBundle> {
    if !is_skill_source(&rule.name) {
        return None;
    }
    let name = paths::skill_name_for_stem(rule.stem());
    let description = rule
        .description()
        .unwrap_or_else(|| format!("Skill for {name}"));
    let body = frontmatter::split(&rule.content).body;
    let sections = section::segment(&body);

    let layout = Layout::Split(SplitOptions {
        skill_name: name.clone(),
        description,
        path_reference: path_reference.to_string(),
        scripts: scripts.iter().map(|(n, _)| n.clone()).collect(),
    });
    let mut files = emit::emit(&sections, &layout);
    if files.is_empty() {
        tracing::debug!(rule = %rule.name, "no content, skipping skill");
        return None;
    }
    files.extend(scripts.iter().map(|(n, text)| EmittedFile {
        path: Path::new(SCRIPTS_DIR).join(n),
        text: text.clone(),
    }));
    Some(SkillBundle { name, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RULE: &str = "---\ndescription: Plans sprints\nglobs:\n---\n\n# ======== Agent ========\nsystem_capabilities:\n  - plans sprint work\nplan_process: |\n  - label: go\n    action: \"call 11_execute.mdc => run\"\n    description: run scripts/check.py\nnext_phases: |\n  - on: done\n    rule: \".cursor/rules/12_review.mdc\"\n    description: review\n";

    #[test]
    fn path_rewriting_both_ways() {
        let text = "action: \"call 11_execute.mdc => run\"\nrule: \".cursor/rules/12_review.mdc\"\n";
        let agents = to_agent_paths(text);
        assert_eq!(
            agents,
            "action: \"call .claude/agents/11_execute.md => run\"\nrule: \".claude/agents/12_review.md\"\n"
        );
        assert_eq!(
            to_rule_paths(&agents),
            "action: \"call 11_execute.mdc => run\"\nrule: \"12_review.mdc\"\n"
        );
    }

    #[test]
    fn unrelated_references_untouched() {
        let text = "see 11_execute.mdc\naction: \"call helper.md\"\n";
        assert_eq!(to_agent_paths(text), text);
        assert_eq!(to_rule_paths(text), text);
    }

    #[test]
    fn script_references() {
        let found = referenced_scripts("run scripts/a.py then commons_scripts/b-c.sh and scripts/a.py; not scripts/x.rb");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["a.py", "b-c.sh"]);
    }

    #[test]
    fn rules_become_agents() {
        let rules = vec![
            SourceFile::new("00_master_rules.mdc", "---\nalwaysApply: true\n---\nmaster\n"),
            SourceFile::new("10_plan.mdc", RULE),
            SourceFile::new("20_bare.mdc", "body only\n"),
        ];
        let agents = rules_to_agents(&rules);
        assert_eq!(agents[0].path, PathBuf::from("00_master_rules.mdc"));
        assert_eq!(agents[0].text, rules[0].content);
        assert_eq!(agents[1].path, PathBuf::from("10_plan.md"));
        assert!(agents[1]
            .text
            .starts_with("---\nname: 10_plan\ndescription: Plans sprints\n---\n\n# ======== Agent"));
        assert!(agents[2].text.contains(DEFAULT_AGENT_DESCRIPTION));
    }

    #[test]
    fn agents_become_rules() {
        let agents = vec![
            SourceFile::new("00_master_rules.mdc", "master\n"),
            SourceFile::new("10_plan.md", "---\nname: 10_plan\ndescription: Plans sprints\n---\n\nbody\n"),
            SourceFile::new("11_other.mdc", "ignored\n"),
            SourceFile::new("12_nodesc.md", "body\n"),
        ];
        let rules = agents_to_rules(&agents);
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].text, "master\n");
        assert_eq!(
            rules[1].text,
            "---\ndescription: Plans sprints\nglobs:\nalwaysApply: false\n---\n\nbody\n"
        );
        assert_eq!(rules[2].path, PathBuf::from("12_nodesc.mdc"));
        assert!(rules[2].text.contains(DEFAULT_RULE_DESCRIPTION));
    }

    #[test]
    fn agent_round_trip_keeps_body() {
        let rules = vec![SourceFile::new("10_plan.mdc", RULE)];
        let agents: Vec<SourceFile> = rules_to_agents(&rules)
            .into_iter()
            .map(|f| SourceFile::new(f.path.to_string_lossy(), f.text))
            .collect();
        let back = agents_to_rules(&agents);
        assert_eq!(frontmatter::strip(&back[0].text), frontmatter::strip(RULE));
        assert_eq!(SourceFile::new("x.mdc", back[0].text.clone()).description().as_deref(), Some("Plans sprints"));
    }

    #[test]
    fn master_front_matter_always_applies() {
        let fm = cursor_front_matter("00_master_rules", "Generated from AGENTS.md");
        assert_eq!(fm.get("alwaysApply"), Some("true"));
        assert!(fm.has_key("globs"));
    }

    #[test]
    fn skill_exclusions() {
        assert!(!is_skill_source("00_master_rules.mdc"));
        assert!(!is_skill_source("01_Project_Paths.mdc"));
        assert!(is_skill_source("10_plan.mdc"));
        let master = SourceFile::new("00_master_rules.mdc", RULE);
        assert!(skill_bundle(&master, "CLAUDE.md", &[]).is_none());
        let empty = SourceFile::new("10_empty.mdc", "---\ndescription: x\n---\n\n");
        assert!(skill_bundle(&empty, "CLAUDE.md", &[]).is_none());
    }

    #[test]
    fn skill_bundle_contents() {
        let rule = SourceFile::new("10_sprint_Plan.mdc", RULE);
        let scripts = vec![("check.py".to_string(), "print('ok')\n".to_string())];
        let bundle = skill_bundle(&rule, "AGENTS.md", &scripts).unwrap();
        assert_eq!(bundle.name, "sprint-plan");
        let paths: Vec<PathBuf> = bundle.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("SKILL.md"), Path::new(SCRIPTS_DIR).join("check.py")]);
        let skill = &bundle.files[0].text;
        assert!(skill.starts_with("---\nname: sprint-plan\ndescription: Plans sprints\n---\n"));
        assert!(skill.contains("path_reference: \"AGENTS.md\""));
        assert!(skill.contains("    - \"scripts/check.py\""));
    }

    #[test]
    fn generated_skill_with_numeric_values_lints_clean() {
        let rule = SourceFile::new(
            "10_2024.mdc",
            "---\ndescription: \"42\"\nglobs:\n---\nintro:\n  a plain introduction\n",
        );
        let bundle = skill_bundle(&rule, "CLAUDE.md", &[]).unwrap();
        let skill = &bundle.files[0].text;
        assert!(skill.starts_with("---\nname: \"2024\"\ndescription: \"42\"\n---\n"));

        let shown = Path::new(".claude/skills/2024/SKILL.md");
        let findings =
            crate::lint::skills::lint_skill(shown, shown, skill, &crate::config::LintPolicy::default());
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn default_skill_description() {
        let rule = SourceFile::new("10_plan.mdc", "intro:\n  a plain introduction\n");
        let bundle = skill_bundle(&rule, "CLAUDE.md", &[]).unwrap();
        assert!(bundle.files[0].text.contains("description: Skill for plan\n"));
    }

    #[test]
    fn scripts_resolved_from_search_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("commons_scripts")).unwrap();
        std::fs::write(dir.path().join("commons_scripts/check.py"), "print(1)\n").unwrap();
        let rule = SourceFile::new("10_plan.mdc", RULE.replace("scripts/check.py", "commons_scripts/check.py and scripts/missing.sh"));
        let dirs = vec!["scripts".to_string(), "commons_scripts".to_string()];
        let found = find_scripts(dir.path(), &dirs, &rule).unwrap();
        assert_eq!(found, vec![("check.py".to_string(), "print(1)\n".to_string())]);
    }

    #[test]
    fn load_dir_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.mdc"), "a").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();
        let files = SourceFile::load_dir(dir.path(), &["md", "mdc"]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mdc", "b.md"]);
    }
}
