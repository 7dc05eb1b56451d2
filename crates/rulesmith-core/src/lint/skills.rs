//! Checks for skills, agents and slash commands.

use crate::config::LintPolicy;
use crate::frontmatter::{self, FrontMatter};
use crate::lint::rules::{expected_path_reference, path_reference_re};
use crate::lint::Finding;
use crate::paths;
use regex::Regex;
use serde_yaml::Value;
use std::path::Path;
use std::sync::OnceLock;

static HEADING_RE: OnceLock<Regex> = OnceLock::new();
static RESOURCE_REF_RE: OnceLock<Regex> = OnceLock::new();

/// `#` and `##` headings; deeper headings stay inside their section.
fn heading_re() -> &'static Regex {
    HEADING_RE.get_or_init(|| Regex::new(r"^##?\s+(.+?)\s*$").unwrap())
}

fn resource_ref_re() -> &'static Regex {
    RESOURCE_REF_RE.get_or_init(|| Regex::new(r#"\./([^\s)"'`]+)"#).unwrap())
}

/// Suggested fix for a YAML parser message, when one is known.
pub fn yaml_hint(message: &str) -> Option<String> {
    let hint = if message.contains("mapping values are not allowed") {
        "a value contains ': ', so wrap it in double quotes"
    } else if message.contains("could not find expected ':'") {
        "every line must be 'key: value'; check for a missing colon or a broken multi-line value"
    } else if message.contains("found character") && message.contains("cannot start any token") {
        "values starting with '*', '&', '{' or similar must be quoted"
    } else {
        return None;
    };
    Some(hint.to_string())
}

/// Unquoted `description:` values that YAML would read as a nested mapping.
fn unquoted_colon(fm: &FrontMatter) -> Option<(usize, String)> {
    fm.raw.lines().enumerate().find_map(|(idx, line)| {
        let value = line.strip_prefix("description:")?.trim();
        let quoted = value.starts_with('"') || value.starts_with('\'');
        (!value.is_empty() && !quoted && (value.contains(": ") || value.ends_with(':')))
            .then(|| (idx, value.to_string()))
    })
}

/// Parse the front matter into a mapping, reporting why it is not one.
fn parse_mapping(file: &Path, fm: &FrontMatter, out: &mut Vec<Finding>) -> Option<serde_yaml::Mapping> {
    match fm.parse_yaml() {
        Ok(Value::Mapping(map)) => Some(map),
        Ok(other) => {
            let kind = match other {
                Value::Null => "empty",
                Value::Sequence(_) => "a list",
                Value::String(_) => "a string",
                _ => "a scalar",
            };
            out.push(Finding::error(
                file,
                1,
                format!("front matter must be a mapping (found {kind})"),
            ));
            None
        }
        Err(e) => {
            let message = e.to_string();
            out.push(
                Finding::error(file, 1, format!("invalid YAML front matter: {message}"))
                    .with_hint(yaml_hint(&message)),
            );
            None
        }
    }
}

fn check_identity(file: &Path, map: &serde_yaml::Mapping, out: &mut Vec<Finding>) {
    for key in ["name", "description"] {
        let valid = map
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty());
        if !valid {
            out.push(Finding::error(
                file,
                1,
                format!("front matter '{key}' must be a non-empty string"),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Markdown sections
// ---------------------------------------------------------------------------

/// A `#`/`##` section of a markdown file: heading line and body lines, with
/// 1-based file line numbers.
struct MdSection<'c> {
    heading_line: usize,
    lines: Vec<(usize, &'c str)>,
}

impl MdSection<'_> {
    fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|(_, l)| l.contains(needle))
    }
}

fn md_section<'c>(content: &'c str, title: &str) -> Option<MdSection<'c>> {
    let mut lines = content.lines().enumerate();
    let heading_line = lines.by_ref().find_map(|(idx, line)| {
        heading_re()
            .captures(line)
            .and_then(|c| c.get(1))
            .filter(|m| m.as_str().eq_ignore_ascii_case(title))
            .map(|_| idx + 1)
    })?;
    let lines = lines
        .take_while(|(_, line)| !heading_re().is_match(line))
        .map(|(idx, line)| (idx + 1, line))
        .collect();
    Some(MdSection { heading_line, lines })
}

/// `./x` references under `## Resources` that do not exist in the skill folder.
fn check_resources(shown: &Path, skill_dir: &Path, content: &str, out: &mut Vec<Finding>) {
    let Some(section) = md_section(content, "Resources") else {
        return;
    };
    for (line_no, line) in &section.lines {
        for caps in resource_ref_re().captures_iter(line) {
            let Some(rel) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            let target = skill_dir.join(rel.trim_end_matches('/'));
            let exists = if rel.ends_with('/') {
                target.is_dir()
            } else {
                target.exists()
            };
            if !exists {
                out.push(Finding::warning(
                    shown,
                    *line_no,
                    format!("resource './{rel}' does not exist"),
                ));
            }
        }
    }
}

/// The next-action trigger file and the sections that must point at it.
fn check_next_action_triggers(
    shown: &Path,
    skill_dir: &Path,
    content: &str,
    policy: &LintPolicy,
    out: &mut Vec<Finding>,
) {
    let next_action = md_section(content, "Next Action");
    let applies = policy.require_next_action_triggers
        || next_action.is_some()
        || skill_dir.join("triggers").is_dir();
    if !applies {
        return;
    }
    if !skill_dir.join(paths::NEXT_ACTION_TRIGGERS).is_file() {
        out.push(Finding::error(
            shown,
            0,
            format!("missing {}", paths::NEXT_ACTION_TRIGGERS),
        ));
        return;
    }
    let reference = format!("triggers: ./{}", paths::NEXT_ACTION_TRIGGERS);
    let sections = [("Next Action", next_action), ("Resources", md_section(content, "Resources"))];
    for (title, section) in sections {
        let Some(section) = section else { continue };
        if !section.contains(&reference) {
            out.push(
                Finding::error(
                    shown,
                    section.heading_line,
                    format!("'## {title}' does not reference the next-action triggers"),
                )
                .with_hint(Some(reference.clone())),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Skills, agents, commands
// ---------------------------------------------------------------------------

/// Lint one `SKILL.md`. `shown` is the display path; `path` locates the skill
/// folder on disk.
pub fn lint_skill(shown: &Path, path: &Path, content: &str, policy: &LintPolicy) -> Vec<Finding> {
    let mut out = Vec::new();
    let doc = frontmatter::split(content);
    let Some(fm) = doc.front_matter.as_ref() else {
        out.push(Finding::error(shown, 1, "front matter (--- ... ---) is missing"));
        return out;
    };

    if let Some((idx, value)) = unquoted_colon(fm) {
        out.push(
            Finding::error(
                shown,
                doc.front_matter_line + idx,
                "description contains ':' but is not quoted, so YAML misreads it",
            )
            .with_hint(Some(format!("description: \"{value}\""))),
        );
        return out;
    }

    let Some(map) = parse_mapping(shown, fm, &mut out) else {
        return out;
    };
    check_identity(shown, &map, &mut out);

    if let Some(expected) = expected_path_reference(policy, shown) {
        let found = content.lines().enumerate().find_map(|(idx, line)| {
            path_reference_re()
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| (idx, m.as_str()))
        });
        if let Some((idx, actual)) = found {
            if actual != expected {
                out.push(Finding::error(
                    shown,
                    idx + 1,
                    format!("path_reference '{actual}' is wrong here: expected '{expected}'"),
                ));
            }
        }
    }

    for heading in &policy.skill_required_headings {
        if !doc.body.contains(heading.as_str()) {
            out.push(Finding::warning(shown, 0, format!("missing heading '{heading}'")));
        }
    }
    if let Some(skill_dir) = path.parent() {
        for folder in &policy.skill_required_folders {
            if !skill_dir.join(folder).is_dir() {
                out.push(Finding::warning(shown, 0, format!("missing folder '{folder}/'")));
            }
        }
        check_resources(shown, skill_dir, content, &mut out);
        check_next_action_triggers(shown, skill_dir, content, policy, &mut out);
    }
    out
}

/// A skill folder without its `SKILL.md`.
pub fn missing_skill_md(shown_dir: &Path) -> Finding {
    Finding::error(shown_dir, 0, format!("skill folder has no {}", paths::SKILL_MD))
}

/// Lint one agent file under `.claude/agents`.
pub fn lint_agent(shown: &Path, content: &str) -> Vec<Finding> {
    let mut out = Vec::new();
    let doc = frontmatter::split(content);
    let Some(fm) = doc.front_matter.as_ref() else {
        out.push(Finding::error(shown, 1, "front matter (--- ... ---) is missing"));
        return out;
    };
    if let Some(map) = parse_mapping(shown, fm, &mut out) {
        check_identity(shown, &map, &mut out);
    }
    out
}

/// Lint one slash command under `.claude/commands`.
pub fn lint_command(shown: &Path, content: &str, min_chars: usize) -> Vec<Finding> {
    let chars = content.trim().chars().count();
    if chars >= min_chars {
        return Vec::new();
    }
    vec![Finding::error(
        shown,
        0,
        format!("command is too short ({chars} characters, at least {min_chars} required)"),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint::Severity;
    use tempfile::TempDir;

    fn skill(shown: &str, content: &str) -> Vec<Finding> {
        lint_skill(Path::new(shown), Path::new(shown), content, &LintPolicy::default())
    }

    #[test]
    fn valid_skill_is_clean() {
        let content = "---\nname: plan\ndescription: \"Plans: sprints\"\n---\n\npath_reference: \"CLAUDE.md\"\n";
        assert!(skill(".claude/skills/plan/SKILL.md", content).is_empty());
    }

    #[test]
    fn missing_front_matter() {
        let findings = skill(".claude/skills/plan/SKILL.md", "# Plan\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
    }

    #[test]
    fn unquoted_colon_stops_checking() {
        let content = "---\nname: \"\"\ndescription: Usage: run it\n---\n";
        let findings = skill(".claude/skills/plan/SKILL.md", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 3);
        assert_eq!(
            findings[0].hint.as_deref(),
            Some("description: \"Usage: run it\"")
        );
    }

    #[test]
    fn unquoted_colon_line_counts_leading_blank_lines() {
        let content = "\n\n---\nname: plan\ndescription: Usage: run it\n---\n";
        let findings = skill(".claude/skills/plan/SKILL.md", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 5);
    }

    #[test]
    fn non_mapping_front_matter() {
        let findings = skill(".claude/skills/plan/SKILL.md", "---\n- a\n- b\n---\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("a list"));
    }

    #[test]
    fn broken_yaml_is_an_error() {
        let findings = skill(".claude/skills/plan/SKILL.md", "---\nname: [unclosed\n---\n");
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.starts_with("invalid YAML front matter"));
    }

    #[test]
    fn hints_for_common_parser_messages() {
        assert!(yaml_hint("mapping values are not allowed in this context").is_some());
        assert!(yaml_hint("could not find expected ':' at line 3").is_some());
        assert!(yaml_hint("found character that cannot start any token").is_some());
        assert!(yaml_hint("something else").is_none());
    }

    #[test]
    fn identity_fields_must_be_strings() {
        let findings = skill(".claude/skills/plan/SKILL.md", "---\nname: 5\ndescription: \"\"\n---\n");
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn path_reference_by_directory() {
        let content = "---\nname: plan\ndescription: d\n---\npath_reference: \"CLAUDE.md\"\n";
        let findings = skill(".codex/skills/plan/SKILL.md", content);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 5);
        assert!(findings[0].message.contains("expected 'AGENTS.md'"));
    }

    #[test]
    fn required_headings_and_folders() {
        let dir = TempDir::new().unwrap();
        let skill_dir = dir.path().join("plan");
        std::fs::create_dir_all(skill_dir.join("assets")).unwrap();
        let mut policy = LintPolicy::default();
        policy.skill_required_headings = vec!["## Instructions".into(), "## Resources".into()];
        policy.skill_required_folders = vec!["assets".into(), "evaluation".into()];

        let content = "---\nname: plan\ndescription: d\n---\n## Instructions\n";
        let findings = lint_skill(
            Path::new("plan/SKILL.md"),
            &skill_dir.join("SKILL.md"),
            content,
            &policy,
        );
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["missing heading '## Resources'", "missing folder 'evaluation/'"]
        );
        assert!(findings.iter().all(|f| f.severity == Severity::Warning));
    }

    fn skill_in(dir: &Path, body: &str) -> Vec<Finding> {
        let content = format!("---\nname: plan\ndescription: d\n---\n{body}");
        lint_skill(
            Path::new("plan/SKILL.md"),
            &dir.join("SKILL.md"),
            &content,
            &LintPolicy::default(),
        )
    }

    #[test]
    fn resource_references_must_exist() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        std::fs::write(dir.path().join("templates/plan.md"), "t").unwrap();

        let body = "## Resources\n- ./templates/plan.md\n- ./templates/\n- [q](./questions/)\n- ./scripts/run.sh\n## Other\n- ./ignored.md\n";
        let findings = skill_in(dir.path(), body);
        let lines: Vec<(usize, &str)> = findings
            .iter()
            .map(|f| (f.line, f.message.as_str()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (8, "resource './questions/' does not exist"),
                (9, "resource './scripts/run.sh' does not exist"),
            ]
        );
        assert!(findings.iter().all(|f| f.severity == Severity::Warning));
    }

    #[test]
    fn next_action_needs_trigger_file() {
        let dir = TempDir::new().unwrap();
        let findings = skill_in(dir.path(), "## Next Action\nrun the next skill\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[0].message, "missing triggers/next_action_triggers.md");
    }

    #[test]
    fn next_action_and_resources_must_reference_triggers() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("triggers")).unwrap();
        std::fs::write(dir.path().join(paths::NEXT_ACTION_TRIGGERS), "- on: done\n").unwrap();

        let linked = "## Next Action\ntriggers: ./triggers/next_action_triggers.md\n## Resources\n- triggers: ./triggers/next_action_triggers.md\n";
        assert!(skill_in(dir.path(), linked).is_empty());

        let unlinked = "## Next Action\nsee below\n## Resources\n- ./triggers/\n";
        let findings = skill_in(dir.path(), unlinked);
        let lines: Vec<usize> = findings.iter().map(|f| f.line).collect();
        assert_eq!(lines, vec![5, 7]);
        assert!(findings[0].message.contains("'## Next Action'"));
        assert_eq!(
            findings[1].hint.as_deref(),
            Some("triggers: ./triggers/next_action_triggers.md")
        );
    }

    #[test]
    fn triggers_required_by_policy() {
        let dir = TempDir::new().unwrap();
        let mut policy = LintPolicy::default();
        let content = "---\nname: plan\ndescription: d\n---\n# Plan\n";
        let shown = Path::new("plan/SKILL.md");
        let path = dir.path().join("SKILL.md");
        assert!(lint_skill(shown, &path, content, &policy).is_empty());
        policy.require_next_action_triggers = true;
        assert_eq!(lint_skill(shown, &path, content, &policy).len(), 1);
    }

    #[test]
    fn short_commands() {
        let shown = Path::new(".claude/commands/plan.md");
        let findings = lint_command(shown, "  /plan \n", 10);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("5 characters"));
        assert!(lint_command(shown, "Run the planning skill.", 10).is_empty());
        assert!(lint_command(shown, "計画を立てるスキルを実行する", 10).is_empty());
    }

    #[test]
    fn agent_files() {
        let shown = Path::new(".claude/agents/plan.md");
        assert!(lint_agent(shown, "---\nname: plan\ndescription: Plans\n---\nbody\n").is_empty());
        assert_eq!(lint_agent(shown, "body only\n").len(), 1);
        let missing = lint_agent(shown, "---\nname: plan\n---\n");
        assert_eq!(missing.len(), 1);
        assert!(missing[0].message.contains("'description'"));
    }
}
