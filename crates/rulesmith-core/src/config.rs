use crate::error::Result;
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Lint policy
// ---------------------------------------------------------------------------

/// Entry-level schema for literal blocks: every entry starts at
/// `- <marker>:` and must carry the `required` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySchema {
    pub marker: String,
    pub required: Vec<String>,
    /// Report forbidden fields inside literal entries too.
    #[serde(default)]
    pub check_forbidden: bool,
    /// `name:` lines (the pre-list map form) are an error.
    #[serde(default)]
    pub forbid_map_form: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionKind {
    pub kind: String,
    /// Regex matched against the key line.
    pub pattern: String,
    /// `None` means free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_fields: Option<Vec<String>>,
    #[serde(default)]
    pub forbidden_fields: Vec<String>,
    #[serde(default)]
    pub literal_block: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntrySchema>,
}

/// One of the sections every rule must carry, announced by a
/// `# ======== <header> ========` separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MandatorySection {
    /// Short name; separators whose title starts with it count.
    pub name: String,
    pub header: String,
    /// Section kind whose key satisfies the requirement.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathReference {
    /// Directory marker such as `.claude`.
    pub dir: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintPolicy {
    pub section_kinds: Vec<SectionKind>,
    pub section_order: Vec<String>,
    pub deprecated_sections: Vec<String>,
    pub deprecated_patterns: Vec<String>,
    pub mandatory_sections: Vec<MandatorySection>,
    pub path_references: Vec<PathReference>,
    /// Key patterns exempt from the category/items structure check.
    pub standard_sections: Vec<String>,
    pub skill_required_headings: Vec<String>,
    pub skill_required_folders: Vec<String>,
    /// Directories whose subdirectories are skills. Skill target dirs are
    /// linted as well.
    pub skill_roots: Vec<String>,
    /// Every skill must ship `triggers/next_action_triggers.md`. Otherwise the
    /// check runs only for skills with a Next Action section or a `triggers/`
    /// folder.
    pub require_next_action_triggers: bool,
    /// Slash command files shorter than this (trimmed) are errors.
    pub min_command_chars: usize,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn kind(
    kind: &str,
    pattern: &str,
    allowed: Option<&[&str]>,
    forbidden: &[&str],
    literal_block: bool,
    entry: Option<EntrySchema>,
) -> SectionKind {
    SectionKind {
        kind: kind.into(),
        pattern: pattern.into(),
        allowed_fields: allowed.map(strings),
        forbidden_fields: strings(forbidden),
        literal_block,
        entry,
    }
}

fn entry(marker: &str, required: &[&str], check_forbidden: bool, forbid_map_form: bool) -> Option<EntrySchema> {
    Some(EntrySchema {
        marker: marker.into(),
        required: strings(required),
        check_forbidden,
        forbid_map_form,
    })
}

fn mandatory(name: &str, header: &str, kind: &str) -> MandatorySection {
    MandatorySection {
        name: name.into(),
        header: header.into(),
        kind: kind.into(),
    }
}

impl Default for LintPolicy {
    fn default() -> Self {
        Self {
            // `prompt` first: `prompt_why_questions` is a prompt, not questions.
            section_kinds: vec![
                kind("prompt", r"^prompt_\w+:", None, &[], true, None),
                kind(
                    "questions",
                    r"^\w+_questions:",
                    Some(&["key", "question", "category"][..]),
                    &["type", "required", "condition", "mandatory", "name", "message"],
                    true,
                    entry("key", &["key", "question"], false, false),
                ),
                kind(
                    "workflow",
                    r"^\w+_(process|workflow):",
                    Some(&["label", "action", "description"][..]),
                    &[
                        "path", "template_reference", "priority", "trigger", "name", "message",
                        "command", "category", "items", "phase", "step", "steps", "tasks",
                    ],
                    true,
                    entry("label", &["label", "action", "description"], true, false),
                ),
                kind(
                    "next_phases",
                    r"^next_phases:",
                    Some(&["on", "rule", "description"][..]),
                    &["trigger", "action", "target"],
                    true,
                    entry("on", &["on", "rule", "description"], false, false),
                ),
                kind("template", r"^\w+_template:", None, &[], true, None),
                kind("system_capabilities", r"^system_capabilities:", None, &[], false, None),
                kind(
                    "error_handling",
                    r"^error_handling:",
                    Some(&["id", "message", "recovery_actions"][..]),
                    &["name", "type", "code", "action"],
                    true,
                    entry("id", &["id", "message", "recovery_actions"], false, true),
                ),
            ],
            section_order: strings(&[
                "system_capabilities",
                "prompt",
                "workflow",
                "questions",
                "template",
                "next_phases",
                "error_handling",
            ]),
            deprecated_sections: strings(&["success_metrics", "integration_points"]),
            deprecated_patterns: strings(&[r"^\w+_settings:"]),
            mandatory_sections: vec![
                mandatory("Agent機能", "Agent機能", "system_capabilities"),
                mandatory("プロンプト", "プロンプト（目的と使い方）", "prompt"),
                mandatory("ワークフロー", "ワークフロー", "workflow"),
                mandatory("質問", "質問", "questions"),
                mandatory("テンプレート", "テンプレート", "template"),
                mandatory("次フェーズ連携", "次フェーズ連携", "next_phases"),
                mandatory("エラーハンドリング", "エラーハンドリング", "error_handling"),
            ],
            path_references: vec![
                PathReference {
                    dir: ".claude".into(),
                    expected: "CLAUDE.md".into(),
                },
                PathReference {
                    dir: ".codex".into(),
                    expected: "AGENTS.md".into(),
                },
                PathReference {
                    dir: ".cursor".into(),
                    expected: "AGENTS.md".into(),
                },
            ],
            standard_sections: strings(&[
                r"^\w+_(process|workflow):",
                r"^\w+_questions:",
                r"^\w+_template:",
                r"^prompt_\w+:",
                r"^system_capabilities:",
                r"^next_phases:",
                r"^error_handling:",
                r"^path_reference:",
                r"^description:",
                r"^globs:",
                r"^baseline_rule:",
                r"^system_description:",
            ]),
            skill_required_headings: Vec::new(),
            skill_required_folders: Vec::new(),
            skill_roots: strings(&[
                paths::CURSOR_SKILLS_DIR,
                paths::CLAUDE_SKILLS_DIR,
                paths::CODEX_SKILLS_DIR,
            ]),
            require_next_action_triggers: false,
            min_command_chars: 10,
        }
    }
}

impl LintPolicy {
    pub fn kind(&self, name: &str) -> Option<&SectionKind> {
        self.section_kinds.iter().find(|k| k.kind == name)
    }

    /// Every regex the policy carries, for validation.
    fn patterns(&self) -> impl Iterator<Item = &str> {
        self.section_kinds
            .iter()
            .map(|k| k.pattern.as_str())
            .chain(self.deprecated_patterns.iter().map(String::as_str))
            .chain(self.standard_sections.iter().map(String::as_str))
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// A skills directory and the master file its skills point at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTarget {
    pub dir: String,
    pub path_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub lint: LintPolicy,
    #[serde(default = "default_skill_targets")]
    pub skill_targets: Vec<SkillTarget>,
    #[serde(default = "default_master_outputs")]
    pub master_outputs: Vec<String>,
    /// Directories searched for scripts referenced from rules.
    #[serde(default = "default_script_dirs")]
    pub script_dirs: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_skill_targets() -> Vec<SkillTarget> {
    vec![
        SkillTarget {
            dir: paths::CLAUDE_SKILLS_DIR.into(),
            path_reference: paths::CLAUDE_MD.into(),
        },
        SkillTarget {
            dir: paths::CODEX_SKILLS_DIR.into(),
            path_reference: paths::AGENTS_MD.into(),
        },
    ]
}

fn default_master_outputs() -> Vec<String> {
    strings(&[
        "CLAUDE.md",
        "AGENTS.md",
        ".gemini/GEMINI.md",
        ".kiro/steering/KIRO.md",
        ".github/copilot-instructions.md",
    ])
}

fn default_script_dirs() -> Vec<String> {
    strings(&["scripts", "commons_scripts"])
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            lint: LintPolicy::default(),
            skill_targets: default_skill_targets(),
            master_outputs: default_master_outputs(),
            script_dirs: default_script_dirs(),
        }
    }
}

impl Config {
    /// Load `.rulesmith/config.yaml`, or the built-in defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let policy = &self.lint;

        for pattern in policy.patterns() {
            if let Err(e) = Regex::new(pattern) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid pattern '{pattern}': {e}"),
                });
            }
        }

        let mut seen = HashSet::new();
        for k in &policy.section_kinds {
            if !seen.insert(k.kind.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("section kind '{}' is defined more than once", k.kind),
                });
            }
            if let Some(entry) = &k.entry {
                if !entry.required.contains(&entry.marker) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "entry marker '{}' of kind '{}' is not a required field",
                            entry.marker, k.kind
                        ),
                    });
                }
            }
        }

        for name in &policy.section_order {
            if policy.kind(name).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("section_order names unknown kind '{name}'"),
                });
            }
        }
        for m in &policy.mandatory_sections {
            if policy.kind(&m.kind).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "mandatory section '{}' refers to unknown kind '{}'",
                        m.name, m.kind
                    ),
                });
            }
        }

        if self.skill_targets.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no skill_targets configured: skills will not be generated".into(),
            });
        }
        if self.master_outputs.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "no master_outputs configured: master files will not be written".into(),
            });
        }
        for out in &self.master_outputs {
            if paths::validate_relative(Path::new(out)).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("master output '{out}' must be a relative path inside the project"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
