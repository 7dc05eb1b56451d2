//! Re-emission of classified sections as output documents.
//!
//! Emitters are pure: they return `(path, text)` pairs and leave writing to
//! [`crate::sync`].

use crate::classifier::Category;
use crate::frontmatter::FrontMatter;
use crate::paths::{resource_file_name, QUESTIONS_DIR, SCRIPTS_DIR, SKILL_MD, TEMPLATES_DIR};
use crate::section::{Section, PREAMBLE};
use serde::Serialize;
use std::path::PathBuf;

pub const RESOURCES_BANNER: &str = "# ======== 関連リソース ========";
pub const RESOURCES_KEY: &str = "skill_resources";
pub const PATH_REFERENCE_KEY: &str = "path_reference";

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One generated document. `path` is relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedFile {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum Layout {
    /// Every default section in one document.
    Merged(MergedOptions),
    /// Primary `SKILL.md` plus one file per question and template section.
    Split(SplitOptions),
}

#[derive(Debug, Clone)]
pub struct MergedOptions {
    pub file_name: PathBuf,
    pub front_matter: Option<FrontMatter>,
    /// List where question and template sections live under the split
    /// layout, replacing any existing `skill_resources` section.
    pub resource_index: bool,
}

impl Default for MergedOptions {
    fn default() -> Self {
        Self {
            file_name: PathBuf::from(SKILL_MD),
            front_matter: None,
            resource_index: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub skill_name: String,
    pub description: String,
    /// Master file the skill points at, e.g. `CLAUDE.md`.
    pub path_reference: String,
    /// Script file names bundled under `scripts/`.
    pub scripts: Vec<String>,
}

pub fn emit(sections: &[Section], layout: &Layout) -> Vec<EmittedFile> {
    match layout {
        Layout::Merged(opts) => vec![emit_merged(sections, opts)],
        Layout::Split(opts) => emit_split(sections, opts),
    }
}

// ---------------------------------------------------------------------------
// Merged layout
// ---------------------------------------------------------------------------

fn emit_merged(sections: &[Section], opts: &MergedOptions) -> EmittedFile {
    let parts: Vec<&str> = sections
        .iter()
        .filter(|s| s.category == Category::Default)
        .filter(|s| !(opts.resource_index && s.name == RESOURCES_KEY))
        .map(|s| s.text.as_str())
        .collect();

    let mut text = String::new();
    if let Some(fm) = &opts.front_matter {
        text.push_str(&fm.render());
        text.push('\n');
    }
    if opts.resource_index {
        let questions = of_category(sections, Category::Questions);
        let templates = of_category(sections, Category::Template);
        let index = resource_index(&questions, &templates, &[]);
        if !index.is_empty() {
            text.push_str(&index.join("\n"));
            text.push_str("\n\n");
        }
    }
    if !parts.is_empty() {
        text.push_str(&parts.join("\n\n"));
        text.push('\n');
    }
    EmittedFile {
        path: opts.file_name.clone(),
        text,
    }
}

// ---------------------------------------------------------------------------
// Split layout
// ---------------------------------------------------------------------------

fn emit_split(sections: &[Section], opts: &SplitOptions) -> Vec<EmittedFile> {
    if sections.is_empty() {
        return Vec::new();
    }

    let questions = of_category(sections, Category::Questions);
    let templates = of_category(sections, Category::Template);

    let mut files = vec![EmittedFile {
        path: PathBuf::from(SKILL_MD),
        text: skill_md(sections, &questions, &templates, opts),
    }];
    for (dir, group) in [(QUESTIONS_DIR, &questions), (TEMPLATES_DIR, &templates)] {
        for section in group.iter() {
            files.push(EmittedFile {
                path: PathBuf::from(dir).join(resource_file_name(&section.name)),
                text: format!("# {} - {}\n\n{}\n", opts.skill_name, section.name, section.text),
            });
        }
    }
    files
}

fn skill_md(
    sections: &[Section],
    questions: &[&Section],
    templates: &[&Section],
    opts: &SplitOptions,
) -> String {
    let mut lines: Vec<String> = vec![
        "---".into(),
        format!("name: {}", yaml_scalar(&opts.skill_name)),
        format!("description: {}", yaml_scalar(&opts.description)),
        "---".into(),
        String::new(),
        format!("{PATH_REFERENCE_KEY}: \"{}\"", opts.path_reference),
        String::new(),
    ];

    let index = resource_index(questions, templates, &opts.scripts);
    if !index.is_empty() {
        lines.extend(index);
        lines.push(String::new());
    }

    for section in sections.iter().filter(|s| s.category == Category::Default) {
        if section.name == PATH_REFERENCE_KEY || section.name == RESOURCES_KEY {
            continue;
        }
        let text = if section.name == PREAMBLE {
            strip_path_reference(&section.text)
        } else {
            section.text.clone()
        };
        if text.trim().is_empty() {
            continue;
        }
        lines.push(text);
        lines.push(String::new());
    }

    lines.join("\n")
}

fn of_category(sections: &[Section], category: Category) -> Vec<&Section> {
    sections.iter().filter(|s| s.category == category).collect()
}

fn resource_list(sections: &[&Section]) -> Vec<String> {
    sections.iter().map(|s| resource_file_name(&s.name)).collect()
}

/// Banner plus `skill_resources:` block, or nothing when there is nothing to
/// list.
fn resource_index(questions: &[&Section], templates: &[&Section], scripts: &[String]) -> Vec<String> {
    if questions.is_empty() && templates.is_empty() && scripts.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![RESOURCES_BANNER.to_string(), format!("{RESOURCES_KEY}:")];
    let groups = [
        (QUESTIONS_DIR, resource_list(questions)),
        (TEMPLATES_DIR, resource_list(templates)),
        (SCRIPTS_DIR, scripts.to_vec()),
    ];
    for (dir, names) in groups {
        if names.is_empty() {
            continue;
        }
        lines.push(format!("  {dir}:"));
        lines.extend(names.iter().map(|n| format!("    - \"{dir}/{n}\"")));
    }
    lines
}

fn strip_path_reference(text: &str) -> String {
    text.lines()
        .filter(|l| !l.starts_with("path_reference:"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Quote a front matter value when a plain YAML scalar would misparse or
/// load as something other than this exact string.
pub fn yaml_scalar(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.starts_with(|c: char| "!&*-?{}[]|>'\"%@`#,".contains(c))
        || value != value.trim()
        || value.contains(['\n', '\r', '\t'])
        || !loads_as_string(value);
    if needs_quotes {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

/// `42`, `1.5`, `true`, `null` and `~` load as numbers, booleans or null.
fn loads_as_string(value: &str) -> bool {
    matches!(
        serde_yaml::from_str::<serde_yaml::Value>(value),
        Ok(serde_yaml::Value::String(s)) if s == value
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
