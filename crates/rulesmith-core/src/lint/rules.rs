use crate::config::{LintPolicy, SectionKind};
use crate::error::{Result, RuleError};
use crate::frontmatter::{self, FrontMatter};
use crate::lint::Finding;
use crate::paths;
use crate::section::{self, Section};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Fixed patterns
// ---------------------------------------------------------------------------

static FIELD_RE: OnceLock<Regex> = OnceLock::new();
static MAP_FORM_RE: OnceLock<Regex> = OnceLock::new();
static PATHS_FILE_REF_RE: OnceLock<Regex> = OnceLock::new();
static PATH_REFERENCE_RE: OnceLock<Regex> = OnceLock::new();
static HEADER_RE: OnceLock<Regex> = OnceLock::new();
static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();

fn field_re() -> &'static Regex {
    FIELD_RE.get_or_init(|| Regex::new(r"^-?\s*(\w+):").unwrap())
}

fn map_form_re() -> &'static Regex {
    MAP_FORM_RE.get_or_init(|| Regex::new(r"^\w+:$").unwrap())
}

fn paths_file_ref_re() -> &'static Regex {
    PATHS_FILE_REF_RE.get_or_init(|| Regex::new(r"\w+_paths\.mdc").unwrap())
}

/// `path_reference: "X"` with either quote style; shared with the skill linter.
pub(crate) fn path_reference_re() -> &'static Regex {
    PATH_REFERENCE_RE.get_or_init(|| Regex::new(r#"^path_reference:\s*["'](.+)["']"#).unwrap())
}

fn header_re() -> &'static Regex {
    HEADER_RE.get_or_init(|| Regex::new(r"^#\s*=+\s*(.+?)\s*=+\s*$").unwrap())
}

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| Regex::new(r"^#\s*(=+)\s+([^=]+?)\s+(=+)\s*$").unwrap())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RuleError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn compile_all<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<Vec<Regex>> {
    patterns.map(compile).collect()
}

/// Expected `path_reference` for a file, from the first directory marker in
/// its path.
pub(crate) fn expected_path_reference<'p>(policy: &'p LintPolicy, file: &Path) -> Option<&'p str> {
    policy
        .path_references
        .iter()
        .find(|r| file.components().any(|c| c.as_os_str() == r.dir.as_str()))
        .map(|r| r.expected.as_str())
}

// ---------------------------------------------------------------------------
// Per-file context
// ---------------------------------------------------------------------------

struct FileCtx<'a> {
    file: &'a Path,
    lines: Vec<&'a str>,
    offset: usize,
}

impl FileCtx<'_> {
    /// 1-based file line for a body line index.
    fn line(&self, body_idx: usize) -> usize {
        body_idx + self.offset + 1
    }

    fn error(&self, body_idx: usize, message: impl Into<String>) -> Finding {
        Finding::error(self.file, self.line(body_idx), message)
    }

    fn warning(&self, body_idx: usize, message: impl Into<String>) -> Finding {
        Finding::warning(self.file, self.line(body_idx), message)
    }

    /// Trimmed, non-comment lines after the key line, outside code fences.
    fn field_lines(&self, s: &Section) -> Vec<(usize, &str)> {
        let mut out = Vec::new();
        let mut in_fence = false;
        for idx in s.key_line + 1..s.end_line.min(self.lines.len()) {
            let trimmed = self.lines[idx].trim();
            if trimmed.starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence || trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            out.push((idx, trimmed));
        }
        out
    }
}

fn field_name(trimmed: &str) -> Option<&str> {
    field_re()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// RuleLinter
// ---------------------------------------------------------------------------

pub struct RuleLinter<'p> {
    policy: &'p LintPolicy,
    strict: bool,
    kinds: Vec<Regex>,
    deprecated_patterns: Vec<Regex>,
    standard: Vec<Regex>,
    mandatory_headers: Vec<Regex>,
}

impl<'p> RuleLinter<'p> {
    /// Compile the policy's patterns. Fails on the first invalid one.
    pub fn new(policy: &'p LintPolicy, strict: bool) -> Result<Self> {
        Ok(Self {
            policy,
            strict,
            kinds: compile_all(policy.section_kinds.iter().map(|k| k.pattern.as_str()))?,
            deprecated_patterns: compile_all(policy.deprecated_patterns.iter().map(String::as_str))?,
            standard: compile_all(policy.standard_sections.iter().map(String::as_str))?,
            mandatory_headers: policy
                .mandatory_sections
                .iter()
                .map(|m| compile(&format!(r"#\s*=+\s*{}\s*=+", regex::escape(&m.header))))
                .collect::<Result<_>>()?,
        })
    }

    /// Kind of a key line, first matching pattern wins.
    fn kind_of(&self, key_line: &str) -> Option<&'p SectionKind> {
        let trimmed = key_line.trim();
        self.kinds
            .iter()
            .position(|re| re.is_match(trimmed))
            .map(|i| &self.policy.section_kinds[i])
    }

    /// `(kind, section name)` for every top-level section; `other` when no
    /// kind matches.
    pub fn section_kinds(&self, content: &str) -> Vec<(String, String)> {
        let doc = frontmatter::split(content);
        let lines: Vec<&str> = doc.body.lines().collect();
        section::scan(&doc.body)
            .into_iter()
            .map(|s| {
                let kind = self
                    .kind_of(lines[s.key_line])
                    .map_or("other", |k| k.kind.as_str());
                (kind.to_string(), s.name)
            })
            .collect()
    }

    pub fn lint(&self, file: &Path, content: &str) -> Vec<Finding> {
        let doc = frontmatter::split(content);
        let ctx = FileCtx {
            file,
            lines: doc.body.lines().collect(),
            offset: doc.body_line_offset,
        };
        let sections = section::scan(&doc.body);
        let typed: Vec<(Option<&SectionKind>, &Section)> = sections
            .iter()
            .map(|s| (self.kind_of(ctx.lines[s.key_line]), s))
            .collect();

        let mut out = Vec::new();
        if paths::is_paths_file(&file_name(file)) {
            out.push(Finding::error(
                file,
                0,
                "path definition files are retired: move paths into CLAUDE.md/AGENTS.md and delete this file",
            ));
        }
        self.check_front_matter(file, doc.front_matter.as_ref(), &mut out);

        for (kind, s) in &typed {
            if let Some(kind) = kind {
                self.check_fields(&ctx, kind, s, &mut out);
                self.check_literal_format(&ctx, kind, s, &mut out);
                self.check_entries(&ctx, kind, s, &mut out);
            } else {
                self.check_nonstandard(&ctx, s, &mut out);
            }
        }
        self.check_order(&ctx, &typed, &mut out);
        self.check_lines(&ctx, &mut out);

        if self.strict {
            self.check_mandatory(&ctx, &typed, &mut out);
            self.check_separators(&ctx, &mut out);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Front matter
    // -----------------------------------------------------------------------

    fn check_front_matter(&self, file: &Path, fm: Option<&FrontMatter>, out: &mut Vec<Finding>) {
        let Some(fm) = fm else {
            out.push(Finding::error(file, 1, "front matter (--- ... ---) is missing"));
            return;
        };
        if !fm.has_key("description") {
            out.push(Finding::error(file, 1, "front matter is missing 'description'"));
        }
        // `alwaysApply` belongs to the globs block; without it there is
        // nothing further to check.
        if !fm.has_key("globs") {
            out.push(Finding::error(file, 1, "front matter is missing the 'globs' block"));
            return;
        }

        let name = file_name(file);
        let expected = if name.starts_with("00_") || paths::is_paths_file(&name) {
            "true"
        } else {
            "false"
        };
        let Some(raw) = fm.get("alwaysApply").or_else(|| fm.get("alwaysapply")) else {
            out.push(Finding::error(
                file,
                1,
                format!("globs block is missing 'alwaysApply' (expected {expected})"),
            ));
            return;
        };
        let value = raw.replace('"', "").trim().to_ascii_lowercase();
        if value != expected {
            out.push(Finding::error(
                file,
                1,
                format!("alwaysApply should be {expected} but was {}", raw.trim()),
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Section checks
    // -----------------------------------------------------------------------

    fn check_fields(&self, ctx: &FileCtx, kind: &SectionKind, s: &Section, out: &mut Vec<Finding>) {
        // Literal blocks are prose to YAML; entries are checked separately.
        if s.literal {
            return;
        }
        for (idx, trimmed) in ctx.field_lines(s) {
            let Some(field) = field_name(trimmed) else {
                continue;
            };
            if kind.forbidden_fields.iter().any(|f| f == field) {
                out.push(ctx.error(
                    idx,
                    format!("[{}] forbidden field '{field}' in a {} section", s.name, kind.kind),
                ));
            }
            if let Some(allowed) = &kind.allowed_fields {
                if trimmed.starts_with('-') && !allowed.iter().any(|f| f == field) {
                    out.push(ctx.warning(
                        idx,
                        format!(
                            "[{}] non-standard field '{field}' (allowed: {})",
                            s.name,
                            allowed.join(", ")
                        ),
                    ));
                }
            }
        }
    }

    fn check_literal_format(&self, ctx: &FileCtx, kind: &SectionKind, s: &Section, out: &mut Vec<Finding>) {
        if kind.literal_block && !s.literal {
            out.push(ctx.warning(
                s.key_line,
                format!("[{}] multi-line sections should use a '|' literal block", s.name),
            ));
        }
    }

    fn check_entries(&self, ctx: &FileCtx, kind: &SectionKind, s: &Section, out: &mut Vec<Finding>) {
        let Some(entry) = kind.entry.as_ref().filter(|_| s.literal) else {
            return;
        };
        let marker = format!("- {}:", entry.marker);
        // (entry line, fields seen) per `- <marker>:` entry
        let mut entries: Vec<(usize, Vec<&str>)> = Vec::new();

        for (idx, trimmed) in ctx.field_lines(s) {
            if trimmed.starts_with(&marker) {
                entries.push((idx, vec![entry.marker.as_str()]));
            } else {
                let bare = trimmed.trim_start_matches('-').trim_start();
                let known = entry
                    .required
                    .iter()
                    .find(|f| bare.strip_prefix(f.as_str()).is_some_and(|r| r.starts_with(':')));
                match known {
                    Some(field) => {
                        if let Some((_, seen)) = entries.last_mut() {
                            seen.push(field.as_str());
                        }
                    }
                    None if entry.forbid_map_form
                        && !trimmed.starts_with('-')
                        && map_form_re().is_match(trimmed) =>
                    {
                        out.push(ctx.error(
                            idx,
                            format!(
                                "[{}] legacy map form: rewrite as '- {}: \"...\"' entries",
                                s.name, entry.marker
                            ),
                        ));
                    }
                    None => {}
                }
            }

            if entry.check_forbidden {
                if let Some(field) = field_name(trimmed) {
                    if kind.forbidden_fields.iter().any(|f| f == field) {
                        out.push(ctx.error(
                            idx,
                            format!(
                                "[{}] forbidden field '{field}' in a {} entry (allowed: {}); move its content into the allowed fields",
                                s.name,
                                kind.kind,
                                entry.required.join(", ")
                            ),
                        ));
                    }
                }
            }
        }

        for (idx, seen) in entries {
            let missing: Vec<&str> = entry
                .required
                .iter()
                .map(String::as_str)
                .filter(|f| !seen.contains(f))
                .collect();
            if !missing.is_empty() {
                out.push(ctx.error(
                    idx,
                    format!(
                        "[{}] {} entry is missing required fields: {}",
                        s.name,
                        kind.kind,
                        missing.join(", ")
                    ),
                ));
            }
        }
    }

    /// Old category/items structures outside the standard section kinds.
    fn check_nonstandard(&self, ctx: &FileCtx, s: &Section, out: &mut Vec<Finding>) {
        let key = ctx.lines[s.key_line].trim();
        if self.standard.iter().any(|re| re.is_match(key)) {
            return;
        }
        let fields: Vec<&str> = ctx
            .field_lines(s)
            .into_iter()
            .filter_map(|(_, t)| field_name(t))
            .collect();
        if fields.contains(&"category") && fields.contains(&"items") {
            out.push(ctx.error(
                s.key_line,
                format!(
                    "non-standard section '{}': category/items structures are retired; convert to '*_questions:' (key/question) or '*_process:' (label/action/description) without dropping logic",
                    s.name
                ),
            ));
        }
    }

    fn check_order(&self, ctx: &FileCtx, typed: &[(Option<&SectionKind>, &Section)], out: &mut Vec<Finding>) {
        if file_name(ctx.file).starts_with("00") {
            return;
        }
        let order = &self.policy.section_order;
        let mut last: Option<usize> = None;
        for (kind, s) in typed {
            let Some(pos) = kind.and_then(|k| order.iter().position(|o| *o == k.kind)) else {
                continue;
            };
            match last {
                Some(prev) if pos < prev => out.push(ctx.warning(
                    s.key_line,
                    format!(
                        "[{}] section order: '{}' should come before '{}'",
                        s.name, order[pos], order[prev]
                    ),
                )),
                _ => last = Some(pos),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Line checks
    // -----------------------------------------------------------------------

    fn check_lines(&self, ctx: &FileCtx, out: &mut Vec<Finding>) {
        let expected_ref = expected_path_reference(self.policy, ctx.file);

        for (idx, line) in ctx.lines.iter().enumerate() {
            let trimmed = line.trim();
            let top_level = !section::is_indented(line);
            let comment = trimmed.starts_with('#');

            if top_level && !comment {
                for name in &self.policy.deprecated_sections {
                    let is_key = trimmed
                        .strip_prefix(name.as_str())
                        .is_some_and(|r| r.starts_with(':'));
                    if is_key {
                        out.push(ctx.error(idx, format!("deprecated section '{name}:' must be removed")));
                    }
                }
                for re in &self.deprecated_patterns {
                    if re.is_match(trimmed) {
                        out.push(ctx.warning(
                            idx,
                            format!("section matches deprecated pattern '{}'", re.as_str()),
                        ));
                    }
                }
            }

            let is_path_ref = trimmed.starts_with("path_reference:");
            if !comment && !is_path_ref && paths_file_ref_re().is_match(line) {
                out.push(ctx.error(
                    idx,
                    "reference to a retired *_paths.mdc file: paths live in CLAUDE.md/AGENTS.md",
                ));
            }

            if trimmed.starts_with("master_triggers:") {
                out.push(ctx.error(
                    idx,
                    "master_triggers belong in CLAUDE.md/AGENTS.md, not in individual rules",
                ));
            }

            if let (Some(expected), Some(caps)) = (expected_ref, path_reference_re().captures(trimmed)) {
                let actual = caps.get(1).map_or("", |m| m.as_str());
                if actual != expected {
                    out.push(ctx.error(
                        idx,
                        format!("path_reference '{actual}' is wrong here: expected '{expected}'"),
                    ));
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Strict mode
    // -----------------------------------------------------------------------

    fn check_mandatory(&self, ctx: &FileCtx, typed: &[(Option<&SectionKind>, &Section)], out: &mut Vec<Finding>) {
        for (m, header_re) in self.policy.mandatory_sections.iter().zip(&self.mandatory_headers) {
            let has_header = ctx.lines.iter().any(|l| header_re.is_match(l.trim()));
            let has_key = typed
                .iter()
                .any(|(k, _)| k.is_some_and(|k| k.kind == m.kind));
            match (has_header, has_key) {
                (false, false) => out.push(Finding::error(
                    ctx.file,
                    0,
                    format!(
                        "mandatory section '{}' is missing: add '# ======== {} ========' and its key",
                        m.name, m.header
                    ),
                )),
                (false, true) => out.push(Finding::warning(
                    ctx.file,
                    0,
                    format!(
                        "section '{}' has no header: add '# ======== {} ========' above it",
                        m.name, m.header
                    ),
                )),
                _ => {}
            }
        }
    }

    fn check_separators(&self, ctx: &FileCtx, out: &mut Vec<Finding>) {
        let mandatory = &self.policy.mandatory_sections;
        let mut found = vec![false; mandatory.len()];

        for (idx, line) in ctx.lines.iter().enumerate() {
            let trimmed = line.trim();
            if !trimmed.starts_with('#') || !trimmed.contains('=') {
                continue;
            }
            if trimmed.contains("====") && !header_re().is_match(trimmed) {
                out.push(ctx.warning(
                    idx,
                    format!("malformed header '{trimmed}': use '# ======== Title ========'"),
                ));
            }
            let Some(caps) = separator_re().captures(trimmed) else {
                continue;
            };
            let left = caps.get(1).map_or(0, |m| m.as_str().len());
            let title = caps.get(2).map_or("", |m| m.as_str().trim());
            let right = caps.get(3).map_or(0, |m| m.as_str().len());

            match mandatory.iter().position(|m| title.starts_with(m.name.as_str())) {
                Some(i) => {
                    found[i] = true;
                    let name = &mandatory[i].name;
                    if left != right {
                        out.push(ctx.error(
                            idx,
                            format!(
                                "unbalanced separator for '{name}': {left} '=' on the left, {right} on the right"
                            ),
                        ));
                    } else if left < 4 {
                        out.push(ctx.error(
                            idx,
                            format!("separator for '{name}' is too short ({left} '='): use at least 4"),
                        ));
                    }
                }
                None => out.push(ctx.warning(
                    idx,
                    format!(
                        "separator banners are reserved for mandatory sections: use '## {title}' instead"
                    ),
                )),
            }
        }

        for (m, seen) in mandatory.iter().zip(found) {
            if !seen {
                out.push(Finding::error(
                    ctx.file,
                    0,
                    format!("separator for mandatory section '{}' is missing", m.name),
                ));
            }
        }
    }
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Count of each `(kind, name)` pair across `contents`, grouped by kind.
pub fn section_summary<'c>(
    linter: &RuleLinter,
    contents: impl IntoIterator<Item = &'c str>,
) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut summary: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for content in contents {
        for (kind, name) in linter.section_kinds(content) {
            *summary.entry(kind).or_default().entry(name).or_default() += 1;
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
