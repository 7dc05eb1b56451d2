//! Section segmentation for rule bodies.
//!
//! A rule body is YAML-flavoured Markdown: top-level `key:` lines open
//! sections, indented lines continue them, and `#` comment banners between
//! sections decorate the section that follows. [`scan`] finds every section
//! the way a reader would see it; [`segment`] additionally drops accidental
//! matches and placeholder headers.

use crate::classifier::{classify, Category};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const PREAMBLE: &str = "_preamble";

const MIN_CONTENT_CHARS: usize = 10;

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A contiguous run of body lines. Line numbers are zero-based body lines;
/// `end_line` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub category: Category,
    /// Raw text including attached comment lines and the key line.
    pub text: String,
    /// Key line carried the `|` literal-block indicator.
    pub literal: bool,
    pub start_line: usize,
    pub key_line: usize,
    pub end_line: usize,
}

impl Section {
    /// Lines after the key line plus any inline value on it.
    pub fn value_lines(&self) -> Vec<&str> {
        if self.name == PREAMBLE {
            return self.text.lines().collect();
        }
        let offset = self.key_line - self.start_line;
        let mut lines = self.text.lines().skip(offset);
        let mut out = Vec::new();
        if let Some(key) = lines.next() {
            if let Some((_, inline)) = key.split_once(':') {
                if !inline.trim().is_empty() {
                    out.push(inline);
                }
            }
        }
        out.extend(lines);
        out
    }
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

static KEY_RE: OnceLock<Regex> = OnceLock::new();
static BANNER_RE: OnceLock<Regex> = OnceLock::new();

fn key_re() -> &'static Regex {
    KEY_RE.get_or_init(|| Regex::new(r"^([a-z][a-z0-9_]*):(?:[ \t]+(.*))?$").unwrap())
}

fn banner_re() -> &'static Regex {
    BANNER_RE.get_or_init(|| Regex::new(r"^#\s*=+.*=+\s*$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Fence { indented: bool },
    Key { name: &'a str, literal: bool },
    Comment,
    Indented,
    Text,
}

fn line_kind(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    let indented = is_indented(line);
    if trimmed.starts_with("```") {
        return LineKind::Fence { indented };
    }
    if indented {
        return LineKind::Indented;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    if let Some(caps) = key_re().captures(line) {
        if let Some(name) = caps.get(1) {
            let literal = caps
                .get(2)
                .is_some_and(|v| v.as_str().trim_start().starts_with('|'));
            return LineKind::Key {
                name: name.as_str(),
                literal,
            };
        }
    }
    LineKind::Text
}

/// Leading whitespace of any kind, including the full-width U+3000 space.
pub fn is_indented(line: &str) -> bool {
    line.chars().next().is_some_and(char::is_whitespace)
}

/// True for `# ==== Title ====` style banner lines.
pub fn is_banner(line: &str) -> bool {
    banner_re().is_match(line.trim())
}

// ---------------------------------------------------------------------------
// Scanner state machine
// ---------------------------------------------------------------------------

struct Open {
    name: String,
    category: Category,
    literal: bool,
    start_line: usize,
    key_line: usize,
    last_line: usize,
}

impl Open {
    fn close(self, lines: &[&str]) -> Section {
        let text = lines[self.start_line..=self.last_line].join("\n");
        Section {
            name: self.name,
            category: self.category,
            text: text.trim_end().to_string(),
            literal: self.literal,
            start_line: self.start_line,
            key_line: self.key_line,
            end_line: self.last_line + 1,
        }
    }
}

enum State {
    /// `pending` is the first line of the current comment/blank run.
    Outside { pending: Option<usize> },
    InSection(Open),
    /// Fence owned by a section, or an unowned fence between sections.
    InFence { owner: Option<Open> },
}

fn open_section(
    lines: &[&str],
    name: &str,
    literal: bool,
    key_line: usize,
    pending: Option<usize>,
) -> Open {
    let category = classify(name);
    let start_line = match (category, pending) {
        (Category::Default, Some(first)) => (first..key_line)
            .find(|&i| !lines[i].trim().is_empty())
            .unwrap_or(key_line),
        _ => key_line,
    };
    Open {
        name: name.to_string(),
        category,
        literal,
        start_line,
        key_line,
        last_line: key_line,
    }
}

/// Every top-level section in document order, unfiltered.
///
/// Sections never overlap. A line that ends a section is re-examined in the
/// outside state, so a comment banner after one section can introduce the
/// next one.
pub fn scan(body: &str) -> Vec<Section> {
    let lines: Vec<&str> = body.lines().collect();
    let mut out = Vec::new();
    let mut state = State::Outside { pending: None };
    let mut i = 0;

    while i < lines.len() {
        let kind = line_kind(lines[i]);
        let (next, advance) = match (state, kind) {
            (State::Outside { pending }, LineKind::Key { name, literal }) => (
                State::InSection(open_section(&lines, name, literal, i, pending)),
                true,
            ),
            (State::Outside { pending }, LineKind::Blank | LineKind::Comment) => (
                State::Outside {
                    pending: pending.or(Some(i)),
                },
                true,
            ),
            (State::Outside { .. }, LineKind::Fence { .. }) => {
                (State::InFence { owner: None }, true)
            }
            (State::Outside { .. }, _) => (State::Outside { pending: None }, true),

            (State::InSection(open), LineKind::Blank) => (State::InSection(open), true),
            (State::InSection(mut open), LineKind::Indented) => {
                open.last_line = i;
                (State::InSection(open), true)
            }
            (State::InSection(mut open), LineKind::Fence { indented: true }) => {
                open.last_line = i;
                (State::InFence { owner: Some(open) }, true)
            }
            (State::InSection(open), _) => {
                out.push(open.close(&lines));
                (State::Outside { pending: None }, false)
            }

            (State::InFence { owner }, LineKind::Fence { .. }) => match owner {
                Some(mut open) => {
                    open.last_line = i;
                    (State::InSection(open), true)
                }
                None => (State::Outside { pending: None }, true),
            },
            (State::InFence { mut owner }, kind) => {
                if let Some(open) = owner.as_mut() {
                    if kind != LineKind::Blank {
                        open.last_line = i;
                    }
                }
                (State::InFence { owner }, true)
            }
        };
        state = next;
        if advance {
            i += 1;
        }
    }

    match state {
        State::InSection(open) | State::InFence { owner: Some(open) } => {
            out.push(open.close(&lines))
        }
        _ => {}
    }
    out
}

// ---------------------------------------------------------------------------
// Validity filter
// ---------------------------------------------------------------------------

/// Rejects extraction artifacts: empty names, underscore-only or numeric
/// names, `section_<n>` markers, and names too short to mean anything.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name == "section_" {
        return false;
    }
    if let Some(rest) = name.strip_prefix("section_") {
        if rest.chars().all(|c| c.is_ascii_digit() || c == '_') {
            return false;
        }
    }
    let core: String = name.chars().filter(|&c| c != '_').collect();
    if core.is_empty() || core.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    name.chars().count() >= 3 || name == PREAMBLE
}

/// At least one real line and ten characters once blanks and banners are
/// discounted.
pub fn has_substance<'a>(lines: impl IntoIterator<Item = &'a str>) -> bool {
    let mut count = 0;
    let mut chars = 0;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_banner(trimmed) {
            continue;
        }
        count += 1;
        chars += trimmed.chars().count();
    }
    count >= 1 && chars >= MIN_CONTENT_CHARS
}

fn keep(section: &Section) -> bool {
    is_valid_name(&section.name) && has_substance(section.value_lines())
}

/// [`scan`] with the validity filter applied. A body with content but no
/// surviving section becomes a single `_preamble` section.
pub fn segment(body: &str) -> Vec<Section> {
    let sections: Vec<Section> = scan(body)
        .into_iter()
        .filter(|s| {
            let kept = keep(s);
            if !kept {
                tracing::debug!(section = %s.name, "dropping degenerate section");
            }
            kept
        })
        .collect();

    if !sections.is_empty() || body.trim().is_empty() {
        return sections;
    }
    preamble(body).into_iter().collect()
}

fn preamble(body: &str) -> Option<Section> {
    let lines: Vec<&str> = body.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty())?;
    let last = lines.iter().rposition(|l| !l.trim().is_empty())?;
    Some(Section {
        name: PREAMBLE.to_string(),
        category: classify(PREAMBLE),
        text: lines[first..=last].join("\n").trim_end().to_string(),
        literal: false,
        start_line: first,
        key_line: first,
        end_line: last + 1,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
