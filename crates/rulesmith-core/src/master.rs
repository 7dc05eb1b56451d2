//! Master files (`CLAUDE.md`, `AGENTS.md`, ...) assembled from the master
//! rules, and the reverse: rule files restored from a master file.
//!
//! Each rule travels inside a marker block so the reverse direction can find
//! it again:
//!
//! ```text
//! <!-- FILE: 00_master_rules.mdc START -->
//! ...
//! <!-- FILE: 00_master_rules.mdc END -->
//! ```

use crate::convert::{self, SourceFile};
use crate::emit::EmittedFile;
use crate::error::{Result, RuleError};
use crate::frontmatter;
use crate::paths;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static BLOCK_START_RE: OnceLock<Regex> = OnceLock::new();

fn block_start_re() -> &'static Regex {
    BLOCK_START_RE.get_or_init(|| Regex::new(r"<!--\s*FILE:\s*([^>]+?)\s*START\s*-->").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBlock {
    pub name: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Master rules in master-file order: names containing `00`, then names
/// containing `path`. Input order is kept within each group.
pub fn select(rules: &[SourceFile]) -> Vec<&SourceFile> {
    let mut selected: Vec<&SourceFile> = rules.iter().filter(|r| r.name.contains("00")).collect();
    selected.extend(
        rules
            .iter()
            .filter(|r| !r.name.contains("00") && r.name.contains("path")),
    );
    selected
}

pub fn format_block(name: &str, content: &str) -> String {
    format!(
        "<!-- FILE: {name} START -->\n{}\n<!-- FILE: {name} END -->\n\n",
        content.trim_end()
    )
}

/// Master file text, or `None` when no master rule has a body.
pub fn build(rules: &[SourceFile]) -> Option<String> {
    let blocks: Vec<String> = select(rules)
        .into_iter()
        .filter_map(|rule| {
            let body = frontmatter::strip(&rule.content);
            if body.trim().is_empty() {
                tracing::debug!(rule = %rule.name, "skipping empty master rule");
                return None;
            }
            Some(format_block(&rule.name, &convert::to_agent_paths(&body)))
        })
        .collect();
    (!blocks.is_empty()).then(|| blocks.concat())
}

/// The same master text under every configured output path.
pub fn master_files(text: &str, outputs: &[String]) -> Vec<EmittedFile> {
    outputs
        .iter()
        .map(|out| EmittedFile {
            path: PathBuf::from(out),
            text: text.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Marker blocks in document order. A START without a matching END is
/// skipped.
pub fn parse_blocks(content: &str) -> Vec<MasterBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(caps) = block_start_re().captures_at(content, pos) {
        let (Some(all), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let name = name.as_str().trim();
        let end_re = Regex::new(&format!(
            r"<!--\s*FILE:\s*{}\s*END\s*-->",
            regex::escape(name)
        ));
        let end = end_re.ok().and_then(|re| re.find_at(content, all.end()));
        match end {
            Some(end) => {
                blocks.push(MasterBlock {
                    name: name.to_string(),
                    body: content[all.end()..end.start()].trim().to_string(),
                });
                pos = end.end();
            }
            None => {
                tracing::debug!(block = %name, "unterminated block");
                pos = all.end();
            }
        }
    }
    blocks
}

/// Rule files regenerated from a master file. `existing` supplies front
/// matter for rules that already exist; others get cursor front matter noting
/// the master file. Content without blocks becomes the fallback master rule.
pub fn restore(master_name: &str, content: &str, existing: &[SourceFile]) -> Result<Vec<EmittedFile>> {
    let mut blocks = parse_blocks(content);
    if blocks.is_empty() {
        let body = content.trim();
        if body.is_empty() {
            return Err(RuleError::EmptyMaster(master_name.to_string()));
        }
        tracing::warn!(master = %master_name, "no FILE blocks, restoring as {}", paths::FALLBACK_MASTER_RULE);
        blocks.push(MasterBlock {
            name: paths::FALLBACK_MASTER_RULE.to_string(),
            body: body.to_string(),
        });
    }

    let mut files = Vec::with_capacity(blocks.len());
    for block in blocks {
        let path = PathBuf::from(&block.name);
        paths::validate_relative(&path)?;

        let mut body = convert::to_rule_paths(&block.body)
            .trim_start_matches('\n')
            .to_string();
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }

        let front_matter = existing
            .iter()
            .find(|f| f.name == block.name)
            .and_then(|f| frontmatter::split(&f.content).front_matter)
            .unwrap_or_else(|| {
                let stem = Path::new(&block.name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&block.name);
                convert::cursor_front_matter(stem, &format!("Generated from {master_name}"))
            });

        files.push(EmittedFile {
            path,
            text: format!("{}\n{body}", front_matter.render()),
        });
    }
    Ok(files)
}
