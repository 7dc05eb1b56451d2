use crate::output::{print_json, print_table};
use anyhow::Context;
use rulesmith_core::emit::{self, Layout, MergedOptions};
use rulesmith_core::{classifier::Category, frontmatter, section};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SectionView<'a> {
    name: &'a str,
    category: Category,
    /// 1-based file lines, inclusive.
    start_line: usize,
    end_line: usize,
    chars: usize,
    literal: bool,
    text: &'a str,
}

pub fn run(root: &Path, file: &Path, raw: bool, merged: bool, json: bool) -> anyhow::Result<()> {
    let path = root.join(file);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc = frontmatter::split(&content);
    let sections = if raw {
        section::scan(&doc.body)
    } else {
        section::segment(&doc.body)
    };

    if merged {
        let layout = Layout::Merged(MergedOptions {
            front_matter: doc.front_matter.clone(),
            resource_index: true,
            ..MergedOptions::default()
        });
        let files = emit::emit(&sections, &layout);
        if json {
            return print_json(&files);
        }
        for f in &files {
            print!("{}", f.text);
        }
        return Ok(());
    }

    let views: Vec<SectionView> = sections
        .iter()
        .map(|s| SectionView {
            name: &s.name,
            category: s.category,
            start_line: s.start_line + doc.body_line_offset + 1,
            end_line: s.end_line + doc.body_line_offset,
            chars: s.text.chars().count(),
            literal: s.literal,
            text: &s.text,
        })
        .collect();

    if json {
        return print_json(&views);
    }
    if views.is_empty() {
        println!("No sections.");
        return Ok(());
    }
    let rows = views
        .iter()
        .map(|v| {
            vec![
                v.name.to_string(),
                v.category.to_string(),
                format!("{}-{}", v.start_line, v.end_line),
                v.chars.to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "CATEGORY", "LINES", "CHARS"], rows);
    Ok(())
}
