//! Front matter: the `---` delimited YAML block at the top of rule, skill and
//! agent files.

use crate::error::Result;

/// A file split into its optional front matter and the body that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub front_matter: Option<FrontMatter>,
    pub body: String,
    /// Lines consumed before the body starts, so body line `n` is file line
    /// `n + body_line_offset`.
    pub body_line_offset: usize,
    /// File line of the first YAML line inside the block; 0 without front matter.
    pub front_matter_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    /// YAML text between the delimiters, without the delimiter lines.
    pub raw: String,
    fields: Vec<(String, String)>,
}

impl FrontMatter {
    pub fn new(raw: &str) -> Self {
        let fields = raw
            .lines()
            .filter(|l| !l.trim_start().starts_with('#'))
            .filter_map(|l| l.split_once(':'))
            .map(|(k, v)| {
                let value = v.trim().trim_matches(|c| c == '"' || c == '\'');
                (k.trim().to_string(), value.to_string())
            })
            .collect();
        Self {
            raw: raw.to_string(),
            fields,
        }
    }

    /// Loose lookup: value trimmed and unquoted, later keys win.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Strict parse for validators.
    pub fn parse_yaml(&self) -> Result<serde_yaml::Value> {
        Ok(serde_yaml::from_str(&self.raw)?)
    }

    /// Delimited block ending in a newline.
    pub fn render(&self) -> String {
        if self.raw.is_empty() {
            "---\n---\n".to_string()
        } else {
            format!("---\n{}\n---\n", self.raw)
        }
    }
}

impl Document {
    fn plain(content: &str) -> Self {
        Self {
            front_matter: None,
            body: content.to_string(),
            body_line_offset: 0,
            front_matter_line: 0,
        }
    }
}

/// Split `content` into front matter and body. Leading blank lines before the
/// opening delimiter are allowed; an unterminated block means no front matter.
pub fn split(content: &str) -> Document {
    let mut pos = 0;
    let mut opened_at: Option<(usize, usize)> = None;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let text = line.trim_end_matches(['\n', '\r']);
        match opened_at {
            None => {
                if text.trim().is_empty() {
                    pos += line.len();
                    continue;
                }
                if text.trim() != "---" || !line.ends_with('\n') {
                    return Document::plain(content);
                }
                opened_at = Some((pos + line.len(), idx + 2));
            }
            Some((start, first_line)) => {
                if text.trim_end() == "---" {
                    let raw = content[start..pos].trim_end_matches(['\n', '\r']);
                    return Document {
                        front_matter: Some(FrontMatter::new(raw)),
                        body: content[pos + line.len()..].to_string(),
                        body_line_offset: idx + 1,
                        front_matter_line: first_line,
                    };
                }
            }
        }
        pos += line.len();
    }
    Document::plain(content)
}

/// Body with the front matter and leading whitespace removed.
pub fn strip(content: &str) -> String {
    split(content).body.trim_start().to_string()
}
