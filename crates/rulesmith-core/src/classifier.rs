use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Where a section ends up when a rule is split into a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Template,
    Questions,
    Default,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Template => "template",
            Category::Questions => "questions",
            Category::Default => "default",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// A fn-pointer rule; the first rule whose condition holds decides.
pub struct Rule {
    pub id: &'static str,
    pub condition: fn(&str) -> bool,
    pub category: Category,
}

/// Priority-ordered. `prompt_*` must stay first so that names like
/// `prompt_why_questions` keep their prose in the primary document.
pub static RULES: &[Rule] = &[
    Rule {
        id: "prompt",
        condition: |name| name.starts_with("prompt_"),
        category: Category::Default,
    },
    Rule {
        id: "template",
        condition: |name| name.ends_with("_template") || name == "templates",
        category: Category::Template,
    },
    Rule {
        id: "questions",
        condition: |name| name.ends_with("_questions") || name == "questions",
        category: Category::Questions,
    },
];

pub fn classify(name: &str) -> Category {
    RULES
        .iter()
        .find(|rule| (rule.condition)(name))
        .map(|rule| rule.category)
        .unwrap_or(Category::Default)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
