use crate::output::{print_json, print_table};
use anyhow::Context;
use rulesmith_core::config::Config;
use rulesmith_core::lint::{self, rules::section_summary, Finding, LintOptions, RuleLinter, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct LintArgs {
    pub path: Option<PathBuf>,
    pub strict: bool,
    pub warnings: bool,
    pub summary: bool,
}

#[derive(Serialize)]
struct LintOutput<'a> {
    files_checked: usize,
    errors: usize,
    warnings: usize,
    findings: Vec<&'a Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<BTreeMap<String, BTreeMap<String, usize>>>,
}

pub fn run(root: &Path, args: LintArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let opts = LintOptions {
        target: args.path.clone(),
        strict: args.strict,
    };
    let report = lint::lint_project(root, &config, &opts).context("lint failed")?;

    let summary = if args.summary {
        Some(summarize(root, &config, &opts)?)
    } else {
        None
    };

    let shown: Vec<&Finding> = report
        .findings
        .iter()
        .filter(|f| args.warnings || f.severity == Severity::Error)
        .collect();

    if json {
        print_json(&LintOutput {
            files_checked: report.files_checked(),
            errors: report.error_count(),
            warnings: report.warning_count(),
            findings: shown,
            summary,
        })?;
    } else {
        for f in &shown {
            let level = match f.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            println!("{}:{}: {level}: {}", f.file.display(), f.line, f.message);
            if let Some(hint) = &f.hint {
                println!("    hint: {hint}");
            }
        }
        if let Some(summary) = &summary {
            let rows = summary
                .iter()
                .flat_map(|(kind, names)| {
                    names
                        .iter()
                        .map(move |(name, n)| vec![kind.clone(), name.clone(), n.to_string()])
                })
                .collect();
            println!();
            print_table(&["KIND", "SECTION", "FILES"], rows);
        }
        println!(
            "Checked {} files (rules: {}, skills: {}, agents: {}, commands: {}): {} errors, {} warnings",
            report.files_checked(),
            report.rule_files,
            report.skill_files,
            report.agent_files,
            report.command_files,
            report.error_count(),
            report.warning_count()
        );
    }

    if report.has_errors() {
        anyhow::bail!("lint found {} error(s)", report.error_count());
    }
    Ok(())
}

fn summarize(
    root: &Path,
    config: &Config,
    opts: &LintOptions,
) -> anyhow::Result<BTreeMap<String, BTreeMap<String, usize>>> {
    let linter = RuleLinter::new(&config.lint, opts.strict)?;
    let mut contents = Vec::new();
    for path in lint::rule_files(root, opts.target.as_deref())? {
        contents.push(
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        );
    }
    Ok(section_summary(&linter, contents.iter().map(String::as_str)))
}
