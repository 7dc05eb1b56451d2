use crate::output::{print_json, print_sync};
use anyhow::Context;
use rulesmith_core::config::Config;
use rulesmith_core::convert::{self, SourceFile};
use rulesmith_core::paths;
use rulesmith_core::sync::{self, SyncReport};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct SkillResult {
    skill: String,
    rule: String,
    dir: PathBuf,
    #[serde(flatten)]
    report: SyncReport,
}

pub fn run(root: &Path, rule_filter: Option<&str>, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let rules_dir = paths::rules_dir(root);
    let mut rules = SourceFile::load_dir(&rules_dir, &[paths::RULE_EXT])
        .with_context(|| format!("failed to read rules from {}", rules_dir.display()))?;

    if let Some(filter) = rule_filter {
        rules.retain(|r| r.stem().contains(filter));
        if rules.is_empty() {
            anyhow::bail!("no rule matches '{filter}'");
        }
    }
    if config.skill_targets.is_empty() {
        anyhow::bail!("no skill_targets configured");
    }

    let mut results = Vec::new();
    for rule in &rules {
        if !convert::is_skill_source(&rule.name) {
            continue;
        }
        let scripts = convert::find_scripts(root, &config.script_dirs, rule)
            .with_context(|| format!("failed to collect scripts for {}", rule.name))?;

        for target in &config.skill_targets {
            let Some(bundle) = convert::skill_bundle(rule, &target.path_reference, &scripts) else {
                continue;
            };
            let dir = Path::new(&target.dir).join(&bundle.name);
            let report = sync::materialize(&root.join(&dir), &bundle.files, dry_run)
                .with_context(|| format!("failed to write skill {}", dir.display()))?;
            results.push(SkillResult {
                skill: bundle.name,
                rule: rule.name.clone(),
                dir,
                report,
            });
        }
    }

    if json {
        return print_json(&results);
    }
    if results.is_empty() {
        println!("No skills generated.");
        return Ok(());
    }
    for r in &results {
        print_sync(&r.skill, &r.dir, &r.report, dry_run);
    }
    Ok(())
}
