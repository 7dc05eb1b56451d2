#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn rulesmith(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rulesmith").unwrap();
    cmd.current_dir(dir).env("RULESMITH_ROOT", dir);
    cmd
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(dir: &Path, rel: &str) -> String {
    std::fs::read_to_string(dir.join(rel)).unwrap()
}

const MASTER: &str = "---\ndescription: Project rules\nglobs:\nalwaysApply: true\n---\n# Master\nAlways answer in plain language.\n";

const PLAN: &str = "\
---
description: Planning agent
globs:
alwaysApply: false
---
# ======== Agent機能 ========
system_capabilities:
  - plans sprints for the team

# ======== プロンプト（目的と使い方） ========
prompt_purpose: |
  Plan the next sprint.

# ======== ワークフロー ========
plan_process: |
  - label: gather
    action: \"call 11_execute.mdc => run\"
    description: read the backlog

# ======== 質問 ========
plan_questions: |
  - key: goal
    question: What is the sprint goal?

# ======== テンプレート ========
plan_template: |
  # Sprint plan
  Goal and scope of the sprint.

# ======== 次フェーズ連携 ========
next_phases: |
  - on: done
    rule: \"11_execute.mdc\"
    description: start execution

# ======== エラーハンドリング ========
error_handling: |
  - id: E1
    message: backlog missing
    recovery_actions:
      - ask the user
";

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".cursor/rules/00_master.mdc", MASTER);
    write(dir.path(), ".cursor/rules/10_plan.mdc", PLAN);
    dir
}

// ---------------------------------------------------------------------------
// segment
// ---------------------------------------------------------------------------

#[test]
fn segment_json_lists_sections() {
    let dir = project();
    let out = rulesmith(dir.path())
        .args(["--json", "segment", ".cursor/rules/10_plan.mdc"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let sections: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let sections = sections.as_array().unwrap();
    let names: Vec<&str> = sections.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"system_capabilities"));
    assert!(names.contains(&"plan_questions"));

    let questions = sections.iter().find(|s| s["name"] == "plan_questions").unwrap();
    assert_eq!(questions["category"], "questions");
    assert_eq!(questions["literal"], true);
}

#[test]
fn segment_table_output() {
    let dir = project();
    rulesmith(dir.path())
        .args(["segment", ".cursor/rules/10_plan.mdc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("plan_template"))
        .stdout(predicate::str::contains("template"));
}

#[test]
fn segment_merged_indexes_resources() {
    let dir = project();
    rulesmith(dir.path())
        .args(["segment", "--merged", ".cursor/rules/10_plan.mdc"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("---\ndescription: Planning agent\n"))
        .stdout(predicate::str::contains("skill_resources:"))
        .stdout(predicate::str::contains("\"questions/plan_questions.md\""))
        .stdout(predicate::str::contains("system_capabilities:"))
        .stdout(predicate::str::contains("What is the sprint goal?").not());
}

#[test]
fn segment_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    rulesmith(dir.path())
        .args(["segment", "nope.mdc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ---------------------------------------------------------------------------
// lint
// ---------------------------------------------------------------------------

#[test]
fn lint_compliant_project_passes() {
    let dir = project();
    rulesmith(dir.path())
        .args(["lint", ".cursor/rules/10_plan.mdc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 errors"));
}

#[test]
fn lint_warnings_do_not_fail() {
    let dir = TempDir::new().unwrap();
    let rule = PLAN.replace("plan_questions: |", "plan_questions:");
    write(dir.path(), ".cursor/rules/10_plan.mdc", &rule);
    rulesmith(dir.path())
        .args(["lint", "--no-strict"])
        .assert()
        .success()
        .stdout(predicate::str::contains("warning: "))
        .stdout(predicate::str::contains("literal block"));
}

#[test]
fn lint_always_apply_on_regular_rule_fails() {
    let dir = TempDir::new().unwrap();
    let rule = PLAN.replace("alwaysApply: false", "alwaysApply: true");
    write(dir.path(), ".cursor/rules/10_plan.mdc", &rule);
    rulesmith(dir.path())
        .args(["lint", "--no-strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error: alwaysApply should be false but was true"));
}

#[test]
fn lint_errors_fail() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".cursor/rules/10_bare.mdc", "intro:\n  no front matter here\n");
    rulesmith(dir.path())
        .args(["lint", "--no-strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("10_bare.mdc"))
        .stderr(predicate::str::contains("lint found"));
}

#[test]
fn lint_json_counts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".cursor/rules/10_bare.mdc", "intro:\n  no front matter here\n");
    let out = rulesmith(dir.path())
        .args(["--json", "lint", "--no-strict"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["files_checked"], 1);
    assert!(report["errors"].as_u64().unwrap() >= 1);
    assert!(report.get("summary").is_none());
}

#[test]
fn lint_rejects_paths_files() {
    let dir = project();
    write(dir.path(), ".cursor/rules/01_paths.mdc", MASTER);
    rulesmith(dir.path())
        .args(["lint", "--no-strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("01_paths.mdc"));
}

#[test]
fn lint_checks_skill_folders_and_commands() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join(".cursor/skills/draft")).unwrap();
    write(dir.path(), ".claude/commands/plan.md", "plan\n");
    rulesmith(dir.path())
        .args(["lint", "--no-strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(".cursor/skills/draft:0: error: skill folder has no SKILL.md"))
        .stdout(predicate::str::contains("command is too short (4 characters"))
        .stdout(predicate::str::contains("commands: 1"));
}

// ---------------------------------------------------------------------------
// skills
// ---------------------------------------------------------------------------

#[test]
fn skills_written_to_every_target() {
    let dir = project();
    rulesmith(dir.path()).arg("skills").assert().success();

    let claude = read(dir.path(), ".claude/skills/plan/SKILL.md");
    assert!(claude.starts_with("---\nname: plan\ndescription: Planning agent\n---\n"));
    assert!(claude.contains("path_reference: \"CLAUDE.md\""));
    assert!(claude.contains("questions/plan_questions.md"));
    assert!(!claude.contains("What is the sprint goal?"));

    let codex = read(dir.path(), ".codex/skills/plan/SKILL.md");
    assert!(codex.contains("path_reference: \"AGENTS.md\""));

    let questions = read(dir.path(), ".claude/skills/plan/questions/plan_questions.md");
    assert!(questions.contains("What is the sprint goal?"));
    assert!(dir.path().join(".claude/skills/plan/templates/plan_template.md").exists());

    // Master rules never become skills.
    assert!(!dir.path().join(".claude/skills/master").exists());
}

#[test]
fn skills_second_run_is_unchanged() {
    let dir = project();
    rulesmith(dir.path()).arg("skills").assert().success();
    rulesmith(dir.path())
        .arg("skills")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 written"));
}

#[test]
fn skills_bundle_referenced_scripts() {
    let dir = project();
    let rule = PLAN.replace("read the backlog", "run scripts/backlog.py");
    write(dir.path(), ".cursor/rules/10_plan.mdc", &rule);
    write(dir.path(), "scripts/backlog.py", "print('backlog')\n");

    rulesmith(dir.path()).arg("skills").assert().success();
    assert_eq!(
        read(dir.path(), ".claude/skills/plan/scripts/backlog.py"),
        "print('backlog')\n"
    );
    assert!(read(dir.path(), ".claude/skills/plan/SKILL.md").contains("scripts/backlog.py"));
}

#[test]
fn skills_rule_filter_without_match_fails() {
    let dir = project();
    rulesmith(dir.path())
        .args(["skills", "--rule", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no rule matches"));
}

#[test]
fn skills_dry_run_writes_nothing() {
    let dir = project();
    rulesmith(dir.path())
        .args(["skills", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] write"));
    assert!(!dir.path().join(".claude/skills").exists());
    assert!(!dir.path().join(".codex/skills").exists());
}

#[test]
fn skills_json_output() {
    let dir = project();
    let out = rulesmith(dir.path())
        .args(["--json", "skills"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let results: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["skill"], "plan");
    assert_eq!(results[0]["rule"], "10_plan.mdc");
}

// ---------------------------------------------------------------------------
// agents
// ---------------------------------------------------------------------------

#[test]
fn agents_round_trip() {
    let dir = project();
    rulesmith(dir.path()).arg("agents").assert().success();

    let agent = read(dir.path(), ".claude/agents/10_plan.md");
    assert!(agent.starts_with("---\nname: 10_plan\ndescription: Planning agent\n---\n"));
    assert!(agent.contains("plan_questions: |"));
    assert_eq!(read(dir.path(), ".claude/agents/00_master.mdc"), MASTER);

    std::fs::remove_dir_all(dir.path().join(".cursor/rules")).unwrap();
    rulesmith(dir.path())
        .args(["agents", "--reverse"])
        .assert()
        .success();

    let rule = read(dir.path(), ".cursor/rules/10_plan.mdc");
    assert!(rule.contains("description: Planning agent"));
    assert!(rule.contains("alwaysApply: false"));
    assert!(rule.contains("plan_questions: |"));
    assert_eq!(read(dir.path(), ".cursor/rules/00_master.mdc"), MASTER);
}

#[test]
fn agents_reset_removes_stale_files() {
    let dir = project();
    write(dir.path(), ".claude/agents/99_old.md", "---\nname: 99_old\n---\nold\n");
    rulesmith(dir.path())
        .arg("agents")
        .assert()
        .success()
        .stdout(predicate::str::contains("remove"));
    assert!(!dir.path().join(".claude/agents/99_old.md").exists());
}

#[test]
fn agents_without_rules_fails() {
    let dir = TempDir::new().unwrap();
    rulesmith(dir.path()).arg("agents").assert().failure();
}

#[test]
fn agents_dry_run_writes_nothing() {
    let dir = project();
    rulesmith(dir.path())
        .args(["agents", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"));
    assert!(!dir.path().join(".claude/agents").exists());
}

// ---------------------------------------------------------------------------
// master
// ---------------------------------------------------------------------------

#[test]
fn master_build_writes_all_outputs() {
    let dir = project();
    rulesmith(dir.path()).arg("master").assert().success();

    let claude = read(dir.path(), "CLAUDE.md");
    assert!(claude.contains("<!-- FILE: 00_master.mdc START -->"));
    assert!(claude.contains("Always answer in plain language."));
    assert!(claude.contains("<!-- FILE: 00_master.mdc END -->"));
    assert!(!claude.contains("10_plan.mdc START"));

    for out in [
        "AGENTS.md",
        ".gemini/GEMINI.md",
        ".kiro/steering/KIRO.md",
        ".github/copilot-instructions.md",
    ] {
        assert_eq!(read(dir.path(), out), claude, "{out}");
    }
}

#[test]
fn master_restore_recreates_rules() {
    let dir = project();
    rulesmith(dir.path()).arg("master").assert().success();
    std::fs::remove_dir_all(dir.path().join(".cursor/rules")).unwrap();

    rulesmith(dir.path())
        .args(["master", "--restore", "CLAUDE.md"])
        .assert()
        .success();
    let rule = read(dir.path(), ".cursor/rules/00_master.mdc");
    assert!(rule.starts_with("---\n"));
    assert!(rule.contains("alwaysApply: true"));
    assert!(rule.contains("Always answer in plain language."));
}

#[test]
fn master_restore_plain_file_uses_fallback_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "AGENTS.md", "Keep answers short.\n");
    rulesmith(dir.path())
        .args(["master", "--restore", "AGENTS.md"])
        .assert()
        .success();
    assert!(read(dir.path(), ".cursor/rules/00_master_rules.mdc").contains("Keep answers short."));
}

#[test]
fn master_without_master_rules_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".cursor/rules/10_plan.mdc", PLAN);
    rulesmith(dir.path())
        .arg("master")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no master rules"));
}

#[test]
fn master_dry_run_writes_nothing() {
    let dir = project();
    rulesmith(dir.path())
        .args(["master", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] write  CLAUDE.md"));
    assert!(!dir.path().join("CLAUDE.md").exists());
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_init_then_validate() {
    let dir = TempDir::new().unwrap();
    rulesmith(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));
    assert!(dir.path().join(".rulesmith/config.yaml").exists());

    rulesmith(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));

    rulesmith(dir.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_rejects_absolute_outputs() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        ".rulesmith/config.yaml",
        "version: 1\nmaster_outputs:\n  - /etc/CLAUDE.md\n",
    );
    rulesmith(dir.path())
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}

#[test]
fn config_show_json() {
    let dir = TempDir::new().unwrap();
    let out = rulesmith(dir.path())
        .args(["--json", "config", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let config: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(config["version"], 1);
    assert_eq!(config["skill_targets"][0]["dir"], ".claude/skills");
}

#[test]
fn custom_master_outputs_are_honored() {
    let dir = project();
    write(
        dir.path(),
        ".rulesmith/config.yaml",
        "master_outputs:\n  - docs/RULES.md\n",
    );
    rulesmith(dir.path()).arg("master").assert().success();
    assert!(dir.path().join("docs/RULES.md").exists());
    assert!(!dir.path().join("CLAUDE.md").exists());
}
