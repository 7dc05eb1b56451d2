mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rulesmith",
    about = "Lint Cursor rules and generate agents, skills and master files from them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .cursor/ or .git/)
    #[arg(long, global = true, env = "RULESMITH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sections of one rule file
    Segment {
        file: PathBuf,

        /// Skip the validity filter and show every scanned section
        #[arg(long)]
        raw: bool,

        /// Print the merged re-emission (default sections plus a resource
        /// index) instead of the section table
        #[arg(long, conflicts_with = "raw")]
        merged: bool,
    },

    /// Lint rule, skill and agent files
    Lint {
        /// Rule file or directory (default: .cursor/rules)
        path: Option<PathBuf>,

        /// Skip mandatory section and separator checks
        #[arg(long)]
        no_strict: bool,

        /// Only report errors
        #[arg(long)]
        no_warnings: bool,

        /// Print section counts per kind
        #[arg(long)]
        summary: bool,
    },

    /// Generate skills from rules into every configured skills directory
    Skills {
        /// Only rules whose file stem contains this text
        #[arg(long)]
        rule: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Convert rules to agents, or agents back to rules with --reverse
    Agents {
        #[arg(long)]
        reverse: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Build master files from master rules, or restore rules from one
    Master {
        /// Master file to restore rules from (e.g. AGENTS.md)
        #[arg(long, value_name = "FILE")]
        restore: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and validate .rulesmith/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Segment { file, raw, merged } => {
            cmd::segment::run(&root, &file, raw, merged, cli.json)
        }
        Commands::Lint {
            path,
            no_strict,
            no_warnings,
            summary,
        } => cmd::lint::run(
            &root,
            cmd::lint::LintArgs {
                path,
                strict: !no_strict,
                warnings: !no_warnings,
                summary,
            },
            cli.json,
        ),
        Commands::Skills { rule, dry_run } => {
            cmd::skills::run(&root, rule.as_deref(), dry_run, cli.json)
        }
        Commands::Agents { reverse, dry_run } => {
            cmd::agents::run(&root, reverse, dry_run, cli.json)
        }
        Commands::Master { restore, dry_run } => {
            cmd::master::run(&root, restore.as_deref(), dry_run, cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
