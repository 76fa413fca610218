use anyhow::Context;
use api_shared::wire::{FixPathsReq, PathFix, SubjectsRes};
use clap::{Parser, Subcommand};
use portal_core::{CoreConfig, FileCatalogStore, RepairService, ResourceService};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Resource portal catalog maintenance")]
struct Cli {
    /// Storage root (defaults to PORTAL_STORAGE_DIR, then `uploads`)
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Catalog directory (defaults to PORTAL_CATALOG_DIR, then `catalog`)
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which catalog records point at files that can be found
    Diagnose,
    /// Overwrite stored paths from a JSON file of `{id, newPath}` pairs
    FixPaths {
        /// `{"fixes": [...]}` or a bare array
        file: PathBuf,
    },
    /// Strip a leading separator from stored paths
    NormalizePaths,
    /// List resource records whose subject no longer exists
    Reconcile {
        /// Delete the orphaned records and their files
        #[arg(long)]
        apply: bool,
    },
    /// List the subjects of a semester
    Subjects { semester: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FixesFile {
    Wrapped(FixPathsReq),
    Bare(Vec<PathFix>),
}

fn parse_fixes(raw: &str) -> anyhow::Result<Vec<PathFix>> {
    let parsed: FixesFile = serde_json::from_str(raw).context("fixes file is not valid JSON")?;
    Ok(match parsed {
        FixesFile::Wrapped(req) => req.fixes,
        FixesFile::Bare(fixes) => fixes,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn env_or_flag(flag: Option<PathBuf>, var: &str) -> Option<String> {
    flag.map(|p| p.display().to_string())
        .or_else(|| std::env::var(var).ok())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("portal_cli=info".parse()?)
                .add_directive("portal_core=info".parse()?)
                .add_directive("portal_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(
        CoreConfig::from_env_values(
            env_or_flag(cli.storage_dir, "PORTAL_STORAGE_DIR"),
            env_or_flag(cli.catalog_dir, "PORTAL_CATALOG_DIR"),
        )
        .context("cannot resolve portal directories")?,
    );
    let store = Arc::new(FileCatalogStore::open(cfg.catalog_dir())?);

    match cli.command {
        Commands::Diagnose => {
            let repair = RepairService::new(cfg, store)?;
            print_json(&repair.diagnose()?)
        }
        Commands::FixPaths { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let repair = RepairService::new(cfg, store)?;
            print_json(&repair.apply_fixes(&parse_fixes(&raw)?)?)
        }
        Commands::NormalizePaths => {
            let repair = RepairService::new(cfg, store)?;
            print_json(&repair.normalize()?)
        }
        Commands::Reconcile { apply } => {
            let repair = RepairService::new(cfg, store)?;
            print_json(&repair.reconcile(apply)?)
        }
        Commands::Subjects { semester } => {
            let resources = ResourceService::new(cfg, store)?;
            let subjects = resources.subject_names(&semester)?;
            print_json(&SubjectsRes {
                semester: semester.trim().to_owned(),
                subjects,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_file_accepts_both_shapes() {
        let wrapped = r#"{"fixes": [{"id": "a", "newPath": "question-papers/a.pdf"}]}"#;
        let bare = r#"[{"id": "a"}, {"newPath": "b.pdf"}]"#;

        let fixes = parse_fixes(wrapped).unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].new_path.as_deref(), Some("question-papers/a.pdf"));
        assert_eq!(parse_fixes(bare).unwrap().len(), 2);
        assert!(parse_fixes("{").is_err());
    }

    #[test]
    fn reconcile_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["portal", "reconcile"]).unwrap();
        assert!(matches!(cli.command, Commands::Reconcile { apply: false }));

        let cli = Cli::try_parse_from(["portal", "--storage-dir", "/tmp/u", "reconcile", "--apply"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Reconcile { apply: true }));
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/tmp/u")));
    }
}
