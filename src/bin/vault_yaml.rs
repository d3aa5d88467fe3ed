//! Vault YAML CLI
//!
//! Loads, converts and inspects YAML interchange trees.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vault_yaml::{Database, InterchangeConfig, LoadedFile, OutputFormat, YamlStorage};

#[derive(Parser)]
#[command(name = "vault-yaml")]
#[command(about = "Load, convert and fingerprint YAML vault databases")]
struct Cli {
    /// Config file to layer over the default locations
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Only load these files (overrides the configured filter)
    #[arg(short, long = "file", global = true)]
    files: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a tree and print a summary
    Check {
        /// Interchange root (directory holding info.yml)
        dir: PathBuf,
    },

    /// Load a tree and write it back out under another root
    Convert {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Print the fingerprint of each file group
    Fingerprint {
        dir: PathBuf,
    },

    /// Write a JSON report of the manifest
    Info {
        dir: PathBuf,

        /// Output file (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = InterchangeConfig::load_from(cli.config.as_deref())
        .context("failed to load configuration")?;
    let filter: Option<&[String]> = if cli.files.is_empty() {
        config.file_filter()
    } else {
        Some(cli.files.as_slice())
    };
    let storage = YamlStorage::new();

    match cli.command {
        Commands::Check { dir } => {
            let mut database = config.new_database();
            let files = load(&storage, &dir, &mut database, filter)?;

            println!("✅ {} loaded", dir.display());
            println!("  Classes:     {}", database.schema.classes().len());
            println!("  Files:       {}", files.len());
            for vault in &database.vaults {
                let marker = if vault.is_primary { " (primary)" } else { "" };
                println!(
                    "  Vault {}{}: {} collections",
                    vault.name,
                    marker,
                    database.collections.in_vault(&vault.name).count()
                );
            }
            Ok(())
        }

        Commands::Convert {
            source,
            destination,
        } => {
            let mut database = config.new_database();
            let files = load(&storage, &source, &mut database, filter)?;
            storage
                .save(&database, &destination, &files)
                .with_context(|| format!("failed to save {}", destination.display()))?;
            println!(
                "✅ {} collections written to {}",
                database.collections.len(),
                destination.display()
            );
            Ok(())
        }

        Commands::Fingerprint { dir } => {
            let manifest = storage
                .load_manifest(&dir)
                .with_context(|| format!("failed to read manifest in {}", dir.display()))?;
            for file in manifest.selected_files(filter) {
                let digest = storage.fingerprint(&dir, file)?;
                println!("{}/{}  {}", file.group, file.name, digest);
            }
            Ok(())
        }

        Commands::Info { dir, output } => {
            let manifest = storage
                .load_manifest(&dir)
                .with_context(|| format!("failed to read manifest in {}", dir.display()))?;

            let mut files = Vec::new();
            for file in manifest.selected_files(filter) {
                files.push(serde_json::json!({
                    "name": file.name,
                    "group": file.group,
                    "vaults": file.vaults,
                    "fingerprint": storage.fingerprint(&dir, file)?,
                }));
            }
            let report = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": storage.format_name(),
                "primary_vault": manifest.primary_vault_name,
                "classes": manifest.classes.iter().map(|c| serde_json::json!({
                    "name": c.name,
                    "fields": c.fields.len(),
                })).collect::<Vec<_>>(),
                "types": manifest.types.len(),
                "files": files,
            });

            let report_json = match config.output.format {
                OutputFormat::Pretty => serde_json::to_string_pretty(&report)?,
                OutputFormat::Compact => serde_json::to_string(&report)?,
            };

            if let Some(path) = output {
                std::fs::write(&path, &report_json)?;
                println!("✅ Report written to {:?}", path);
            } else {
                println!("{}", report_json);
            }
            Ok(())
        }
    }
}

fn load(
    storage: &YamlStorage,
    dir: &Path,
    database: &mut Database,
    filter: Option<&[String]>,
) -> anyhow::Result<Vec<LoadedFile>> {
    if !storage.can_load_from(dir) {
        bail!("{} has no info.yml", dir.display());
    }
    storage
        .load(dir, database, filter)
        .with_context(|| format!("failed to load {}", dir.display()))
}
