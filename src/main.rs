//! # seed CLI Entry Point
//!
//! Parses arguments with clap and routes each command to one flow of the
//! library. Any failed package turns into a non-zero exit status.
//!
//! ## Command Structure
//!
//! - **Vendoring**: `install`, `get`
//! - **Registry**: `publish`, `cache`
//! - **Inspection**: `list`, `freeze`

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::{Path, PathBuf};

use seed::cache::{self, LocalCache};
use seed::config::{DEFAULT_MANIFEST, Manifest, Settings};
use seed::deps::{Installer, PackageSpec, plan_destination};
use seed::freeze;
use seed::ui;

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Fetch and vendor dependencies", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Archive cache directory [default: ~/.seed/cache]
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
    /// Git mirror directory [default: ~/.seed/mirrors]
    #[arg(long, global = true)]
    mirror_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every dependency listed in the manifest
    #[command(visible_alias = "i")]
    Install {
        /// Manifest to read
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
        /// Directory to vendor into
        #[arg(short, long, visible_alias = "folder")]
        dir: Option<PathBuf>,
    },
    /// Fetch a single package and vendor it
    #[command(visible_alias = "g")]
    Get {
        /// Package spec, e.g. github.com/acme/widget@v1.2.0
        spec: String,
        /// Directory to vendor into
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
    /// Snapshot a directory into the archive cache
    Publish {
        /// Directory to publish
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Manifest providing organization, name and version
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
        /// Publish as org/name@version instead of the manifest's [package]
        #[arg(long)]
        spec: Option<String>,
    },
    /// List the manifest's dependencies and where they will be vendored
    List {
        /// Manifest to read
        #[arg(short, long, default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Print the packages imported by the Go module in the current directory
    #[command(visible_alias = "f")]
    Freeze,
    /// Inspect the archive cache
    Cache {
        #[command(subcommand)]
        op: CacheOp,
    },
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

#[derive(Subcommand)]
enum CacheOp {
    /// List cached archives
    Ls,
    /// Print cache directory path
    Path,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Install { file, dir } => {
            let manifest = Manifest::load(file)
                .with_context(|| format!("Failed to read manifest {}", file.display()))?;
            let settings = settings_for(&cli, Some(&manifest), dir.as_deref());
            if manifest.dependencies.is_empty() {
                println!("{} No dependencies found in {}", "!".yellow(), file.display());
                return Ok(());
            }

            println!(
                "{} Installing {} dependencies into {}...",
                "📦".blue(),
                manifest.dependencies.len(),
                settings.vendor_dir.display()
            );
            let report = Installer::new(settings).install_all(&manifest.dependencies);
            ui::print_report(&report);
            if !report.is_success() {
                bail!("{} dependencies failed to install", report.failures().count());
            }
            Ok(())
        }

        Commands::Get { spec, dir } => {
            let manifest = load_optional_manifest(Path::new(DEFAULT_MANIFEST))?;
            let settings = settings_for(&cli, manifest.as_ref(), dir.as_deref());
            let installed = Installer::new(settings).install_one(spec)?;
            println!(
                "{} {} ready at {}",
                "✓".green(),
                installed.spec,
                installed.destination.display()
            );
            Ok(())
        }

        Commands::Publish { dir, file, spec } => {
            let manifest = load_optional_manifest(file)?;
            let settings = settings_for(&cli, manifest.as_ref(), None);
            let (organization, name, version) =
                publish_identity(manifest.as_ref(), spec.as_deref())?;

            println!(
                "{} Publishing {}/{}@{} from {}...",
                "📦".blue(),
                organization,
                name,
                version,
                dir.display()
            );
            let entry = LocalCache::new(&settings.cache_dir).publish(
                dir,
                &organization,
                &name,
                &version,
                &settings.filter,
            )?;
            println!("{} Stored {}", "✓".green(), entry.archive_path.display());
            Ok(())
        }

        Commands::List { file } => {
            let manifest = Manifest::load(file)
                .with_context(|| format!("Failed to read manifest {}", file.display()))?;
            let settings = settings_for(&cli, Some(&manifest), None);
            list_dependencies(&manifest, &settings)
        }

        Commands::Freeze => {
            let cwd = std::env::current_dir()?;
            for import in freeze::list_imports(&cwd)? {
                println!("{}", import);
            }
            Ok(())
        }

        Commands::Cache { op } => {
            let settings = settings_for(&cli, None, None);
            let cache = LocalCache::new(&settings.cache_dir);
            match op {
                CacheOp::Ls => cache::list(&cache),
                CacheOp::Path => cache::print_path(&cache),
            }
        }

        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Defaults, then the manifest's `[settings]`, then command-line flags.
fn settings_for(cli: &Cli, manifest: Option<&Manifest>, vendor_dir: Option<&Path>) -> Settings {
    let mut settings = Settings::default();
    if let Some(config) = manifest.and_then(|m| m.config.as_ref()) {
        settings.apply(config);
    }
    if let Some(dir) = &cli.cache_dir {
        settings.cache_dir = dir.clone();
    }
    if let Some(dir) = &cli.mirror_dir {
        settings.mirror_dir = dir.clone();
    }
    if let Some(dir) = vendor_dir {
        settings.vendor_dir = dir.to_path_buf();
    }
    settings
}

fn load_optional_manifest(path: &Path) -> Result<Option<Manifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let manifest = Manifest::load(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    Ok(Some(manifest))
}

fn publish_identity(
    manifest: Option<&Manifest>,
    spec: Option<&str>,
) -> Result<(String, String, String)> {
    if let Some(raw) = spec {
        let spec = PackageSpec::parse(raw)?;
        let version = spec
            .version
            .context("--spec needs an explicit version, e.g. acme/widget@1.0.0")?;
        return Ok((spec.organization, spec.name, version));
    }

    let Some(package) = manifest.and_then(|m| m.package()) else {
        bail!("Nothing to publish: pass --spec or add a [package] table to the manifest");
    };
    if package.organization.is_empty() || package.name.is_empty() || package.version.is_empty() {
        bail!("[package] needs organization, name and version to publish");
    }
    Ok((
        package.organization.clone(),
        package.name.clone(),
        package.version.clone(),
    ))
}

fn list_dependencies(manifest: &Manifest, settings: &Settings) -> Result<()> {
    if manifest.dependencies.is_empty() {
        println!("{} No dependencies.", "!".yellow());
        return Ok(());
    }

    let resolver = settings.resolver();
    let mut table = ui::Table::new(&["Dependency", "Source", "Version", "Destination"]);
    for raw in &manifest.dependencies {
        let row = match PackageSpec::parse(raw) {
            Ok(spec) => {
                let resolved = resolver.resolve(spec);
                let version = if resolved.pinned {
                    resolved.version.clone()
                } else {
                    format!("{} (default)", resolved.version)
                };
                vec![
                    raw.clone(),
                    resolved.kind.to_string(),
                    version,
                    plan_destination(&settings.vendor_dir, &resolved)
                        .display()
                        .to_string(),
                ]
            }
            Err(err) => vec![
                raw.clone(),
                "invalid".red().to_string(),
                "-".to_string(),
                err.to_string(),
            ],
        };
        table.add_row(row);
    }
    table.print();
    let include: Vec<&str> = settings.filter.include.iter().map(String::as_str).collect();
    let skipped: Vec<&str> = settings.filter.exclude_dirs.iter().map(String::as_str).collect();
    println!(
        "   {}",
        format!("include: {} | skip dirs: {}", include.join(" "), skipped.join(" ")).dimmed()
    );
    Ok(())
}
