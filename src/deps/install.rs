//! The install pipeline: parse, resolve, fetch, plan, sync.
//!
//! Packages are processed one after another. A failure stops that package only;
//! the rest of the batch still runs and every outcome lands in the
//! [`BatchReport`].

use super::fetch::{SourceFetcher, VcsFetcher};
use super::registry::RegistryFetcher;
use super::spec::{PackageSpec, ResolvedSpec, SourceResolver};
use super::vendor::{SyncStats, plan_destination, remove_existing, sync_tree};
use crate::cache::LocalCache;
use crate::config::Settings;
use crate::error::{SeedError, SeedResult};
use colored::*;
use std::fs;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Installed {
    pub spec: ResolvedSpec,
    pub destination: PathBuf,
    pub stats: SyncStats,
}

#[derive(Debug)]
pub struct PackageOutcome {
    pub raw: String,
    pub result: SeedResult<Installed>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<PackageOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn installed(&self) -> impl Iterator<Item = &Installed> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SeedError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.raw.as_str(), e)))
    }
}

pub struct Installer {
    settings: Settings,
    resolver: SourceResolver,
    fetchers: Vec<Box<dyn SourceFetcher>>,
}

impl Installer {
    pub fn new(settings: Settings) -> Self {
        let vcs = VcsFetcher::new(&settings.mirror_dir, settings.url_template.clone());
        let registry = RegistryFetcher::new(LocalCache::new(&settings.cache_dir));
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![Box::new(vcs), Box::new(registry)];
        Self::with_fetchers(settings, fetchers)
    }

    /// Swap in other fetchers (tests, alternative transports). Each spec goes
    /// to the first fetcher whose `kind()` matches it.
    pub fn with_fetchers(settings: Settings, fetchers: Vec<Box<dyn SourceFetcher>>) -> Self {
        let resolver = settings.resolver();
        Self {
            settings,
            resolver,
            fetchers,
        }
    }

    pub fn resolve(&self, raw: &str) -> SeedResult<ResolvedSpec> {
        let spec = PackageSpec::parse(raw)?;
        Ok(self.resolver.resolve(spec))
    }

    fn fetcher(&self, spec: &ResolvedSpec) -> SeedResult<&dyn SourceFetcher> {
        self.fetchers
            .iter()
            .find(|fetcher| fetcher.kind() == spec.kind)
            .map(|fetcher| &**fetcher)
            .ok_or_else(|| SeedError::NoFetcher {
                package: spec.to_string(),
                kind: spec.kind,
            })
    }

    pub fn install_one(&self, raw: &str) -> SeedResult<Installed> {
        let spec = self.resolve(raw)?;
        println!(
            "{} Fetching {} ({} {})",
            "📦".blue(),
            format!("{}/{}", spec.organization, spec.name).bold(),
            spec.kind,
            spec.version
        );

        // Dropping `tree` deletes the working copy, on success or failure.
        let tree = self.fetcher(&spec)?.fetch(&spec)?;

        let vendor_root = &self.settings.vendor_dir;
        fs::create_dir_all(vendor_root).map_err(SeedError::at(vendor_root))?;
        let destination = plan_destination(vendor_root, &spec);

        match sync_tree(tree.path(), &destination, &self.settings.filter) {
            Ok(stats) => {
                println!(
                    "   {} Vendored {} files into {}",
                    "✓".green(),
                    stats.files,
                    destination.display()
                );
                Ok(Installed {
                    spec,
                    destination,
                    stats,
                })
            }
            Err(err) => {
                // Absent is better than half-synced.
                if let Err(cleanup) = remove_existing(&destination) {
                    println!(
                        "   {} Partial copy left behind: {}",
                        "!".yellow(),
                        cleanup
                    );
                }
                Err(err)
            }
        }
    }

    pub fn install_all<I, S>(&self, raws: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for raw in raws {
            let raw = raw.as_ref().trim().to_string();
            let result = self.install_one(&raw);
            if let Err(err) = &result {
                println!("   {} {}", "x".red(), err);
            }
            report.outcomes.push(PackageOutcome { raw, result });
        }
        report
    }
}
