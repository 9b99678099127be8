//! Manifest (`Seedfile`) parsing and runtime settings.
//!
//! A `Seedfile` is either one dependency per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! github.com/nlohmann/json@v3.11.2
//! acme/widget
//! ```
//!
//! or TOML with a `[package]` table whose `dependencies` field holds the same
//! strings, plus optional `[server]` and `[settings]` tables.

use crate::deps::{DEFAULT_URL_TEMPLATE, SourceResolver, SyncFilter};
use crate::error::{SeedError, SeedResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST: &str = "Seedfile";

#[derive(Deserialize, Debug, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub package: PackageConfig,
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct PackageConfig {
    pub organization: String,
    pub name: String,
    pub version: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub documentation: Option<String>,
    pub repository: Option<String>,
    pub readme: Option<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub license: Option<String>,
    /// Extra directory names never vendored or published.
    pub exclude: Vec<String>,
    /// Extra include markers (`.proto`, `Makefile`).
    pub include: Vec<String>,
    pub dependencies: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SettingsConfig {
    pub vendor_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub mirror_dir: Option<PathBuf>,
    pub default_host: Option<String>,
    pub default_branch: Option<String>,
    pub registry_domains: Option<Vec<String>>,
    pub url_template: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_port() -> u16 {
    443
}

/// A loaded manifest: the ordered dependency list and, for TOML manifests, the
/// rest of the document.
#[derive(Debug, Default)]
pub struct Manifest {
    pub config: Option<SeedConfig>,
    pub dependencies: Vec<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> SeedResult<Self> {
        let content = fs::read_to_string(path).map_err(SeedError::at(path))?;
        Self::parse(&content).map_err(|reason| SeedError::Manifest {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let is_toml = content
            .lines()
            .any(|line| line.trim_start().starts_with('['));

        if is_toml {
            let config: SeedConfig = toml::from_str(content).map_err(|e| e.to_string())?;
            let dependencies = config
                .package
                .dependencies
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
            return Ok(Self {
                config: Some(config),
                dependencies,
            });
        }

        let dependencies = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(ToOwned::to_owned)
            .collect();
        Ok(Self {
            config: None,
            dependencies,
        })
    }

    pub fn package(&self) -> Option<&PackageConfig> {
        self.config.as_ref().map(|c| &c.package)
    }
}

/// Everything the core needs to run, after defaults, manifest and CLI flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub vendor_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub mirror_dir: PathBuf,
    pub default_host: String,
    pub default_branch: String,
    pub registry_domains: Vec<String>,
    pub url_template: String,
    pub filter: SyncFilter,
}

impl Default for Settings {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::under(&home.join(".seed"))
    }
}

impl Settings {
    /// Defaults with cache and mirrors kept under `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            vendor_dir: PathBuf::from("vendor"),
            cache_dir: root.join("cache"),
            mirror_dir: root.join("mirrors"),
            default_host: "github.com".to_string(),
            default_branch: "master".to_string(),
            registry_domains: vec!["goseed.io".to_string()],
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            filter: SyncFilter::default(),
        }
    }

    pub fn with_vendor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vendor_dir = dir.into();
        self
    }

    /// Layer a manifest's `[settings]` and `[package]` filter additions on top.
    pub fn apply(&mut self, config: &SeedConfig) {
        let s = &config.settings;
        if let Some(dir) = &s.vendor_dir {
            self.vendor_dir = dir.clone();
        }
        if let Some(dir) = &s.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(dir) = &s.mirror_dir {
            self.mirror_dir = dir.clone();
        }
        if let Some(host) = &s.default_host {
            self.default_host = host.clone();
        }
        if let Some(branch) = &s.default_branch {
            self.default_branch = branch.clone();
        }
        if let Some(domains) = &s.registry_domains {
            self.registry_domains = domains.clone();
        }
        if let Some(template) = &s.url_template {
            self.url_template = template.clone();
        }
        if let Some(include) = &s.include {
            self.filter.include = include.iter().cloned().collect();
        }
        if let Some(exclude) = &s.exclude_dirs {
            self.filter.exclude_dirs = exclude.iter().cloned().collect();
        }

        self.filter
            .include
            .extend(config.package.include.iter().cloned());
        self.filter
            .exclude_dirs
            .extend(config.package.exclude.iter().cloned());
    }

    pub fn resolver(&self) -> SourceResolver {
        SourceResolver::new(
            self.registry_domains.clone(),
            self.default_host.clone(),
            self.default_branch.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_lines() {
        let manifest = Manifest::parse(
            "# deps\n\ngithub.com/nlohmann/json@v3.11.2\n  acme/widget  \n",
        )
        .unwrap();
        assert!(manifest.config.is_none());
        assert_eq!(
            manifest.dependencies,
            vec!["github.com/nlohmann/json@v3.11.2", "acme/widget"]
        );
    }

    #[test]
    fn test_parse_toml_manifest() {
        let manifest = Manifest::parse(
            r#"
[package]
organization = "acme"
name = "app"
version = "0.3.0"
authors = ["Dev <dev@example.com>"]
include = [".proto"]
exclude = ["testdata"]
dependencies = ["acme/widget@v1", "goseed.io/acme/core"]

[server]
port = 8080

[settings]
default_branch = "main"
"#,
        )
        .unwrap();

        let package = manifest.package().unwrap();
        assert_eq!(package.organization, "acme");
        assert_eq!(package.version, "0.3.0");
        assert_eq!(manifest.dependencies.len(), 2);

        let config = manifest.config.as_ref().unwrap();
        let server = config.server.as_ref().unwrap();
        assert_eq!(server.port, 8080);
        assert_eq!(server.protocol, "https");

        let mut settings = Settings::under(Path::new("/tmp/seed"));
        settings.apply(config);
        assert_eq!(settings.default_branch, "main");
        assert!(settings.filter.includes_file("api.proto"));
        assert!(settings.filter.excludes_dir("testdata"));
        assert!(settings.filter.excludes_dir(".git"));
    }

    #[test]
    fn test_toml_errors_are_reported() {
        let err = Manifest::parse("[package\nname = 1").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_settings_under_root() {
        let settings = Settings::under(Path::new("/data"));
        assert_eq!(settings.cache_dir, Path::new("/data").join("cache"));
        assert_eq!(settings.mirror_dir, Path::new("/data").join("mirrors"));
        assert_eq!(settings.vendor_dir, PathBuf::from("vendor"));
    }
}
