//! Local archive cache.
//!
//! This module owns the `~/.seed/cache` directory. Registry installs read
//! archives from it and `seed publish` writes them:
//!
//! ```text
//! ~/.seed/cache/<organization>/<name>@<version>.zip
//! ```
//!
//! Organization and name can never contain `/` or `@`, and `%`, `/` and `\`
//! inside a version are percent-escaped, so two packages never share a key.
//!
//! Archives are written to a temp file in the cache directory and renamed into
//! place, so an entry is either complete or missing.
//!
//! ## Known limitations
//!
//! - No eviction or TTL: entries stay until removed by hand.
//! - No integrity check: keys are not content hashed, so republishing a version
//!   silently replaces the archive.
//!
//! ## Commands
//!
//! - `seed cache path` - Print cache directory location
//! - `seed cache ls` - List cached archives

use crate::deps::{LATEST, PackageSpec, SyncFilter, sync_tree};
use crate::error::{SeedError, SeedResult};
use crate::ui;
use colored::*;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;

pub const ARCHIVE_EXT: &str = "zip";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    organization: String,
    name: String,
    version: String,
}

impl CacheKey {
    pub fn new(organization: &str, name: &str, version: &str) -> Self {
        Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version: escape_version(version),
        }
    }

    /// Archive location relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.organization).join(format!(
            "{}@{}.{}",
            self.name, self.version, ARCHIVE_EXT
        ))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.organization, self.name, self.version)
    }
}

fn escape_version(version: &str) -> String {
    let mut escaped = String::with_capacity(version.len());
    for c in version.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '/' => escaped.push_str("%2F"),
            '\\' => escaped.push_str("%5C"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub archive_path: PathBuf,
    /// Version the archive was published as. Differs from the requested version
    /// only when `latest` picked a concrete release.
    pub version: String,
    pub present: bool,
}

/// One archive found on disk by [`LocalCache::list`].
#[derive(Debug, Clone)]
pub struct CachedArchive {
    /// `<organization>/<name>@<version>.zip`
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Exact lookup, no `latest` handling.
    pub fn entry(&self, organization: &str, name: &str, version: &str) -> CacheEntry {
        let key = CacheKey::new(organization, name, version);
        let archive_path = self.archive_path(&key);
        CacheEntry {
            present: archive_path.is_file(),
            key,
            archive_path,
            version: version.to_string(),
        }
    }

    /// Lookup used by installs. `latest` prefers an archive literally published
    /// as `latest`, then the highest semver release in the cache.
    pub fn resolve(
        &self,
        organization: &str,
        name: &str,
        version: &str,
    ) -> SeedResult<CacheEntry> {
        let exact = self.entry(organization, name, version);
        if exact.present || version != LATEST {
            return Ok(exact);
        }

        let prefix = format!("{}/{}@", organization, name);
        let suffix = format!(".{}", ARCHIVE_EXT);
        let newest = self
            .list()?
            .into_iter()
            .filter_map(|archive| {
                let version = archive
                    .name
                    .strip_prefix(&prefix)?
                    .strip_suffix(&suffix)?
                    .to_string();
                let parsed = semver::Version::parse(version.trim_start_matches('v')).ok()?;
                Some((parsed, version))
            })
            .max_by(|a, b| a.0.cmp(&b.0));

        Ok(match newest {
            Some((_, version)) => self.entry(organization, name, &version),
            None => exact,
        })
    }

    /// Every archive in the cache, sorted by key.
    pub fn list(&self) -> SeedResult<Vec<CachedArchive>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut archives = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            let path = entry.path();
            let is_archive = path.extension().is_some_and(|ext| ext == ARCHIVE_EXT);
            if !entry.file_type().is_file() || !is_archive {
                continue;
            }
            let Some(name) = archive_name(&self.root, path) else {
                continue;
            };
            let meta = entry.metadata()?;
            archives.push(CachedArchive {
                name,
                path: path.to_path_buf(),
                size: meta.len(),
            });
        }
        archives.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(archives)
    }

    /// Snapshot `src` through `filter` and store it under the package's key.
    ///
    /// The archive holds one top-level directory, `<name>-<version>/`, which the
    /// registry fetcher renames back to `<name>` on install.
    pub fn publish(
        &self,
        src: &Path,
        organization: &str,
        name: &str,
        version: &str,
        filter: &SyncFilter,
    ) -> SeedResult<CacheEntry> {
        check_identity(organization, name, version)?;
        let key = CacheKey::new(organization, name, version);
        let archive_path = self.archive_path(&key);
        let archive_dir = archive_path.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&archive_dir).map_err(SeedError::at(&archive_dir))?;

        let staging = tempfile::Builder::new()
            .prefix("seed-publish-")
            .tempdir()
            .map_err(SeedError::at(std::env::temp_dir()))?;
        let top_level = format!("{}-{}", name, version.replace(['/', '\\'], "_"));
        let snapshot = staging.path().join(&top_level);
        sync_tree(src, &snapshot, filter)?;

        let temp = tempfile::Builder::new()
            .prefix(".seed-")
            .suffix(".zip.part")
            .tempfile_in(&archive_dir)
            .map_err(SeedError::at(&archive_dir))?;
        let file = temp.reopen().map_err(SeedError::at(temp.path()))?;
        write_zip(file, staging.path(), &snapshot).map_err(|e| match e {
            zip::result::ZipError::Io(source) => SeedError::fs(&archive_path, source),
            other => SeedError::fs(&archive_path, io::Error::other(other)),
        })?;
        temp.persist(&archive_path)
            .map_err(|e| SeedError::fs(&archive_path, e.error))?;

        Ok(CacheEntry {
            key,
            archive_path,
            version: version.to_string(),
            present: true,
        })
    }
}

/// Organization and name end up as path segments, so they must be exactly what
/// a package identifier would parse to.
fn check_identity(organization: &str, name: &str, version: &str) -> SeedResult<()> {
    let raw = format!("{}/{}@{}", organization, name, version);
    let spec = PackageSpec::parse(&raw)?;
    if spec.organization != organization || spec.name != name {
        return Err(SeedError::invalid_spec(
            &raw,
            "organization and name must be plain path segments",
        ));
    }
    Ok(())
}

/// `<organization>/<name>@<version>.zip` for an archive under `root`.
fn archive_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

fn write_zip(file: File, base: &Path, snapshot: &Path) -> zip::result::ZipResult<()> {
    let mut zip = zip::ZipWriter::new(file);

    for entry in WalkDir::new(snapshot).sort_by_file_name() {
        let entry = entry.map_err(|e| zip::result::ZipError::Io(e.into()))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(base)
            .map_err(|e| zip::result::ZipError::Io(io::Error::other(e)))?;
        // Zip standard uses forward slashes
        let name = relative
            .to_str()
            .ok_or_else(|| {
                zip::result::ZipError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file name is not valid UTF-8: {}", relative.display()),
                ))
            })?
            .replace('\\', "/");

        let meta = entry.metadata().map_err(|e| zip::result::ZipError::Io(e.into()))?;
        let options = FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(unix_mode(&meta));

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else {
            zip.start_file(name, options)?;
            let mut f = File::open(path)?;
            io::copy(&mut f, &mut zip)?;
        }
    }

    zip.finish()?.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn unix_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn unix_mode(meta: &fs::Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

pub fn print_path(cache: &LocalCache) -> anyhow::Result<()> {
    println!("{}", cache.root().display());
    Ok(())
}

pub fn list(cache: &LocalCache) -> anyhow::Result<()> {
    let archives = cache.list()?;
    if archives.is_empty() {
        println!("{} Cache is empty.", "ℹ".blue());
        return Ok(());
    }

    let mut table = ui::Table::new(&["Cached Archive", "Size"]);
    for archive in archives {
        table.add_row(vec![archive.name, ui::human_size(archive.size)]);
    }
    table.print();
    Ok(())
}
