//! Registry packages served from the local archive cache.
//!
//! Getting archives into the cache (download or `seed publish`) happens
//! elsewhere; this fetcher only extracts what is already there. Archives carry a
//! `<name>-<version>/` top-level directory which is renamed to `<name>` so
//! the extracted layout does not depend on the version.

use super::fetch::{SourceFetcher, SourceTree};
use super::spec::{ResolvedSpec, SourceKind};
use crate::cache::LocalCache;
use crate::error::{SeedError, SeedResult};
use colored::*;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

pub struct RegistryFetcher {
    cache: LocalCache,
}

impl RegistryFetcher {
    pub fn new(cache: LocalCache) -> Self {
        Self { cache }
    }
}

impl SourceFetcher for RegistryFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    fn fetch(&self, spec: &ResolvedSpec) -> SeedResult<SourceTree> {
        let entry = self
            .cache
            .resolve(&spec.organization, &spec.name, &spec.version)?;
        if !entry.present {
            return Err(SeedError::CacheMiss {
                key: entry.key.to_string(),
                path: entry.archive_path,
            });
        }
        println!("   {} Using cached: {}", "⚡".green(), entry.key);

        let workdir = tempfile::Builder::new()
            .prefix("seed-registry-")
            .tempdir()
            .map_err(SeedError::at(std::env::temp_dir()))?;
        extract_archive(&entry.archive_path, workdir.path())?;
        let root = normalize_layout(
            workdir.path(),
            &spec.name,
            &entry.version,
            &entry.archive_path,
        )?;
        Ok(SourceTree::owned(workdir, root))
    }
}

/// Unpack a zip into `dest`, refusing entries that would land outside it.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> SeedResult<()> {
    let corrupt = |reason: String| SeedError::CorruptArchive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(SeedError::at(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for i in 0..archive.len() {
        let mut item = archive.by_index(i).map_err(|e| corrupt(e.to_string()))?;
        let Some(relative) = item.enclosed_name() else {
            return Err(corrupt(format!("entry escapes archive root: {}", item.name())));
        };
        let out_path = dest.join(relative);
        let mode = item.unix_mode();

        if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            continue;
        }

        if item.is_dir() {
            fs::create_dir_all(&out_path).map_err(SeedError::at(&out_path))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(SeedError::at(parent))?;
        }
        let mut out_file = File::create(&out_path).map_err(SeedError::at(&out_path))?;
        io::copy(&mut item, &mut out_file).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => corrupt(e.to_string()),
            _ => SeedError::fs(&out_path, e),
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = mode {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(SeedError::at(&out_path))?;
            }
        }
    }

    Ok(())
}

/// Rename `<name>-<version>` to `<name>` inside `workdir` and return its path.
fn normalize_layout(
    workdir: &Path,
    name: &str,
    version: &str,
    archive_path: &Path,
) -> SeedResult<PathBuf> {
    let plain = workdir.join(name);
    let versioned = workdir.join(format!("{}-{}", name, version.replace(['/', '\\'], "_")));

    if versioned.is_dir() {
        if fs::symlink_metadata(&plain).is_ok() {
            return Err(SeedError::RenameConflict { path: plain });
        }
        fs::rename(&versioned, &plain).map_err(SeedError::at(&versioned))?;
        return Ok(plain);
    }

    if plain.is_dir() {
        return Ok(plain);
    }

    Err(SeedError::CorruptArchive {
        path: archive_path.to_path_buf(),
        reason: format!(
            "expected a top-level '{}' or '{}' directory",
            versioned.file_name().unwrap_or_default().to_string_lossy(),
            name
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::SyncFilter;
    use std::io::Write;
    use zip::write::FileOptions;

    fn spec(version: &str) -> ResolvedSpec {
        ResolvedSpec {
            host: "goseed.io".to_string(),
            organization: "acme".to_string(),
            name: "widget".to_string(),
            version: version.to_string(),
            kind: SourceKind::Registry,
            pinned: true,
        }
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::<()>::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_cache_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = RegistryFetcher::new(LocalCache::new(tmp.path()));
        let err = fetcher.fetch(&spec("1.0.0")).unwrap_err();
        assert!(matches!(err, SeedError::CacheMiss { .. }));
    }

    #[test]
    fn test_fetch_renames_versioned_root() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(tmp.path());
        let entry = cache.entry("acme", "widget", "1.0.0");
        write_zip(
            &entry.archive_path,
            &[("widget-1.0.0/lib.go", "package lib"), ("widget-1.0.0/sub/x.go", "package sub")],
        );

        let tree = RegistryFetcher::new(cache).fetch(&spec("1.0.0")).unwrap();
        assert!(tree.path().ends_with("widget"));
        assert!(tree.path().join("lib.go").is_file());
        assert!(tree.path().join("sub").join("x.go").is_file());
    }

    #[test]
    fn test_fetch_round_trips_publish() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("project");
        fs::create_dir_all(src.join("pkg")).unwrap();
        fs::write(src.join("pkg").join("a.go"), "package pkg").unwrap();
        let cache = LocalCache::new(tmp.path().join("cache"));
        cache
            .publish(&src, "acme", "widget", "2.0.0", &SyncFilter::default())
            .unwrap();

        let tree = RegistryFetcher::new(cache).fetch(&spec("2.0.0")).unwrap();
        assert_eq!(
            fs::read_to_string(tree.path().join("pkg").join("a.go")).unwrap(),
            "package pkg"
        );
    }

    #[test]
    fn test_fetch_hyphenated_package_after_lookalike_publish() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(tmp.path().join("cache"));
        let packages = [
            ("first", "acme-labs", "widget"),
            ("second", "acme", "labs-widget"),
        ];
        for (dir, organization, name) in packages {
            let src = tmp.path().join(dir);
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("id.go"), dir).unwrap();
            cache
                .publish(&src, organization, name, "1.0.0", &SyncFilter::default())
                .unwrap();
        }

        let mut wanted = spec("1.0.0");
        wanted.organization = "acme-labs".to_string();
        let tree = RegistryFetcher::new(cache).fetch(&wanted).unwrap();
        assert_eq!(fs::read_to_string(tree.path().join("id.go")).unwrap(), "first");
    }

    #[test]
    fn test_rename_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(tmp.path());
        write_zip(
            &cache.entry("acme", "widget", "1.0.0").archive_path,
            &[("widget-1.0.0/lib.go", "package lib"), ("widget/other.txt", "unrelated")],
        );

        let err = RegistryFetcher::new(cache).fetch(&spec("1.0.0")).unwrap_err();
        assert!(matches!(err, SeedError::RenameConflict { .. }));
    }

    #[test]
    fn test_corrupt_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(tmp.path());
        let archive_path = cache.entry("acme", "widget", "1.0.0").archive_path;
        fs::create_dir_all(archive_path.parent().unwrap()).unwrap();
        fs::write(&archive_path, b"not a zip").unwrap();

        let err = RegistryFetcher::new(cache).fetch(&spec("1.0.0")).unwrap_err();
        assert!(matches!(err, SeedError::CorruptArchive { .. }));
    }

    #[test]
    fn test_archive_without_package_root_is_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(tmp.path());
        write_zip(
            &cache.entry("acme", "widget", "1.0.0").archive_path,
            &[("something-else/lib.go", "package lib")],
        );

        let err = RegistryFetcher::new(cache).fetch(&spec("1.0.0")).unwrap_err();
        assert!(matches!(err, SeedError::CorruptArchive { .. }));
    }

    #[test]
    fn test_extract_rejects_path_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("evil.zip");
        write_zip(&archive, &[("../escape.go", "package evil")]);

        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        let err = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(err, SeedError::CorruptArchive { .. }));
        assert!(!tmp.path().join("escape.go").exists());
    }
}
