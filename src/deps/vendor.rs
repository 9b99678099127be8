//! Filtered directory sync into the vendor tree.
//!
//! `sync_tree` is the only code that writes into `vendor/`. It is destructive on
//! purpose: the destination is removed before every copy, so local edits under a
//! vendored package do not survive a reinstall.
//!
//! ```text
//! vendor/
//! └── <organization>/
//!     └── <name>/      one version at a time
//! ```

use super::spec::ResolvedSpec;
use crate::error::{SeedError, SeedResult};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_INCLUDE: &[&str] = &[
    ".go", ".s", ".c", ".h", ".md", "Seedfile", "LICENSE", "go.mod", "go.sum",
];

pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "vendor",
    ".github",
    ".gitlab",
    ".circleci",
];

/// Which files get copied and which directories are never entered.
///
/// An include marker starting with `.` matches any file name ending with it
/// (`.go`, `.pb.go`); any other marker must equal the whole file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFilter {
    pub include: BTreeSet<String>,
    pub exclude_dirs: BTreeSet<String>,
}

impl Default for SyncFilter {
    fn default() -> Self {
        Self {
            include: DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SyncFilter {
    pub fn includes_file(&self, file_name: &str) -> bool {
        self.include.iter().any(|marker| {
            if marker.starts_with('.') {
                file_name.len() > marker.len() && file_name.ends_with(marker.as_str())
            } else {
                file_name == marker
            }
        })
    }

    pub fn excludes_dir(&self, dir_name: &str) -> bool {
        self.exclude_dirs.contains(dir_name)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub files: usize,
    pub dirs: usize,
    pub skipped: usize,
}

/// Where a package lands: `root/organization/name`. The version is not part of
/// the path.
pub fn plan_destination(root: &Path, spec: &ResolvedSpec) -> PathBuf {
    root.join(&spec.organization).join(&spec.name)
}

/// Replace `dst` with a filtered copy of `src`.
///
/// Stops at the first error. Because `dst` is wiped at the start, calling it
/// again after a failure still ends with a complete tree.
pub fn sync_tree(src: &Path, dst: &Path, filter: &SyncFilter) -> SeedResult<SyncStats> {
    let root_meta = fs::metadata(src).map_err(SeedError::at(src))?;
    if !root_meta.is_dir() {
        return Err(SeedError::fs(
            src,
            io::Error::new(io::ErrorKind::NotADirectory, "source is not a directory"),
        ));
    }

    remove_existing(dst)?;
    fs::create_dir_all(dst).map_err(SeedError::at(dst))?;

    let mut stats = SyncStats::default();
    // Applied after the walk so read-only directories can still be filled.
    let mut dir_perms = vec![(dst.to_path_buf(), owner_writable(root_meta.permissions()))];

    let walker = WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // Directories with non UTF-8 names are pruned along with excluded ones.
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| !filter.excludes_dir(name))
        });

    for entry in walker {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SeedError::fs(entry.path(), io::Error::other(e)))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            stats.skipped += 1;
            continue;
        }

        if file_type.is_dir() {
            fs::create_dir(&target).map_err(SeedError::at(&target))?;
            let meta = entry.metadata()?;
            dir_perms.push((target, owner_writable(meta.permissions())));
            stats.dirs += 1;
            continue;
        }

        let included = entry
            .file_name()
            .to_str()
            .is_some_and(|name| filter.includes_file(name));
        if !file_type.is_file() || !included {
            stats.skipped += 1;
            continue;
        }

        copy_file_atomic(entry.path(), &target)?;
        stats.files += 1;
    }

    for (dir, perms) in dir_perms.into_iter().rev() {
        fs::set_permissions(&dir, perms).map_err(SeedError::at(&dir))?;
    }

    Ok(stats)
}

/// Remove whatever is at `dst`. A missing path is not an error.
pub(crate) fn remove_existing(dst: &Path) -> SeedResult<()> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst).map_err(SeedError::at(dst)),
        Ok(_) => fs::remove_file(dst).map_err(SeedError::at(dst)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SeedError::fs(dst, e)),
    }
}

/// Directory modes are copied from the source, except that the owner can always
/// write, so the next sync (or a temp dir drop) can remove the tree again.
#[cfg(unix)]
fn owner_writable(perms: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode(perms.mode() | 0o200)
}

#[cfg(not(unix))]
fn owner_writable(perms: fs::Permissions) -> fs::Permissions {
    perms
}

/// Copy through a temp file in the destination directory, then rename, so a
/// crash never leaves a truncated file under its real name.
fn copy_file_atomic(src: &Path, dst: &Path) -> SeedResult<()> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let mut input = fs::File::open(src).map_err(SeedError::at(src))?;
    let perms = input
        .metadata()
        .map_err(SeedError::at(src))?
        .permissions();

    let mut temp = tempfile::Builder::new()
        .prefix(".seed-")
        .tempfile_in(parent)
        .map_err(SeedError::at(parent))?;
    io::copy(&mut input, temp.as_file_mut()).map_err(SeedError::at(dst))?;
    temp.as_file().sync_all().map_err(SeedError::at(dst))?;
    temp.as_file()
        .set_permissions(perms)
        .map_err(SeedError::at(dst))?;
    temp.persist(dst).map_err(|e| SeedError::fs(dst, e.error))?;
    Ok(())
}
