//! Source fetching and the git mirror.
//!
//! Both fetch strategies hand back a [`SourceTree`]: a directory the sync engine
//! copies from, owned by the caller and deleted when dropped.
//!
//! ## Git layout
//!
//! - Mirrors live at `~/.seed/mirrors/<host>/<organization>/<name>.git` (bare)
//! - Every fetch clones the mirror into its own temp working copy and checks
//!   out the requested ref there. The mirror itself is only ever fetched into,
//!   so two fetches of different versions never see each other's checkout.

use super::spec::{ResolvedSpec, SourceKind};
use crate::error::{SeedError, SeedResult};
use crate::ui;
use colored::*;
use git2::{AutotagOption, FetchOptions, Oid, Repository, build::RepoBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fetched package tree. The backing temp directory lives as long as this.
#[derive(Debug)]
pub struct SourceTree {
    root: PathBuf,
    _workdir: Option<TempDir>,
}

impl SourceTree {
    pub fn owned(workdir: TempDir, root: PathBuf) -> Self {
        Self {
            root,
            _workdir: Some(workdir),
        }
    }

    /// A tree the fetcher does not own, e.g. a directory prepared by a caller.
    pub fn borrowed(root: PathBuf) -> Self {
        Self {
            root,
            _workdir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

/// One way of turning a resolved spec into a source tree.
pub trait SourceFetcher {
    fn kind(&self) -> SourceKind;

    fn fetch(&self, spec: &ResolvedSpec) -> SeedResult<SourceTree>;
}

pub const DEFAULT_URL_TEMPLATE: &str = "https://{host}/{organization}/{name}.git";

const MIRROR_REFSPECS: &[&str] = &["+refs/heads/*:refs/heads/*"];

pub struct VcsFetcher {
    mirror_root: PathBuf,
    url_template: String,
}

impl VcsFetcher {
    pub fn new(mirror_root: impl Into<PathBuf>, url_template: impl Into<String>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
            url_template: url_template.into(),
        }
    }

    pub fn remote_url(&self, spec: &ResolvedSpec) -> String {
        self.url_template
            .replace("{host}", &spec.host)
            .replace("{organization}", &spec.organization)
            .replace("{name}", &spec.name)
    }

    pub fn mirror_path(&self, spec: &ResolvedSpec) -> PathBuf {
        self.mirror_root
            .join(&spec.host)
            .join(&spec.organization)
            .join(format!("{}.git", spec.name))
    }

    /// Clone the mirror if missing, otherwise fetch into it. A mirror whose
    /// `origin` is not the currently configured URL is dropped and re-cloned,
    /// so refs from the old remote never leak into a checkout.
    pub fn update_mirror(&self, spec: &ResolvedSpec) -> SeedResult<Repository> {
        let path = self.mirror_path(spec);
        let url = self.remote_url(spec);
        let label = format!("{}/{}", spec.organization, spec.name);
        let network = |err: git2::Error| SeedError::NetworkFailure {
            package: spec.to_string(),
            reason: err.message().to_string(),
        };

        let pb = ui::spinner(format!("Updating {}...", label));

        let existing = if path.exists() {
            let repo = Repository::open_bare(&path).map_err(network)?;
            if origin_url(&repo).as_deref() == Some(url.as_str()) {
                Some(repo)
            } else {
                pb.set_message(format!("Remote changed for {}, re-cloning...", label));
                drop(repo);
                fs::remove_dir_all(&path).map_err(SeedError::at(&path))?;
                None
            }
        } else {
            None
        };

        let repo = if let Some(repo) = existing {
            repo
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(SeedError::at(parent))?;
            }
            pb.set_message(format!("Downloading {}...", label));
            match RepoBuilder::new().bare(true).clone(&url, &path) {
                Ok(repo) => repo,
                Err(err) => {
                    pb.finish_with_message(format!("{} Failed {}", "x".red(), label));
                    // A half-written mirror would be reopened next time.
                    let _ = fs::remove_dir_all(&path);
                    return Err(network(err));
                }
            }
        };

        let fetched = repo.find_remote("origin").and_then(|mut remote| {
            let mut opts = FetchOptions::new();
            opts.download_tags(AutotagOption::All);
            remote.fetch(MIRROR_REFSPECS, Some(&mut opts), None)
        });
        if let Err(err) = fetched {
            pb.finish_with_message(format!("{} Failed {}", "x".red(), label));
            return Err(network(err));
        }

        pb.finish_with_message(format!("{} Mirror ready: {}", "✓".green(), label));
        Ok(repo)
    }
}

impl SourceFetcher for VcsFetcher {
    fn kind(&self) -> SourceKind {
        SourceKind::Vcs
    }

    fn fetch(&self, spec: &ResolvedSpec) -> SeedResult<SourceTree> {
        let mirror = self.update_mirror(spec)?;
        let mirror_path = mirror.path().to_path_buf();
        let network = |err: git2::Error| SeedError::NetworkFailure {
            package: spec.to_string(),
            reason: err.message().to_string(),
        };

        let workdir = tempfile::Builder::new()
            .prefix("seed-git-")
            .tempdir()
            .map_err(SeedError::at(std::env::temp_dir()))?;
        let checkout_path = workdir.path().join(&spec.name);

        let mirror_url = mirror_path.to_string_lossy().to_string();
        let repo = Repository::clone(&mirror_url, &checkout_path).map_err(network)?;

        let (oid, label) = select_checkout_target(&repo, spec).ok_or_else(|| {
            SeedError::RefNotFound {
                package: format!("{}/{}/{}", spec.host, spec.organization, spec.name),
                reference: spec.version.clone(),
            }
        })?;
        checkout_repo_target(&repo, oid).map_err(network)?;

        if spec.pinned {
            println!("   {} Locked to {}", "📌".blue(), label);
        }
        Ok(SourceTree::owned(workdir, checkout_path))
    }
}

/// Find the commit a version names inside a fresh working copy.
///
/// Order: tag, branch (local, then `origin/`), full commit id, any revspec.
/// An unpinned version means "whatever the remote's default branch is".
fn origin_url(repo: &Repository) -> Option<String> {
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(str::to_string)
}

fn select_checkout_target(repo: &Repository, spec: &ResolvedSpec) -> Option<(Oid, String)> {
    let version = spec.version.as_str();

    if !spec.pinned
        && let Ok(head) = repo.head()
        && let Ok(commit) = head.peel_to_commit()
    {
        let label = format!("default branch {}", short_hash(&commit.id().to_string()));
        return Some((commit.id(), label));
    }

    let tag_ref = format!("refs/tags/{}", version);
    if let Ok(reference) = repo.find_reference(&tag_ref)
        && let Ok(commit) = reference.peel_to_commit()
    {
        return Some((commit.id(), format!("tag {}", version)));
    }

    if let Some(oid) = find_branch_commit(repo, version) {
        return Some((oid, format!("branch {}", version)));
    }

    if let Ok(oid) = Oid::from_str(version)
        && version.len() == 40
        && let Ok(commit) = repo.find_commit(oid)
    {
        return Some((commit.id(), format!("commit {}", short_hash(version))));
    }

    if let Ok(object) = repo.revparse_single(version)
        && let Ok(commit) = object.peel_to_commit()
    {
        return Some((commit.id(), format!("rev {}", short_hash(version))));
    }

    None
}

fn find_branch_commit(repo: &Repository, branch: &str) -> Option<Oid> {
    if let Ok(reference) = repo.find_branch(branch, git2::BranchType::Local)
        && let Ok(commit) = reference.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    let remote_ref = format!("origin/{}", branch);
    if let Ok(reference) = repo.find_branch(&remote_ref, git2::BranchType::Remote)
        && let Ok(commit) = reference.get().peel_to_commit()
    {
        return Some(commit.id());
    }

    None
}

fn short_hash(rev: &str) -> &str {
    rev.get(..7).unwrap_or(rev)
}

fn checkout_repo_target(repo: &Repository, oid: Oid) -> Result<(), git2::Error> {
    let obj = repo.find_object(oid, None)?;
    let mut checkout_opts = git2::build::CheckoutBuilder::new();
    checkout_opts.force();
    repo.checkout_tree(&obj, Some(&mut checkout_opts))?;
    repo.set_head_detached(oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(version: &str, pinned: bool) -> ResolvedSpec {
        ResolvedSpec {
            host: "example.com".to_string(),
            organization: "acme".to_string(),
            name: "widget".to_string(),
            version: version.to_string(),
            kind: SourceKind::Vcs,
            pinned,
        }
    }

    #[test]
    fn test_remote_url_from_template() {
        let fetcher = VcsFetcher::new("/mirrors", DEFAULT_URL_TEMPLATE);
        assert_eq!(
            fetcher.remote_url(&spec("v1", true)),
            "https://example.com/acme/widget.git"
        );

        let local = VcsFetcher::new("/mirrors", "/srv/git/{organization}/{name}");
        assert_eq!(local.remote_url(&spec("v1", true)), "/srv/git/acme/widget");
    }

    #[test]
    fn test_mirror_path_is_keyed_by_package_not_version() {
        let fetcher = VcsFetcher::new("/mirrors", DEFAULT_URL_TEMPLATE);
        let expected = Path::new("/mirrors")
            .join("example.com")
            .join("acme")
            .join("widget.git");
        assert_eq!(fetcher.mirror_path(&spec("v1", true)), expected);
        assert_eq!(fetcher.mirror_path(&spec("v2", true)), expected);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789abcdef"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
    }

    #[test]
    fn test_unreachable_remote_is_network_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = VcsFetcher::new(
            tmp.path().join("mirrors"),
            tmp.path().join("nowhere").join("{name}").to_string_lossy().to_string(),
        );
        let err = fetcher.fetch(&spec("master", false)).unwrap_err();
        assert!(matches!(err, SeedError::NetworkFailure { .. }), "{err}");
        assert!(!fetcher.mirror_path(&spec("master", false)).exists());
    }
}
