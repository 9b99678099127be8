//! Shared fixtures: throwaway git upstreams and tree snapshots.

#![allow(dead_code)]

use git2::{IndexAddOption, Oid, Repository, Signature};
use seed::config::Settings;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct Upstream {
    pub repo: Repository,
    pub dir: PathBuf,
}

impl Upstream {
    /// A repo at `<root>/upstream/<organization>/<name>` on branch `master`.
    pub fn init(root: &Path, organization: &str, name: &str) -> Self {
        let dir = root.join("upstream").join(organization).join(name);
        fs::create_dir_all(&dir).unwrap();
        let repo = Repository::init(&dir).unwrap();
        repo.set_head("refs/heads/master").unwrap();
        Self { repo, dir }
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    pub fn remove(&self, relative: &str) -> &Self {
        fs::remove_file(self.dir.join(relative)).unwrap();
        self
    }

    pub fn commit(&self, message: &str) -> Oid {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .unwrap();
        // Picks up deletions, which add_all ignores.
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("seed tests", "tests@example.com").unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    pub fn tag(&self, name: &str, oid: Oid) {
        let object = self.repo.find_object(oid, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).unwrap();
        self.repo.branch(name, &commit, false).unwrap();
    }
}

/// Settings with every directory inside `root` and git URLs pointing at
/// `<root>/upstream`.
pub fn settings(root: &Path) -> Settings {
    let mut settings = Settings::under(&root.join("home")).with_vendor_dir(root.join("vendor"));
    settings.url_template = root
        .join("upstream")
        .join("{organization}")
        .join("{name}")
        .to_string_lossy()
        .to_string();
    settings
}

/// Relative path -> file bytes for every file under `dir`.
pub fn snapshot(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    snapshot(dir).into_keys().collect()
}
