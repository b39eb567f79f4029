// src/repository/index.rs

//! In-memory package index aggregated from synced repository indexes
//!
//! Each repository descriptor `<name>.json` has a sibling
//! `<name>/repo.json` holding `{ "packages": [...] }` once synced. The
//! index maps every package name - and every provided name other than the
//! package's own - to the candidates offering it.

use crate::error::Result;
use crate::repository::{self, RepoDescriptor};
use crate::version;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One entry of a synced `repo.json` index.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub pkgname: String,
    pub pkgver: String,
    pub arch: String,
    pub filename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    packages: Vec<IndexEntry>,
}

/// A candidate package offered by a repository. Constructed when the index
/// loads a synced repo and immutable thereafter.
#[derive(Debug, Clone)]
pub struct RepoPackage {
    pub pkgname: String,
    pub pkgver: String,
    pub arch: String,
    pub filename: String,
    pub repo_url: String,
    pub repo_name: String,
    pub priority: i32,
    pub depends: Vec<String>,
    pub provides: Vec<String>,
}

/// `name -> candidates` over all synced repositories, including virtual
/// providers.
#[derive(Debug, Default)]
pub struct PackageIndex {
    map: HashMap<String, Vec<RepoPackage>>,
}

impl PackageIndex {
    /// Build the index eagerly from the repos directory. Repositories
    /// without a synced index are skipped silently.
    pub fn load(repo_base: &Path) -> Result<Self> {
        let mut index = PackageIndex::default();

        for (desc, entries) in synced_indexes(repo_base)? {
            for entry in entries {
                index.insert(RepoPackage {
                    pkgname: entry.pkgname,
                    pkgver: entry.pkgver,
                    arch: entry.arch,
                    filename: entry.filename,
                    repo_url: desc.url.clone(),
                    repo_name: desc.name.clone(),
                    priority: desc.priority,
                    depends: entry.depends,
                    provides: entry.provides,
                });
            }
        }

        debug!("Package index holds {} names", index.map.len());
        Ok(index)
    }

    pub(crate) fn insert(&mut self, pkg: RepoPackage) {
        // Index under each provided name too, but never under the package's
        // own name twice (a package providing itself would self-cycle).
        for raw in &pkg.provides {
            let provided = version::parse_constraint(raw).name;
            if provided != pkg.pkgname {
                self.map
                    .entry(provided)
                    .or_default()
                    .push(pkg.clone());
            }
        }
        self.map.entry(pkg.pkgname.clone()).or_default().push(pkg);
    }

    /// Candidates offering `name`, real or virtual.
    pub fn candidates(&self, name: &str) -> Option<&[RepoPackage]> {
        self.map.get(name).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Every synced repository with its decoded index entries, in descriptor
/// order. Used by the index build and the `query` command.
pub fn synced_indexes(repo_base: &Path) -> Result<Vec<(RepoDescriptor, Vec<IndexEntry>)>> {
    let mut out = Vec::new();

    for desc in repository::read_descriptors(repo_base)? {
        let index_path = repo_base.join(&desc.name).join("repo.json");
        if !index_path.exists() {
            debug!("repo '{}' not synced; skipping", desc.name);
            continue;
        }

        let content = fs::read_to_string(&index_path)?;
        let parsed: IndexFile = serde_json::from_str(&content)?;
        out.push((desc, parsed.packages));
    }

    Ok(out)
}
