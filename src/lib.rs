// src/lib.rs

//! Anemonix Package Manager
//!
//! Source-independent binary package manager for Unix-like systems.
//! Packages are tar archives (`.apkg`) carrying a YAML manifest
//! (`anemonix.yaml`) and an optional lifecycle hook script
//! (`install.anemonix`), installed under a configurable root prefix and
//! tracked in a SQLite catalog.
//!
//! # Architecture
//!
//! - Catalog-first: installed state, file ownership, dependencies,
//!   provides, and the broken set all live in SQLite
//! - Transactional installs: catalog and filesystem commit together or
//!   roll back together
//! - Multi-repository index with priorities and virtual providers
//! - Bootstrap mode: all mutations scoped under an alternate root for
//!   offline image construction

pub mod db;
mod error;
pub mod hooks;
pub mod installer;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod ui;
pub mod version;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

/// Filesystem layout under an install root.
///
/// Every persisted path is derived here so that a bootstrap prefix with or
/// without a trailing slash resolves to the same locations.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Layout scoped under `root` (`/` for a live system, the bootstrap
    /// directory otherwise).
    pub fn under(root: &Path) -> Self {
        let mut root = root.to_path_buf();
        if root.as_os_str().is_empty() {
            root = PathBuf::from("/");
        }
        Self { root }
    }

    /// The install root itself.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/var/lib/anemonix`
    pub fn state_dir(&self) -> PathBuf {
        self.root.join("var/lib/anemonix")
    }

    /// `<root>/var/lib/anemonix/anemonix.db`
    pub fn catalog(&self) -> PathBuf {
        self.state_dir().join("anemonix.db")
    }

    /// `<root>/var/lib/anemonix/repos`
    pub fn repo_dir(&self) -> PathBuf {
        self.state_dir().join("repos")
    }

    /// `<root>/var/lib/anemonix/scripts`
    pub fn script_dir(&self) -> PathBuf {
        self.state_dir().join("scripts")
    }

    /// Stored hook script path for a package version.
    pub fn script_path(&self, name: &str, version: &str) -> PathBuf {
        self.script_dir().join(format!("{}-{}.anemonix", name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_does_not_change_layout() {
        let a = Paths::under(Path::new("/mnt/target"));
        let b = Paths::under(Path::new("/mnt/target/"));
        assert_eq!(a.catalog(), b.catalog());
        assert_eq!(a.repo_dir(), b.repo_dir());
        assert_eq!(
            a.catalog(),
            PathBuf::from("/mnt/target/var/lib/anemonix/anemonix.db")
        );
    }

    #[test]
    fn empty_root_means_slash() {
        let p = Paths::under(Path::new(""));
        assert_eq!(p.catalog(), PathBuf::from("/var/lib/anemonix/anemonix.db"));
    }

    #[test]
    fn script_path_includes_version() {
        let p = Paths::under(Path::new("/"));
        assert_eq!(
            p.script_path("nginx", "1.21.0"),
            PathBuf::from("/var/lib/anemonix/scripts/nginx-1.21.0.anemonix")
        );
    }
}
