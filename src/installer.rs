// src/installer.rs

//! Transactional package install, removal, and the broken-package audit
//!
//! An install commits the catalog rows and the payload files under a single
//! catalog transaction: any failure before commit rolls back the catalog and
//! deletes every file placed so far (in reverse order). Failures after
//! commit (a nonzero hook) are warnings; committed state is preserved.
//!
//! `--force` downgrades the dependency, conflict, and reverse-dependency
//! gates from fatal to warning and marks the affected packages broken. The
//! audit loop clears broken markers once every recorded dependency is
//! installed again.

use crate::db::catalog;
use crate::error::{Error, Result};
use crate::hooks;
use crate::packages::apkg::{Apkg, InstalledFile};
use crate::packages::manifest::Metadata;
use crate::ui;
use crate::version::{self, parse_constraint};
use crate::Paths;
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Machine architecture of the running host, per uname.
pub fn detect_host_arch() -> String {
    nix::sys::utsname::uname()
        .map(|u| u.machine().to_string_lossy().into_owned())
        .unwrap_or_else(|_| std::env::consts::ARCH.to_string())
}

pub struct Installer<'a> {
    conn: &'a mut Connection,
    paths: Paths,
    force: bool,
    staged: HashSet<String>,
    warnings: bool,
}

impl<'a> Installer<'a> {
    pub fn new(conn: &'a mut Connection, paths: Paths, force: bool) -> Self {
        Self {
            conn,
            paths,
            force,
            staged: HashSet::new(),
            warnings: false,
        }
    }

    /// Names queued for installation in the current batch; forward
    /// references to them satisfy the dependency gate.
    pub fn with_staged(mut self, staged: HashSet<String>) -> Self {
        self.staged = staged;
        self
    }

    /// Install a single `.apkg` archive.
    pub fn install_archive(&mut self, archive: &Path) -> Result<()> {
        self.warnings = false;

        let apkg = Apkg::open(archive);
        let extracted = apkg.extract()?;
        let meta = extracted.metadata.clone();

        self.check_arch(&meta)?;
        self.check_dependencies(&meta)?;
        self.check_conflicts(&meta)?;
        self.apply_replaces(&meta)?;

        // Persist the hook script before the catalog references it.
        let stored_script = match extracted.script() {
            Some(src) => {
                fs::create_dir_all(self.paths.script_dir())?;
                let dst = self.paths.script_path(&meta.name, &meta.version);
                fs::copy(src, &dst)?;
                Some(dst)
            }
            None => None,
        };

        let root = self.paths.root().to_path_buf();
        let mut installed: Vec<InstalledFile> = Vec::new();

        let tx = self.conn.transaction()?;
        let staged_result = (|| -> Result<()> {
            let script_str = stored_script.as_ref().map(|p| p.to_string_lossy().into_owned());
            catalog::add_package(&tx, &meta, script_str.as_deref())?;

            match extracted.payload_prefix() {
                None => {
                    ui::info("package contains no files; skipping file installation");
                }
                Some(prefix) => {
                    apkg.unpack_payload(prefix, &root, &mut installed)?;
                    for file in &installed {
                        catalog::log_file(&tx, &meta.name, &file.record)?;
                    }
                }
            }
            Ok(())
        })();

        let committed = match staged_result {
            Ok(()) => tx.commit().map_err(Error::from),
            Err(e) => {
                drop(tx);
                Err(e)
            }
        };
        if let Err(e) = committed {
            // Best-effort filesystem rollback, newest file first; failures
            // here must not mask the original error.
            for file in installed.iter().rev() {
                if let Err(re) = fs::remove_file(&file.dest) {
                    warn!("rollback: failed to remove {}: {}", file.dest.display(), re);
                }
            }
            if let Some(script) = &stored_script {
                let _ = fs::remove_file(script);
            }
            return Err(e);
        }

        if self.warnings && self.force {
            ui::warning("package installed with warnings; marking as broken");
            catalog::mark_broken(self.conn, &meta.name)?;
        }

        if let Some(script) = &stored_script {
            if let Err(e) = hooks::run_hook(script, "post_install", &root) {
                ui::warning(format!("{}", e));
            }
        }

        ui::success(format!("Installed '{}-{}'", meta.name, meta.version));
        Ok(())
    }

    fn check_arch(&self, meta: &Metadata) -> Result<()> {
        let host = detect_host_arch();
        if meta.arch != "any" && meta.arch != "all" && meta.arch != host {
            return Err(Error::ArchMismatch {
                package: meta.arch.clone(),
                host,
            });
        }
        Ok(())
    }

    fn check_dependencies(&mut self, meta: &Metadata) -> Result<()> {
        let self_provides: HashSet<String> = meta
            .provides
            .iter()
            .map(|p| parse_constraint(p).name)
            .collect();

        for raw in &meta.deps {
            let c = parse_constraint(raw);

            if version::is_soname(&c.name) {
                continue;
            }
            if self_provides.contains(&c.name) {
                continue;
            }
            if catalog::is_provided(self.conn, &c.name)? {
                continue;
            }
            if catalog::provides_satisfies(self.conn, &c)? {
                continue;
            }
            if self.staged.contains(&c.name) {
                continue;
            }

            if let Some(installed) = catalog::get_version(self.conn, &c.name)? {
                if version::eval_constraint(&installed, &c) {
                    continue;
                }
                ui::warning(format!(
                    "dependency '{}' demands version {}{}, but found {}",
                    raw, c.op, c.version, installed
                ));
                if !self.force {
                    return Err(Error::VersionMismatch {
                        requirement: raw.clone(),
                        installed,
                    });
                }
                self.warnings = true;
                continue;
            }

            ui::warning(format!("missing dependency '{}'", raw));
            if !self.force {
                return Err(Error::MissingDependency(raw.clone()));
            }
            self.warnings = true;
        }
        Ok(())
    }

    fn check_conflicts(&mut self, meta: &Metadata) -> Result<()> {
        for raw in &meta.conflicts {
            let c = parse_constraint(raw);
            if let Some(installed) = catalog::get_version(self.conn, &c.name)? {
                if version::eval_constraint(&installed, &c) {
                    ui::warning(format!("conflict with installed '{}'", raw));
                    if !self.force {
                        return Err(Error::Conflict(raw.clone()));
                    }
                    self.warnings = true;
                }
            }
        }
        Ok(())
    }

    fn apply_replaces(&mut self, meta: &Metadata) -> Result<()> {
        for raw in &meta.replaces {
            let c = parse_constraint(raw);
            let replaces = catalog::get_version(self.conn, &c.name)?
                .map(|v| version::eval_constraint(&v, &c))
                .unwrap_or(false);
            if replaces {
                ui::info(format!("Replacing '{}'", raw));
                if let Err(e) = self.remove_package(&c.name) {
                    ui::warning(format!("failed to replace '{}': {}", c.name, e));
                }
            }
        }
        Ok(())
    }

    /// Remove an installed package, its files, and its stored hook script.
    pub fn remove_package(&mut self, name: &str) -> Result<()> {
        if !catalog::is_installed(self.conn, name)? {
            return Err(Error::NotInstalled(name.to_string()));
        }

        let dependents = catalog::get_reverse_dependencies(self.conn, name)?;
        if !dependents.is_empty() {
            if !self.force {
                ui::error(format!(
                    "cannot remove '{}'; other packages depend on it:",
                    name
                ));
                for pkg in &dependents {
                    eprintln!("  - {}", pkg);
                }
                return Err(Error::ReverseDependencyBlocked {
                    name: name.to_string(),
                    dependents,
                });
            }
            ui::warning(format!(
                "force removing '{}'; marking dependents as broken",
                name
            ));
            for pkg in &dependents {
                catalog::mark_broken(self.conn, pkg)?;
            }
        }

        let script = catalog::get_install_script(self.conn, name)?;
        let root = self.paths.root().to_path_buf();

        let tx = self.conn.transaction()?;

        for file in catalog::get_files(&tx, name)? {
            // recorded paths are absolute on the target system
            let dest = root.join(file.trim_start_matches('/'));
            if dest.symlink_metadata().is_ok() {
                if let Err(e) = fs::remove_file(&dest) {
                    ui::warning(format!("failed to remove file '{}': {}", dest.display(), e));
                }
            }
        }
        catalog::remove_files(&tx, name)?;

        if let Some(script) = &script {
            let script_path = Path::new(script);
            if script_path.exists() {
                if let Err(e) = hooks::run_hook(script_path, "post_remove", &root) {
                    ui::warning(format!("{}", e));
                }
                if let Err(e) = fs::remove_file(script_path) {
                    ui::warning(format!("failed to remove script '{}': {}", script, e));
                }
            }
        }

        catalog::delete_package(&tx, name)?;
        tx.commit()?;

        ui::success(format!("Removed '{}'", name));
        Ok(())
    }
}

/// Clear broken markers for packages whose recorded dependencies are all
/// installed again. Returns the packages fixed.
pub fn audit(conn: &Connection) -> Result<Vec<String>> {
    let broken = catalog::get_broken_packages(conn)?;
    let mut fixed = Vec::new();

    for pkg in broken {
        let deps = catalog::get_dependencies(conn, &pkg)?;
        let mut satisfied = true;
        for dep in deps {
            if !catalog::is_installed(conn, &dep)? {
                satisfied = false;
                break;
            }
        }
        if satisfied {
            catalog::remove_broken(conn, &pkg)?;
            debug!("audit: '{}' fixed", pkg);
            fixed.push(pkg);
        }
    }

    Ok(fixed)
}
