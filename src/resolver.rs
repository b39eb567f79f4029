// src/resolver.rs

//! Dependency resolution
//!
//! Turns the user's requirement strings into an ordered install plan in
//! which every dependency of an entry precedes it. Resolution is a DFS over
//! the package index; already-satisfied requirements are pruned against the
//! catalog, candidates are ranked by repository priority then version, and a
//! real package always beats a virtual provider for the same name.
//!
//! Dependency cycles are tolerated: the resolver warns and treats the
//! package as satisfied rather than failing the plan.

use crate::db::catalog;
use crate::error::{Error, Result};
use crate::repository::index::{PackageIndex, RepoPackage};
use crate::ui;
use crate::version::{self, parse_constraint};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::debug;

pub struct Resolver<'a> {
    conn: &'a Connection,
    index: &'a PackageIndex,
    visited: HashSet<String>,
    in_stack: HashSet<String>,
    plan: Vec<RepoPackage>,
}

impl<'a> Resolver<'a> {
    pub fn new(conn: &'a Connection, index: &'a PackageIndex) -> Self {
        Self {
            conn,
            index,
            visited: HashSet::new(),
            in_stack: HashSet::new(),
            plan: Vec::new(),
        }
    }

    /// Resolve the raw requirement strings into an ordered install plan.
    ///
    /// Entries whose exact (name, version) is already installed are
    /// stripped from the result; an empty plan means everything was already
    /// satisfied.
    pub fn resolve(mut self, requirements: &[String]) -> Result<Vec<RepoPackage>> {
        for raw in requirements {
            self.visit(raw)?;
        }

        let mut plan = Vec::with_capacity(self.plan.len());
        for pkg in self.plan {
            let already = catalog::get_version(self.conn, &pkg.pkgname)?
                .map(|v| v == pkg.pkgver)
                .unwrap_or(false);
            if already {
                ui::info(format!(
                    "{}-{} already installed; skipping",
                    pkg.pkgname, pkg.pkgver
                ));
            } else {
                plan.push(pkg);
            }
        }
        Ok(plan)
    }

    fn visit(&mut self, raw_req: &str) -> Result<()> {
        let c = parse_constraint(raw_req);
        let name = c.name.clone();

        if self.visited.contains(&name) {
            return Ok(());
        }

        // Installed and version-satisfying requirements end the branch.
        if let Some(installed) = catalog::get_version(self.conn, &name)? {
            if c.op.is_empty() || version::eval_constraint(&installed, &c) {
                self.visited.insert(name);
                return Ok(());
            }
        }

        let Some(candidates) = self.index.candidates(&name) else {
            return Err(Error::NotFoundInRepo(raw_req.to_string()));
        };

        let mut candidates: Vec<&RepoPackage> = candidates
            .iter()
            .filter(|rp| c.op.is_empty() || version::eval_constraint(&rp.pkgver, &c))
            .collect();
        if candidates.is_empty() {
            return Err(Error::NotFoundInRepo(format!(
                "no candidate for '{}'",
                raw_req
            )));
        }

        // A real package beats a pure virtual provider.
        if candidates.iter().any(|rp| rp.pkgname == name) {
            candidates.retain(|rp| rp.pkgname == name);
        }

        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| version::version_compare(&b.pkgver, &a.pkgver))
        });
        let best = candidates[0].clone();

        if self.in_stack.contains(&name) {
            ui::warning(format!("cycle on '{}', skipping", name));
            self.visited.insert(name);
            return Ok(());
        }
        self.in_stack.insert(name.clone());

        for raw_dep in &best.depends {
            let dc = parse_constraint(raw_dep);

            if version::is_soname(&dc.name) {
                continue;
            }
            if dc.name == name {
                continue;
            }
            if let Some(installed) = catalog::get_version(self.conn, &dc.name)? {
                if dc.op.is_empty() || version::eval_constraint(&installed, &dc) {
                    continue;
                }
            }

            self.visit(raw_dep)?;
        }

        self.in_stack.remove(&name);
        self.visited.insert(name.clone());
        debug!(
            "plan += {}-{} from {}",
            best.pkgname, best.pkgver, best.repo_name
        );
        self.plan.push(best);
        Ok(())
    }
}
