// src/db/catalog.rs

//! Catalog operations over the installed-package tables
//!
//! All operations bind parameters and take a `&Connection`, so they work
//! unchanged inside a transaction (`Transaction` dereferences to
//! `Connection`). Mutating calls outside a transaction are allowed but the
//! installer always wraps them.

use crate::error::Result;
use crate::packages::manifest::Metadata;
use crate::version::{self, Constraint};
use rusqlite::{params, Connection, OptionalExtension};

/// One row of `list_packages`: an installed package and its broken flag.
#[derive(Debug, Clone)]
pub struct PackageRow {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub broken: bool,
}

/// Whether a package with this exact name is installed.
pub fn is_installed(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM packages WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Installed version of a package, if any.
pub fn get_version(conn: &Connection, name: &str) -> Result<Option<String>> {
    let version = conn
        .query_row(
            "SELECT version FROM packages WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version)
}

/// Upsert a package row and replace its dependency and provides rows.
///
/// Replacing an existing row cascades away its old side tables (files
/// included), so a reinstall starts from a clean slate. Dependency rows
/// store the parsed name; SONAME entries are not recorded since every
/// consumer skips them. Provides rows store the parsed (name, version)
/// pair.
pub fn add_package(conn: &Connection, meta: &Metadata, script: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO packages (name, version, arch, install_script)
         VALUES (?1, ?2, ?3, ?4)",
        params![&meta.name, &meta.version, &meta.arch, script],
    )?;

    conn.execute("DELETE FROM dependencies WHERE package = ?1", [&meta.name])?;
    for raw in &meta.deps {
        let c = version::parse_constraint(raw);
        if version::is_soname(&c.name) {
            continue;
        }
        conn.execute(
            "INSERT INTO dependencies (package, dependency) VALUES (?1, ?2)",
            params![&meta.name, &c.name],
        )?;
    }

    conn.execute("DELETE FROM provides WHERE package = ?1", [&meta.name])?;
    for raw in &meta.provides {
        let c = version::parse_constraint(raw);
        conn.execute(
            "INSERT INTO provides (package, provided, provided_version) VALUES (?1, ?2, ?3)",
            params![&meta.name, &c.name, &c.version],
        )?;
    }

    Ok(())
}

/// Record an installed file path (absolute on the target system).
pub fn log_file(conn: &Connection, name: &str, path: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO files (package, filepath) VALUES (?1, ?2)",
        params![name, path],
    )?;
    Ok(())
}

/// All file paths logged for a package.
pub fn get_files(conn: &Connection, name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT filepath FROM files WHERE package = ?1")?;
    let files = stmt
        .query_map([name], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(files)
}

/// Dependency names recorded for a package.
pub fn get_dependencies(conn: &Connection, name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT dependency FROM dependencies WHERE package = ?1")?;
    let deps = stmt
        .query_map([name], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(deps)
}

/// Installed packages that depend on `name`.
pub fn get_reverse_dependencies(conn: &Connection, name: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT package FROM dependencies WHERE dependency = ?1 ORDER BY package",
    )?;
    let dependents = stmt
        .query_map([name], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(dependents)
}

/// Stored hook script path for a package, if one was preserved.
pub fn get_install_script(conn: &Connection, name: &str) -> Result<Option<String>> {
    let script = conn
        .query_row(
            "SELECT install_script FROM packages WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(script.flatten())
}

/// Whether any installed package provides `name` (any version).
pub fn is_provided(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM provides WHERE provided = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether any installed package provides a version satisfying `c`.
pub fn provides_satisfies(conn: &Connection, c: &Constraint) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT provided_version FROM provides WHERE provided = ?1")?;
    let versions = stmt
        .query_map([&c.name], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(versions
        .iter()
        .any(|v| c.op.is_empty() || version::eval_constraint(v, c)))
}

/// Mark a package broken (unmet invariants at install or removal time).
pub fn mark_broken(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO broken_packages (name) VALUES (?1)",
        [name],
    )?;
    Ok(())
}

/// Clear a package's broken marker.
pub fn remove_broken(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM broken_packages WHERE name = ?1", [name])?;
    Ok(())
}

/// All packages currently marked broken.
pub fn get_broken_packages(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM broken_packages ORDER BY name")?;
    let broken = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(broken)
}

/// Drop all file rows for a package.
pub fn remove_files(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM files WHERE package = ?1", [name])?;
    Ok(())
}

/// Delete a package row; side tables and the broken marker cascade away.
pub fn delete_package(conn: &Connection, name: &str) -> Result<()> {
    conn.execute("DELETE FROM packages WHERE name = ?1", [name])?;
    Ok(())
}

/// All installed packages with their broken flags, ordered by name.
pub fn list_packages(conn: &Connection) -> Result<Vec<PackageRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.name, p.version, p.arch, b.name IS NOT NULL
         FROM packages p
         LEFT JOIN broken_packages b ON b.name = p.name
         ORDER BY p.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PackageRow {
                name: row.get(0)?,
                version: row.get(1)?,
                arch: row.get(2)?,
                broken: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
