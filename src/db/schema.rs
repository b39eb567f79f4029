// src/db/schema.rs

//! Catalog schema definitions and migrations
//!
//! Defines the SQLite schema for the installed-package catalog and provides
//! a migration system to evolve it over time.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the catalog
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the catalog up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying catalog migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => panic!("Unknown migration version: {}", version),
    }
}

/// Initial schema - Version 1
///
/// Creates the core tables:
/// - packages: installed package rows, one per name
/// - dependencies: runtime dependency names per package
/// - provides: provided (name, version) pairs per package
/// - files: installed file paths per package
/// - broken_packages: packages installed or left behind with unmet
///   invariants
///
/// Deleting a package cascades through all four side tables, including its
/// broken marker.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE packages (
            name TEXT PRIMARY KEY,
            version TEXT NOT NULL,
            arch TEXT NOT NULL,
            install_script TEXT
        );

        CREATE TABLE dependencies (
            package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
            dependency TEXT NOT NULL
        );

        CREATE INDEX idx_dependencies_package ON dependencies(package);
        CREATE INDEX idx_dependencies_dependency ON dependencies(dependency);

        CREATE TABLE provides (
            package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
            provided TEXT NOT NULL,
            provided_version TEXT NOT NULL DEFAULT ''
        );

        CREATE INDEX idx_provides_package ON provides(package);
        CREATE INDEX idx_provides_provided ON provides(provided);

        CREATE TABLE files (
            package TEXT NOT NULL REFERENCES packages(name) ON DELETE CASCADE,
            filepath TEXT NOT NULL
        );

        CREATE INDEX idx_files_package ON files(package);

        CREATE TABLE broken_packages (
            name TEXT PRIMARY KEY REFERENCES packages(name) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}
