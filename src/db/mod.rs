// src/db/mod.rs

//! Catalog layer for anemonix
//!
//! This module handles all SQLite operations including:
//! - Catalog creation and schema migration
//! - Connection management
//! - Transaction handling
//! - CRUD operations for packages, files, dependencies, provides, and the
//!   broken set

pub mod catalog;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::debug;

/// Open the catalog at `db_path`, creating it and its parent directories
/// if absent, and bring the schema up to date.
///
/// This is idempotent - calling it on an existing catalog is safe. SQLite's
/// own file locking together with the busy timeout serves as the advisory
/// lock against concurrent invocations.
pub fn open(db_path: &Path) -> Result<Connection> {
    debug!("Opening catalog at: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    schema::migrate(&conn)?;

    Ok(conn)
}

/// Execute `f` within a transaction.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. The
/// transaction dereferences to `Connection`, so every catalog operation
/// works unchanged inside the closure.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}
