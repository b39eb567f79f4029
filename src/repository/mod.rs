// src/repository/mod.rs

//! Repository management and package downloading
//!
//! This module provides functionality for:
//! - Managing repository descriptors (`<name>.json` under the repos dir)
//! - Synchronizing repository indexes (`<url>/repo.json`)
//! - Downloading package blobs in parallel with retry support

pub mod index;

use crate::error::{Error, Result};
use crate::repository::index::RepoPackage;
use rayon::prelude::*;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Upper bound on concurrent package downloads
const MAX_FETCH_WORKERS: usize = 8;

/// Default priority for newly added repositories
pub const DEFAULT_PRIORITY: i32 = 50;

/// A repository descriptor, persisted as `<repoBase>/<name>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub name: String,
    pub url: String,
    pub priority: i32,
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download a URL to the given path with retry support.
    ///
    /// Writes to a sibling temp file first and renames into place so a
    /// failed download never leaves a truncated file behind.
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<()> {
        debug!("Downloading {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let temp_path = dest_path.with_extension("part");
                    let mut file = File::create(&temp_path)?;
                    io::copy(&mut response, &mut file)
                        .map_err(|e| Error::Download(format!("failed to write {}: {}", url, e)))?;
                    fs::rename(&temp_path, dest_path)?;

                    debug!("Downloaded {}", dest_path.display());
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Read every descriptor file in the repos directory, sorted by name.
///
/// Files that fail to parse are reported and skipped.
pub fn read_descriptors(repo_base: &Path) -> Result<Vec<RepoDescriptor>> {
    let mut descriptors = Vec::new();

    for entry in fs::read_dir(repo_base)? {
        let path = entry?.path();
        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        match read_descriptor_file(&path) {
            Ok(desc) => descriptors.push(desc),
            Err(e) => {
                crate::ui::error(format!("parsing {}: {}", path.display(), e));
            }
        }
    }

    descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(descriptors)
}

fn read_descriptor_file(path: &Path) -> Result<RepoDescriptor> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a new repository descriptor. Fails if the repository exists.
pub fn add_repo(repo_base: &Path, name: &str, url: &str, priority: i32) -> Result<()> {
    fs::create_dir_all(repo_base)?;

    let descriptor_path = repo_base.join(format!("{}.json", name));
    if descriptor_path.exists() {
        return Err(Error::Parse(format!("repository '{}' already exists", name)));
    }

    let descriptor = RepoDescriptor {
        name: name.to_string(),
        url: url.to_string(),
        priority,
    };
    fs::write(&descriptor_path, serde_json::to_string_pretty(&descriptor)?)?;

    info!("Added repository {} (priority {})", name, priority);
    Ok(())
}

/// Delete a repository descriptor and its synced data directory.
pub fn remove_repo(repo_base: &Path, name: &str) -> Result<()> {
    let descriptor_path = repo_base.join(format!("{}.json", name));
    if !descriptor_path.exists() {
        return Err(Error::Parse(format!(
            "repository '{}' not found in {}",
            name,
            repo_base.display()
        )));
    }
    fs::remove_file(&descriptor_path)?;

    let data_dir = repo_base.join(name);
    if data_dir.exists() {
        if let Err(e) = fs::remove_dir_all(&data_dir) {
            crate::ui::warning(format!(
                "failed to remove data directory '{}': {}",
                data_dir.display(),
                e
            ));
        }
    }

    Ok(())
}

/// Fetch `<url>/repo.json` for every descriptor into
/// `<repoBase>/<name>/repo.json`. Per-repo failures are reported and do not
/// stop the sync.
///
/// Returns `(synced, failed)` counts.
pub fn sync_repos(repo_base: &Path) -> Result<(usize, usize)> {
    let descriptors = read_descriptors(repo_base)?;
    let client = RepositoryClient::new()?;

    let mut synced = 0;
    let mut failed = 0;
    for desc in &descriptors {
        let local_dir = repo_base.join(&desc.name);
        fs::create_dir_all(&local_dir)?;

        let index_url = format!("{}/repo.json", desc.url.trim_end_matches('/'));
        let index_file = local_dir.join("repo.json");

        match client.download_file(&index_url, &index_file) {
            Ok(()) => {
                crate::ui::info(format!("{}: synced {}", desc.name, index_url));
                synced += 1;
            }
            Err(e) => {
                crate::ui::error(format!("{}: {}", desc.name, e));
                failed += 1;
            }
        }
    }

    Ok((synced, failed))
}

/// Download every plan entry into `dest_dir`, in parallel.
///
/// Up to `min(N, 8)` downloads run concurrently on a dedicated pool. All
/// tasks run to completion before this returns; a single failure fails the
/// whole fetch. Shared state is one lock-protected progress printer and one
/// atomic completion counter; nothing else is touched during the fetch
/// phase.
pub fn download_plan(plan: &[RepoPackage], dest_dir: &Path) -> Result<()> {
    if plan.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dest_dir)?;

    let workers = plan.len().min(MAX_FETCH_WORKERS);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| Error::Download(format!("failed to start fetch pool: {}", e)))?;

    let total = plan.len();
    let completed = AtomicUsize::new(0);
    let printer = Mutex::new(());

    let results: Vec<Result<()>> = pool.install(|| {
        plan.par_iter()
            .map(|pkg| {
                let client = RepositoryClient::new()?;
                let url = format!(
                    "{}/{}",
                    pkg.repo_url.trim_end_matches('/'),
                    pkg.filename
                );
                let dest = dest_dir.join(&pkg.filename);
                let result = client.download_file(&url, &dest);

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                {
                    let _guard = printer.lock().unwrap();
                    match &result {
                        Ok(()) => println!(
                            "  [{}/{}] fetched {}-{}",
                            done, total, pkg.pkgname, pkg.pkgver
                        ),
                        Err(e) => println!(
                            "  [{}/{}] {}-{} failed: {}",
                            done, total, pkg.pkgname, pkg.pkgver, e
                        ),
                    }
                }
                result
            })
            .collect()
    });

    for result in results {
        result?;
    }
    Ok(())
}
