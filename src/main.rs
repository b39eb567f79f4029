// src/main.rs

use anemonix::db::catalog;
use anemonix::installer::{self, Installer};
use anemonix::repository::index::PackageIndex;
use anemonix::resolver::Resolver;
use anemonix::{db, repository, ui, Paths};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

#[derive(Parser)]
#[command(name = "anemonix")]
#[command(author, version, about = "Source-independent binary package manager", long_about = None)]
struct Cli {
    /// Force action (ignore warnings)
    #[arg(short, long, global = true)]
    force: bool,

    /// Bootstrap directory prefix
    #[arg(short, long, global = true, value_name = "DIR")]
    bootstrap: Option<PathBuf>,

    /// Parseable output
    #[arg(short, long, global = true)]
    parse: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install local .apkg archives directly
    InstallBin {
        /// Archive paths
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },
    /// Resolve requirements against the repositories, download, and install
    Install {
        /// Requirements, e.g. `nginx` or `nginx>=1.20`
        #[arg(required = true)]
        requirements: Vec<String>,
    },
    /// Remove installed packages
    Remove {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Add a repository descriptor
    AddRepo {
        name: String,
        url: String,
        /// Repository priority (higher wins)
        priority: Option<i32>,
    },
    /// Fetch the index of every configured repository
    SyncRepo,
    /// Delete a repository descriptor and its synced index
    RemoveRepo { name: String },
    /// Re-check broken packages and clear the ones now satisfied
    Audit,
    /// List installed packages
    List,
    /// Show details of installed packages
    Info {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Search all synced repository indexes
    Query { pattern: String },
    /// Print the number of installed packages
    Count,
}

fn require_root() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        bail!("this operation requires root privileges");
    }
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        ui::error(e.to_string());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ui::set_parse_output(cli.parse);

    let root = cli.bootstrap.clone().unwrap_or_else(|| PathBuf::from("/"));
    let paths = Paths::under(&root);

    fs::create_dir_all(paths.state_dir())?;
    fs::create_dir_all(paths.repo_dir())?;

    match cli.command {
        Commands::InstallBin { archives } => {
            require_root()?;
            let mut conn = db::open(&paths.catalog())?;
            let mut installer = Installer::new(&mut conn, paths.clone(), cli.force);

            let mut failed = false;
            for archive in &archives {
                if let Err(e) = installer.install_archive(archive) {
                    ui::error(format!("failed to install '{}': {}", archive.display(), e));
                    failed = true;
                }
            }
            if failed {
                bail!("one or more archives failed to install");
            }
            Ok(())
        }

        Commands::Install { requirements } => {
            require_root()?;
            let mut conn = db::open(&paths.catalog())?;

            let index = PackageIndex::load(&paths.repo_dir())?;
            let plan = Resolver::new(&conn, &index).resolve(&requirements)?;
            if plan.is_empty() {
                ui::info("all requested packages are already installed");
                return Ok(());
            }

            info!("install plan holds {} package(s)", plan.len());
            let staging = TempDir::new()?;
            repository::download_plan(&plan, staging.path())?;

            let staged: HashSet<String> = plan.iter().map(|p| p.pkgname.clone()).collect();
            let mut installer =
                Installer::new(&mut conn, paths.clone(), cli.force).with_staged(staged);

            let mut committed: Vec<String> = Vec::new();
            for pkg in &plan {
                if !cli.parse {
                    println!("Installing {}-{} ...", pkg.pkgname, pkg.pkgver);
                }
                if let Err(e) = installer.install_archive(&staging.path().join(&pkg.filename)) {
                    ui::error(format!("failed to install '{}': {}", pkg.pkgname, e));
                    if !committed.is_empty() {
                        ui::warning(format!(
                            "already installed from this plan: {}",
                            committed.join(", ")
                        ));
                    }
                    bail!("install aborted");
                }
                committed.push(format!("{}-{}", pkg.pkgname, pkg.pkgver));
            }

            ui::success("All packages installed.");
            Ok(())
        }

        Commands::Remove { names } => {
            require_root()?;
            if cli.bootstrap.is_some() {
                bail!("cannot remove packages when bootstrapping");
            }
            let mut conn = db::open(&paths.catalog())?;
            let mut installer = Installer::new(&mut conn, paths.clone(), cli.force);

            let mut failed = false;
            for name in &names {
                if let Err(e) = installer.remove_package(name) {
                    ui::error(format!("failed to remove '{}': {}", name, e));
                    failed = true;
                }
            }
            if failed {
                bail!("one or more packages failed to remove");
            }
            Ok(())
        }

        Commands::AddRepo {
            name,
            url,
            priority,
        } => {
            require_root()?;
            let priority = priority.unwrap_or(repository::DEFAULT_PRIORITY);
            repository::add_repo(&paths.repo_dir(), &name, &url, priority)?;
            ui::info(format!(
                "repository '{}' added with priority {}",
                name, priority
            ));
            Ok(())
        }

        Commands::SyncRepo => {
            require_root()?;
            let (synced, failed) = repository::sync_repos(&paths.repo_dir())?;
            ui::info(format!("sync complete: {} synced, {} failed", synced, failed));
            Ok(())
        }

        Commands::RemoveRepo { name } => {
            require_root()?;
            repository::remove_repo(&paths.repo_dir(), &name)?;
            ui::success(format!("repository '{}' removed", name));
            Ok(())
        }

        Commands::Audit => {
            require_root()?;
            let conn = db::open(&paths.catalog())?;

            let broken = catalog::get_broken_packages(&conn)?;
            if broken.is_empty() {
                ui::info("No broken packages found.");
                return Ok(());
            }

            if !cli.parse {
                println!("broken packages:");
                for pkg in &broken {
                    println!("  - {}", pkg);
                }
            }

            let fixed = installer::audit(&conn)?;
            if !fixed.is_empty() && !cli.parse {
                println!("Packages now fixed:");
                for pkg in &fixed {
                    println!("  + {}", pkg);
                }
            }
            Ok(())
        }

        Commands::List => {
            let conn = db::open(&paths.catalog())?;
            let rows = catalog::list_packages(&conn)?;

            if cli.parse {
                for p in &rows {
                    println!(
                        "{}|{}|{}|{}",
                        p.name,
                        p.version,
                        p.arch,
                        if p.broken { '1' } else { '0' }
                    );
                }
            } else {
                println!("\nInstalled packages:\n");
                for p in &rows {
                    let mark = if p.broken { "!" } else { "*" };
                    println!("  {} {} {} ({})", mark, p.name, p.version, p.arch);
                }
                println!();
            }
            Ok(())
        }

        Commands::Info { names } => {
            let conn = db::open(&paths.catalog())?;
            let rows = catalog::list_packages(&conn)?;

            let mut failed = false;
            for name in &names {
                let Some(pkg) = rows.iter().find(|p| &p.name == name) else {
                    ui::error(format!("package '{}' is not installed", name));
                    failed = true;
                    continue;
                };
                if cli.parse {
                    println!("{}|{}|{}", pkg.name, pkg.version, pkg.arch);
                } else {
                    println!("\nPackage: {}", pkg.name);
                    println!("  Version: {}", pkg.version);
                    println!("  Arch:    {}", pkg.arch);
                }
            }
            if failed {
                bail!("one or more packages are not installed");
            }
            Ok(())
        }

        Commands::Query { pattern } => {
            let pattern = pattern.to_lowercase();
            let mut any_match = false;

            for (desc, entries) in repository::index::synced_indexes(&paths.repo_dir())? {
                let mut printed_header = false;
                for pkg in &entries {
                    if !pkg.pkgname.to_lowercase().contains(&pattern) {
                        continue;
                    }
                    any_match = true;

                    if cli.parse {
                        println!(
                            "{}|{}|{}|{}|{}",
                            desc.name, pkg.pkgname, pkg.pkgver, pkg.arch, pkg.filename
                        );
                    } else {
                        if !printed_header {
                            println!("Repository: {}", desc.name);
                            printed_header = true;
                        }
                        println!("  {} {} [{}]", pkg.pkgname, pkg.pkgver, pkg.arch);
                        if !pkg.description.is_empty() {
                            println!("      {}", pkg.description);
                        }
                    }
                }
            }

            if !any_match {
                ui::info(format!("no packages matching '{}' found in any repo", pattern));
            }
            Ok(())
        }

        Commands::Count => {
            let conn = db::open(&paths.catalog())?;
            println!("{}", catalog::list_packages(&conn)?.len());
            Ok(())
        }
    }
}
