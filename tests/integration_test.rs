// tests/integration_test.rs

//! Integration tests for anemonix
//!
//! These exercise the full lifecycle across modules: repository descriptors
//! and indexes on disk, dependency resolution, archive install with catalog
//! and filesystem commit, forced installs and the audit loop, and removal
//! with reverse-dependency blocking.

use anemonix::db::{self, catalog};
use anemonix::installer::{self, Installer};
use anemonix::repository;
use anemonix::repository::index::PackageIndex;
use anemonix::resolver::Resolver;
use anemonix::{Error, Paths};
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};
use tempfile::{tempdir, TempDir};

struct System {
    _dir: TempDir,
    paths: Paths,
    conn: Connection,
    store: PathBuf,
}

fn system() -> System {
    let dir = tempdir().unwrap();
    let paths = Paths::under(dir.path());
    fs::create_dir_all(paths.repo_dir()).unwrap();
    let conn = db::open(&paths.catalog()).unwrap();
    let store = dir.path().join("archives");
    fs::create_dir(&store).unwrap();
    System {
        paths,
        conn,
        store,
        _dir: dir,
    }
}

fn build_apkg(dir: &Path, manifest: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let mut builder = Builder::new(Vec::new());

    let mut add = |path: &str, content: &[u8], mode: u32| {
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, path, content).unwrap();
    };

    add("anemonix.yaml", manifest.as_bytes(), 0o644);
    for (path, content) in files {
        add(&format!("package/{}", path), content, 0o644);
    }

    let data = builder.into_inner().unwrap();
    let name: String = manifest
        .lines()
        .find_map(|l| l.strip_prefix("name: "))
        .unwrap()
        .to_string();
    let out = dir.join(format!("{}.apkg", name));
    File::create(&out).unwrap().write_all(&data).unwrap();
    out
}

fn write_index(repo_base: &Path, repo: &str, entries: &[serde_json::Value]) {
    let dir = repo_base.join(repo);
    fs::create_dir_all(&dir).unwrap();
    let index = serde_json::json!({ "packages": entries });
    fs::write(dir.join("repo.json"), index.to_string()).unwrap();
}

fn entry(name: &str, ver: &str) -> serde_json::Value {
    serde_json::json!({
        "pkgname": name,
        "pkgver": ver,
        "arch": "x86_64",
        "filename": format!("{}-{}.apkg", name, ver),
        "description": format!("{} package", name),
    })
}

#[test]
fn fresh_install_of_a_leaf() {
    let mut sys = system();

    repository::add_repo(&sys.paths.repo_dir(), "main", "https://main.example.com", 50).unwrap();
    write_index(&sys.paths.repo_dir(), "main", &[entry("libA", "1.0")]);

    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();
    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA".to_string()])
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].pkgname, "libA");
    assert_eq!(plan[0].pkgver, "1.0");

    // install the resolved package from a local archive
    let archive = build_apkg(
        &sys.store,
        "name: libA\nversion: '1.0'\narch: any\n",
        &[("usr/lib/libA.conf", b"a\n")],
    );
    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&archive)
        .unwrap();

    let rows = catalog::list_packages(&sys.conn).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "libA");
    assert!(!rows[0].broken);
    assert_eq!(
        catalog::get_files(&sys.conn, "libA").unwrap(),
        vec!["/usr/lib/libA.conf"]
    );
}

#[test]
fn version_constraint_prefers_newer() {
    let sys = system();

    repository::add_repo(&sys.paths.repo_dir(), "main", "https://main.example.com", 50).unwrap();
    write_index(
        &sys.paths.repo_dir(),
        "main",
        &[entry("libA", "1.0"), entry("libA", "2.0")],
    );

    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();

    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA>=1.5".to_string()])
        .unwrap();
    assert_eq!(plan[0].pkgver, "2.0");

    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA".to_string()])
        .unwrap();
    assert_eq!(plan[0].pkgver, "2.0");
}

#[test]
fn priority_beats_version() {
    let sys = system();

    repository::add_repo(&sys.paths.repo_dir(), "main", "https://main.example.com", 50).unwrap();
    repository::add_repo(
        &sys.paths.repo_dir(),
        "extra",
        "https://extra.example.com",
        100,
    )
    .unwrap();
    write_index(&sys.paths.repo_dir(), "main", &[entry("libA", "2.0")]);
    write_index(&sys.paths.repo_dir(), "extra", &[entry("libA", "1.0")]);

    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();
    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA".to_string()])
        .unwrap();

    assert_eq!(plan[0].pkgver, "1.0");
    assert_eq!(plan[0].repo_name, "extra");
}

#[test]
fn virtual_provider_and_real_preference() {
    let sys = system();

    repository::add_repo(&sys.paths.repo_dir(), "main", "https://main.example.com", 50).unwrap();
    let alt = serde_json::json!({
        "pkgname": "alt",
        "pkgver": "1.0",
        "arch": "x86_64",
        "filename": "alt-1.0.apkg",
        "provides": ["libA=1.0"],
    });
    write_index(&sys.paths.repo_dir(), "main", &[alt.clone()]);

    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();
    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA".to_string()])
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].pkgname, "alt");

    // a real libA in the same repo wins over the provider
    write_index(&sys.paths.repo_dir(), "main", &[alt, entry("libA", "0.9")]);
    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();
    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["libA".to_string()])
        .unwrap();
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].pkgname, "libA");
    assert_eq!(plan[0].pkgver, "0.9");
}

#[test]
fn force_through_missing_dep_marks_broken_then_audit_clears() {
    let mut sys = system();

    let lib_b = build_apkg(
        &sys.store,
        "name: libB\nversion: '1.0'\narch: any\ndeps:\n  - libA\n",
        &[("usr/lib/libB.conf", b"b\n")],
    );

    // without force the install aborts
    let err = Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&lib_b)
        .unwrap_err();
    assert!(matches!(err, Error::MissingDependency(_)));

    // with force it lands but is marked broken
    Installer::new(&mut sys.conn, sys.paths.clone(), true)
        .install_archive(&lib_b)
        .unwrap();
    assert!(catalog::is_installed(&sys.conn, "libB").unwrap());
    assert_eq!(
        catalog::get_broken_packages(&sys.conn).unwrap(),
        vec!["libB"]
    );

    // installing the dependency and auditing clears the marker
    let lib_a = build_apkg(&sys.store, "name: libA\nversion: '1.0'\narch: any\n", &[]);
    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&lib_a)
        .unwrap();

    let fixed = installer::audit(&sys.conn).unwrap();
    assert_eq!(fixed, vec!["libB"]);
    assert!(catalog::get_broken_packages(&sys.conn).unwrap().is_empty());
}

#[test]
fn remove_blocked_by_reverse_dependency() {
    let mut sys = system();

    let lib_a = build_apkg(
        &sys.store,
        "name: libA\nversion: '1.0'\narch: any\n",
        &[("usr/lib/libA.conf", b"a\n")],
    );
    let lib_b = build_apkg(
        &sys.store,
        "name: libB\nversion: '1.0'\narch: any\ndeps:\n  - libA\n",
        &[("usr/lib/libB.conf", b"b\n")],
    );
    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&lib_a)
        .unwrap();
    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&lib_b)
        .unwrap();

    // blocked without force; catalog and filesystem unchanged
    let err = Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .remove_package("libA")
        .unwrap_err();
    match err {
        Error::ReverseDependencyBlocked { dependents, .. } => {
            assert_eq!(dependents, vec!["libB"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(catalog::is_installed(&sys.conn, "libA").unwrap());
    assert!(sys.paths.root().join("usr/lib/libA.conf").exists());

    // forced removal marks the dependent broken
    Installer::new(&mut sys.conn, sys.paths.clone(), true)
        .remove_package("libA")
        .unwrap();
    assert!(!catalog::is_installed(&sys.conn, "libA").unwrap());
    assert!(!sys.paths.root().join("usr/lib/libA.conf").exists());
    assert_eq!(
        catalog::get_broken_packages(&sys.conn).unwrap(),
        vec!["libB"]
    );
}

#[test]
fn batch_install_with_staged_forward_references() {
    let mut sys = system();

    // libB depends on libA; both queued in one batch, libA first
    let lib_a = build_apkg(&sys.store, "name: libA\nversion: '1.0'\narch: any\n", &[]);
    let lib_b = build_apkg(
        &sys.store,
        "name: libB\nversion: '1.0'\narch: any\ndeps:\n  - libA\n",
        &[],
    );

    let staged: HashSet<String> = ["libA".to_string(), "libB".to_string()].into();
    let mut installer =
        Installer::new(&mut sys.conn, sys.paths.clone(), false).with_staged(staged);
    installer.install_archive(&lib_a).unwrap();
    installer.install_archive(&lib_b).unwrap();

    assert!(catalog::is_installed(&sys.conn, "libA").unwrap());
    assert!(catalog::is_installed(&sys.conn, "libB").unwrap());
    assert!(catalog::get_broken_packages(&sys.conn).unwrap().is_empty());
}

#[test]
fn installed_files_exist_until_removed() {
    let mut sys = system();

    let archive = build_apkg(
        &sys.store,
        "name: app\nversion: '2.1'\narch: any\n",
        &[
            ("usr/bin/app", b"#!/bin/sh\n"),
            ("etc/app/app.conf", b"key=value\n"),
        ],
    );
    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .install_archive(&archive)
        .unwrap();

    let files = catalog::get_files(&sys.conn, "app").unwrap();
    assert_eq!(files.len(), 2);
    for f in &files {
        assert!(
            sys.paths.root().join(f.trim_start_matches('/')).exists(),
            "{} should exist after install",
            f
        );
    }

    Installer::new(&mut sys.conn, sys.paths.clone(), false)
        .remove_package("app")
        .unwrap();
    for f in &files {
        assert!(
            !sys.paths.root().join(f.trim_start_matches('/')).exists(),
            "{} should be gone after remove",
            f
        );
    }
}

#[test]
fn resolver_plan_satisfies_dependency_order() {
    let sys = system();

    repository::add_repo(&sys.paths.repo_dir(), "main", "https://main.example.com", 50).unwrap();
    let app = serde_json::json!({
        "pkgname": "app",
        "pkgver": "1.0",
        "arch": "x86_64",
        "filename": "app-1.0.apkg",
        "depends": ["libB", "libC"],
    });
    let lib_b = serde_json::json!({
        "pkgname": "libB",
        "pkgver": "1.0",
        "arch": "x86_64",
        "filename": "libB-1.0.apkg",
        "depends": ["libC"],
    });
    write_index(
        &sys.paths.repo_dir(),
        "main",
        &[app, lib_b, entry("libC", "1.0")],
    );

    let index = PackageIndex::load(&sys.paths.repo_dir()).unwrap();
    let plan = Resolver::new(&sys.conn, &index)
        .resolve(&["app".to_string()])
        .unwrap();

    let names: Vec<&str> = plan.iter().map(|p| p.pkgname.as_str()).collect();
    let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
    assert!(pos("libC") < pos("libB"));
    assert!(pos("libB") < pos("app"));
}

#[test]
fn repo_lifecycle_on_disk() {
    let sys = system();
    let repo_dir = sys.paths.repo_dir();

    repository::add_repo(&repo_dir, "main", "https://main.example.com", 50).unwrap();
    assert!(repo_dir.join("main.json").exists());

    // duplicate rejected
    assert!(repository::add_repo(&repo_dir, "main", "https://other.example.com", 10).is_err());

    write_index(&repo_dir, "main", &[entry("libA", "1.0")]);
    repository::remove_repo(&repo_dir, "main").unwrap();
    assert!(!repo_dir.join("main.json").exists());
    assert!(!repo_dir.join("main").exists());
}
