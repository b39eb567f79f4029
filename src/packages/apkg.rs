// src/packages/apkg.rs

//! The `.apkg` archive container
//!
//! An apkg is a tar archive, optionally gzip/xz/zstd-compressed, holding at
//! any depth: the `anemonix.yaml` manifest, a `package/` directory with the
//! payload rooted at the install prefix, and an optional `install.anemonix`
//! hook script.

use crate::error::{Error, Result};
use crate::packages::manifest::Metadata;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;
use xz2::read::XzDecoder;

/// Compression wrapping the tar stream
enum CompressionFormat {
    Gzip,
    Xz,
    Zstd,
    Plain,
}

/// A file or symlink placed into the install root.
#[derive(Debug, Clone)]
pub struct InstalledFile {
    /// Absolute path on the running system (under the install root).
    pub dest: PathBuf,
    /// Path recorded in the catalog, absolute on the target system.
    pub record: String,
}

/// An apkg archive on disk.
pub struct Apkg {
    path: PathBuf,
}

/// The result of extracting an apkg to a temp directory: decoded manifest,
/// optional hook script, and the archive-relative payload prefix.
///
/// The temp directory lives as long as this value.
pub struct ExtractedApkg {
    temp: TempDir,
    pub metadata: Metadata,
    script: Option<PathBuf>,
    payload_prefix: Option<PathBuf>,
}

impl ExtractedApkg {
    /// Hook script inside the extraction, if the archive carries one.
    pub fn script(&self) -> Option<&Path> {
        self.script.as_deref()
    }

    /// Archive-relative path of the `package/` payload directory, if the
    /// archive carries a non-empty payload.
    pub fn payload_prefix(&self) -> Option<&Path> {
        self.payload_prefix.as_deref()
    }

    /// Root of the temp extraction.
    pub fn dir(&self) -> &Path {
        self.temp.path()
    }
}

/// Strip `./` components and reject nothing else; returns `None` for paths
/// that try to escape upward.
fn normalize_entry_path(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::Normal(c) => out.push(c),
            _ => return None,
        }
    }
    Some(out)
}

impl Apkg {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Detect the compression format from magic bytes.
    fn sniff_compression(&self) -> Result<CompressionFormat> {
        let mut file = File::open(&self.path)?;
        let mut magic = [0u8; 6];
        let mut read = 0;
        while read < magic.len() {
            match file.read(&mut magic[read..])? {
                0 => break,
                n => read += n,
            }
        }

        if magic[0..2] == [0x1f, 0x8b] {
            Ok(CompressionFormat::Gzip)
        } else if magic[0..6] == [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00] {
            Ok(CompressionFormat::Xz)
        } else if magic[0..4] == [0x28, 0xb5, 0x2f, 0xfd] {
            Ok(CompressionFormat::Zstd)
        } else {
            Ok(CompressionFormat::Plain)
        }
    }

    /// Open the decompressed tar stream with preservation flags set.
    fn archive(&self) -> Result<Archive<Box<dyn Read>>> {
        let file = File::open(&self.path)?;

        let reader: Box<dyn Read> = match self.sniff_compression()? {
            CompressionFormat::Gzip => Box::new(GzDecoder::new(file)),
            CompressionFormat::Xz => Box::new(XzDecoder::new(file)),
            CompressionFormat::Zstd => Box::new(zstd::Decoder::new(file)?),
            CompressionFormat::Plain => Box::new(file),
        };

        let mut archive = Archive::new(reader);
        archive.set_preserve_permissions(true);
        archive.set_unpack_xattrs(true);
        Ok(archive)
    }

    /// Extract the whole archive to a fresh temp directory and locate the
    /// manifest, hook script, and payload.
    pub fn extract(&self) -> Result<ExtractedApkg> {
        let temp = tempfile::Builder::new().prefix("anemonix-pkg").tempdir()?;
        debug!(
            "Extracting {} to {}",
            self.path.display(),
            temp.path().display()
        );

        self.archive()?.unpack(temp.path())?;

        let mut manifest_path = None;
        let mut script = None;
        let mut payload_dir = None;
        for entry in WalkDir::new(temp.path()).into_iter().filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_file() && name == "anemonix.yaml" && manifest_path.is_none() {
                manifest_path = Some(entry.path().to_path_buf());
            } else if entry.file_type().is_file()
                && name == "install.anemonix"
                && script.is_none()
            {
                script = Some(entry.path().to_path_buf());
            } else if entry.file_type().is_dir() && name == "package" && payload_dir.is_none() {
                payload_dir = Some(entry.path().to_path_buf());
            }
        }

        let manifest_path = manifest_path.ok_or_else(|| {
            Error::Parse(format!(
                "anemonix.yaml not found in '{}'",
                self.path.display()
            ))
        })?;
        let metadata = Metadata::from_file(&manifest_path)?;

        // An empty payload directory counts as no payload.
        let payload_prefix = payload_dir
            .filter(|dir| fs::read_dir(dir).map(|mut d| d.next().is_some()).unwrap_or(false))
            .and_then(|dir| {
                dir.strip_prefix(temp.path())
                    .ok()
                    .map(|rel| rel.to_path_buf())
            });

        Ok(ExtractedApkg {
            temp,
            metadata,
            script,
            payload_prefix,
        })
    }

    /// Stream the payload subtree into the install root, preserving
    /// symlinks, permissions, and extended attributes.
    ///
    /// Every installed regular file or symlink is appended to `installed`
    /// as it lands on disk, so a caller can undo a partial transfer.
    pub fn unpack_payload(
        &self,
        prefix: &Path,
        root: &Path,
        installed: &mut Vec<InstalledFile>,
    ) -> Result<()> {
        let mut archive = self.archive()?;

        for entry in archive.entries()? {
            let mut entry = entry?;

            let raw_path = entry.path()?.to_path_buf();
            let Some(norm) = normalize_entry_path(&raw_path) else {
                return Err(Error::Parse(format!(
                    "archive entry '{}' escapes the extraction root",
                    raw_path.display()
                )));
            };

            let Ok(rel) = norm.strip_prefix(prefix) else {
                continue;
            };
            if rel.as_os_str().is_empty() {
                continue;
            }

            let dest = root.join(rel);
            let entry_type = entry.header().entry_type();

            if entry_type == EntryType::Directory {
                fs::create_dir_all(&dest)?;
                continue;
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            // Replacing a stale symlink or file from a previous version
            if let Ok(meta) = dest.symlink_metadata() {
                if !meta.file_type().is_dir() {
                    fs::remove_file(&dest)?;
                }
            }
            entry.unpack(&dest)?;

            if entry_type == EntryType::Regular
                || entry_type == EntryType::Symlink
                || entry_type == EntryType::Link
            {
                let record = Path::new("/").join(rel).to_string_lossy().into_owned();
                installed.push(InstalledFile { dest, record });
            }
        }

        Ok(())
    }
}
