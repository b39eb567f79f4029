// src/packages/manifest.rs

//! Package manifest (`anemonix.yaml`)

use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Package metadata as declared in `anemonix.yaml`.
///
/// The relationship lists (`deps`, `makedepends`, `conflicts`, `replaces`,
/// `provides`) hold constraint strings of the form `name[op version]` with
/// `op` one of `=`, `<`, `<=`, `>`, `>=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub arch: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(default)]
    pub makedepends: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
}

impl Metadata {
    /// Decode a manifest from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_norway::from_str(content)?)
    }

    /// Decode a manifest file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }
}
