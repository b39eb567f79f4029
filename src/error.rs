// src/error.rs

use thiserror::Error;

/// Core error types for anemonix
#[derive(Error, Debug)]
pub enum Error {
    /// Catalog (SQLite) errors
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest, descriptor, or index decoding failures
    #[error("parse error: {0}")]
    Parse(String),

    /// Repository index or package download failures
    #[error("download error: {0}")]
    Download(String),

    /// Package built for a different architecture
    #[error("arch mismatch: package is '{package}' but host is '{host}'")]
    ArchMismatch { package: String, host: String },

    /// Required dependency is not installed, provided, or staged
    #[error("missing dependency '{0}'")]
    MissingDependency(String),

    /// Installed version does not satisfy a dependency constraint
    #[error("dependency '{requirement}' not satisfied by installed version {installed}")]
    VersionMismatch {
        requirement: String,
        installed: String,
    },

    /// Installed package matches a conflicts entry
    #[error("conflict with installed '{0}'")]
    Conflict(String),

    /// Operation targets a package that is not installed
    #[error("package '{0}' is not installed")]
    NotInstalled(String),

    /// Removal blocked because other packages depend on the target
    #[error("cannot remove '{name}': {} package(s) depend on it", .dependents.len())]
    ReverseDependencyBlocked {
        name: String,
        dependents: Vec<String>,
    },

    /// Lifecycle hook exited nonzero (committed state is preserved)
    #[error("hook '{hook}' exited with code {code}")]
    HookNonZero { hook: String, code: i32 },

    /// Requirement not present in any synced repository index
    #[error("package '{0}' not found in any repo")]
    NotFoundInRepo(String),
}

/// Result type alias using anemonix's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<serde_norway::Error> for Error {
    fn from(e: serde_norway::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
