use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BpsError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("failed to parse buildpack.toml: {0}")]
    CatalogParse(String),

    #[error("improper constraint {0:?}: {1}")]
    ConstraintSyntax(String, String),

    #[error("invalid semantic version {0:?}: {1}")]
    VersionSyntax(String, String),

    #[error(
        "failed to satisfy {id:?} dependency version constraint {constraint:?}: no compatible versions. Supported versions are: [{}]",
        .supported.join(", ")
    )]
    NoCompatibleVersion {
        id: String,
        constraint: String,
        supported: Vec<String>,
    },

    #[error("failure checking out the bindings: {0}")]
    BindingLookup(String),

    #[error("failed to fetch dependency: {0}")]
    Fetch(String),

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("invalid archive header: {0}")]
    FormatHeader(String),

    #[error("malformed archive: {0}")]
    MalformedContainer(String),

    #[error("failed to create archived directory {0}: {1}")]
    CreateDirectory(String, String),

    #[error("failed to create archived file {0}: {1}")]
    CreateFile(String, String),

    #[error("failed to extract symlink {0}: {1}")]
    Symlink(String, String),

    #[error("refusing to extract unsafe path {0:?}")]
    UnsafePath(String),

    #[error("failed to validate dependency: {0}")]
    Validation(String),

    #[error("checksum does not match: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("failed to calculate checksum: {0}")]
    Checksum(String),
}

impl From<std::io::Error> for BpsError {
    fn from(err: std::io::Error) -> Self {
        BpsError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for BpsError {
    fn from(err: serde_json::Error) -> Self {
        BpsError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, BpsError>;
