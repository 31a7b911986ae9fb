use std::path::PathBuf;
use thiserror::Error;

/// Invalid run configuration. Always raised before any package is resolved.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported resolution strategy '{0}' (expected 'semver' or 'latest')")]
    UnknownStrategy(String),

    #[error("Unknown dependency group '{0}' (expected all, prod, dev, peer or optional)")]
    UnknownGroup(String),

    #[error("Invalid argument: 'registry' ({0})")]
    InvalidRegistry(#[source] RegistryError),
}

/// Failure while fetching metadata for a single package.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registry URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response from '{url}': {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Status(String),

    #[error("No response received")]
    NoResponse,

    #[error("Registry returned incompatible data")]
    IncompatibleData,

    #[error("Failed to decode registry response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Registry response exceeded {limit} bytes")]
    TooLarge { limit: usize },
}

/// Failure while reading or writing the manifest. Fatal for the whole run.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("File not found: '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse 'package.json': {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Only 'package.json' files are supported (got '{}')", .0.display())]
    Unsupported(PathBuf),

    #[error("The 'package.json' document must be a JSON object")]
    NotAnObject,

    #[error("Group '{group}' is malformed: {reason}")]
    InvalidGroup { group: String, reason: String },

    #[error("A path to the 'package.json' file is required")]
    PathRequired,

    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Custom persistence step failed: {0}")]
    Custom(String),
}

#[derive(Error, Debug)]
pub enum NpduError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

pub type Result<T> = std::result::Result<T, NpduError>;
