//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::policies::PolicyKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested policy name matches nothing in the registry.
    #[error("unknown policy '{0}'")]
    UnknownPolicy(String),

    /// A learned policy was requested without a directory to load it from.
    #[error("trainable policy '{0}' requires a model directory")]
    MissingModelDir(PolicyKind),

    /// Weights were offered to a policy that has none to load.
    #[error("policy '{0}' has no learned parameters to load")]
    NotTrainable(PolicyKind),

    #[error("unknown phase '{0}' (expected train, val or test)")]
    UnknownPhase(String),

    #[error("failed to read config {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialized network parameters disagree with the configured shape.
    #[error("bad model weights {path}: {reason}")]
    Weights { path: PathBuf, reason: String },

    /// Could not place agents without overlap within the retry budget.
    #[error("scenario sampling failed: {0}")]
    Scenario(String),

    /// Writing a plot or video artifact failed.
    #[error("failed to write {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
