//! Unified error types for the minibox workspace.
//!
//! The first four variants are the run's failure taxonomy: authentication,
//! registry access, layer pulling, and isolation. Every one of them is
//! terminal for the run.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MiniboxError {
    /// The token endpoint was unreachable, returned a non-2xx status, or
    /// answered with a body that carries no token.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of the failure, including the HTTP status text.
        message: String,
    },

    /// A manifest or blob request failed or its body could not be decoded.
    #[error("registry request failed: {message}")]
    Registry {
        /// Description of the failure, including the HTTP status text.
        message: String,
    },

    /// Persisting or extracting a layer failed.
    #[error("pulling layer {digest} failed: {message}")]
    Pull {
        /// Digest of the layer being pulled.
        digest: String,
        /// Description of the failure.
        message: String,
    },

    /// The extraction capability rejected an archive.
    #[error("extracting {archive} failed: {message}")]
    Extract {
        /// Archive being extracted.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A downloaded blob does not hash to its advertised digest.
    #[error("digest mismatch for {expected}: downloaded content hashes to {actual}")]
    DigestMismatch {
        /// Digest advertised by the manifest.
        expected: String,
        /// Digest computed over the downloaded bytes.
        actual: String,
    },

    /// Root change or namespace unshare failed.
    #[error("{step} failed: {message}")]
    Isolation {
        /// Isolation step that failed.
        step: &'static str,
        /// Underlying cause, commonly a missing privilege.
        message: String,
    },

    /// The isolated init process could not be launched or awaited.
    #[error("failed to launch isolated process: {message}")]
    Launch {
        /// Description of the failure.
        message: String,
    },

    /// An image reference could not be parsed.
    #[error("invalid image reference '{reference}': {reason}")]
    InvalidReference {
        /// The rejected input.
        reference: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MiniboxError>;
