//! SHA-256 content verification.
//!
//! Validates integrity of downloaded layer blobs against the digest the
//! manifest advertised for them.

use std::io::Read;
use std::path::Path;

use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::Digest;
use sha2::{Digest as _, Sha256};

/// Computes the hex-encoded SHA-256 hash of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let io_err = |e| MiniboxError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks that a file matches `expected`.
///
/// Only `sha256` digests are verified; other algorithms pass through.
///
/// # Errors
///
/// Returns `MiniboxError::DigestMismatch` if the hashes differ.
pub fn verify_digest(path: &Path, expected: &Digest) -> Result<()> {
    if expected.algorithm() != "sha256" {
        tracing::debug!(digest = %expected, "skipping verification for non-sha256 digest");
        return Ok(());
    }
    let actual = hash_file(path)?;
    if actual != expected.hex() {
        return Err(MiniboxError::DigestMismatch {
            expected: expected.to_string(),
            actual: format!("sha256:{actual}"),
        });
    }
    tracing::debug!(digest = %expected, "digest verified");
    Ok(())
}
