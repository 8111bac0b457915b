//! Root filesystem assembly.
//!
//! Walks the manifest's layers in order and, for each one, downloads the
//! blob and extracts it before touching the next. Later layers overwrite
//! earlier ones, so the order is never changed and nothing runs in
//! parallel. The first failure aborts; whatever was already extracted
//! stays on disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::Digest;

use crate::layer::Extractor;
use crate::registry::{AccessToken, Manifest, RegistryApi};
use crate::storage::blob_path;

/// A layer that has been downloaded and extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulledLayer {
    /// Digest of the layer blob.
    pub digest: Digest,
    /// Where the blob was stored.
    pub path: PathBuf,
    /// Number of bytes written.
    pub size_bytes: u64,
}

/// Downloads and extracts manifest layers onto a root directory.
pub struct LayerMaterializer<'a> {
    registry: &'a dyn RegistryApi,
    extractor: &'a dyn Extractor,
    verify_digests: bool,
}

impl<'a> LayerMaterializer<'a> {
    /// Creates a materializer over the given registry and extractor.
    #[must_use]
    pub fn new(registry: &'a dyn RegistryApi, extractor: &'a dyn Extractor) -> Self {
        Self {
            registry,
            extractor,
            verify_digests: true,
        }
    }

    /// Enables or disables SHA-256 verification of downloaded blobs.
    #[must_use]
    pub const fn verify_digests(mut self, verify: bool) -> Self {
        self.verify_digests = verify;
        self
    }

    /// Pulls every layer of `manifest` into `destination`, in manifest order.
    ///
    /// Blobs are written to `blob_dir` as `<hex>.tar.gz`.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Pull` for the first layer whose download,
    /// verification, or extraction fails. Later layers are not attempted.
    pub fn pull_and_extract_all(
        &self,
        token: &AccessToken,
        repository: &str,
        manifest: &Manifest,
        blob_dir: &Path,
        destination: &Path,
    ) -> Result<Vec<PulledLayer>> {
        let total = manifest.layers.len();
        let mut pulled = Vec::with_capacity(total);

        for (index, descriptor) in manifest.layers.iter().enumerate() {
            let digest = &descriptor.digest;
            tracing::info!(
                layer = index + 1,
                total,
                digest = %digest,
                size = descriptor.size,
                "pulling layer"
            );

            let layer = self
                .download(token, repository, digest, blob_dir)
                .map_err(|e| pull_error(digest, &e))?;
            self.extractor
                .extract(&layer.path, destination)
                .map_err(|e| pull_error(digest, &e))?;
            pulled.push(layer);
        }

        tracing::info!(layers = pulled.len(), root = %destination.display(), "root filesystem assembled");
        Ok(pulled)
    }

    fn download(
        &self,
        token: &AccessToken,
        repository: &str,
        digest: &Digest,
        blob_dir: &Path,
    ) -> Result<PulledLayer> {
        let path = blob_path(blob_dir, digest);
        let mut blob = self.registry.fetch_layer_blob(token, repository, digest)?;

        let io_err = |e| MiniboxError::Io {
            path: path.clone(),
            source: e,
        };
        let mut writer = BufWriter::new(File::create(&path).map_err(io_err)?);
        let size_bytes = std::io::copy(&mut blob, &mut writer).map_err(io_err)?;
        writer.flush().map_err(io_err)?;
        drop(writer);
        tracing::debug!(digest = %digest, bytes = size_bytes, path = %path.display(), "blob stored");

        if self.verify_digests {
            crate::hash::verify_digest(&path, digest)?;
        }

        Ok(PulledLayer {
            digest: digest.clone(),
            path,
            size_bytes,
        })
    }
}

fn pull_error(digest: &Digest, err: &MiniboxError) -> MiniboxError {
    MiniboxError::Pull {
        digest: digest.to_string(),
        message: err.to_string(),
    }
}
