//! Per-run scratch storage for blobs and the materialized root.
//!
//! Layout under one temporary directory:
//!
//! ```text
//! minibox-XXXXXX/
//! ├── layers/<hex>.tar.gz   downloaded blobs
//! └── rootfs/               union of all extracted layers
//! ```
//!
//! The whole tree is removed when the [`ScratchSpace`] is dropped.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use minibox_common::constants::{LAYER_SUFFIX, LAYERS_DIR, ROOTFS_DIR, ROOTFS_MODE, SCRATCH_PREFIX};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::Digest;
use tempfile::TempDir;

/// Scratch directory exclusively owned by the current run.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Creates the scratch tree under `parent`, or the system temp dir.
    ///
    /// The root directory is made world-traversable so unprivileged users
    /// inside the container can resolve `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        let _ = builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(p) => builder.tempdir_in(p),
            None => builder.tempdir(),
        }
        .map_err(|e| MiniboxError::Io {
            path: parent.map_or_else(std::env::temp_dir, Path::to_path_buf),
            source: e,
        })?;

        let space = Self { dir };
        for sub in [space.layers_dir(), space.rootfs()] {
            std::fs::create_dir_all(&sub).map_err(|e| MiniboxError::Io {
                path: sub.clone(),
                source: e,
            })?;
        }
        let rootfs = space.rootfs();
        std::fs::set_permissions(&rootfs, std::fs::Permissions::from_mode(ROOTFS_MODE)).map_err(
            |e| MiniboxError::Io {
                path: rootfs.clone(),
                source: e,
            },
        )?;

        tracing::info!(path = %space.root().display(), "created scratch space");
        Ok(space)
    }

    /// Returns the scratch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the directory holding downloaded blobs.
    #[must_use]
    pub fn layers_dir(&self) -> PathBuf {
        self.root().join(LAYERS_DIR)
    }

    /// Returns the directory that becomes the container root.
    #[must_use]
    pub fn rootfs(&self) -> PathBuf {
        self.root().join(ROOTFS_DIR)
    }

    /// Returns where the blob for `digest` is stored.
    #[must_use]
    pub fn layer_path(&self, digest: &Digest) -> PathBuf {
        blob_path(&self.layers_dir(), digest)
    }
}

/// Names a blob file by its digest with the algorithm prefix stripped.
#[must_use]
pub fn blob_path(dir: &Path, digest: &Digest) -> PathBuf {
    dir.join(format!("{}{LAYER_SUFFIX}", digest.hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn create_lays_out_layers_and_rootfs() {
        let parent = tempfile::tempdir().expect("tempdir");
        let space = ScratchSpace::create(Some(parent.path())).expect("create");
        assert!(space.root().starts_with(parent.path()));
        assert!(space.layers_dir().is_dir());
        assert!(space.rootfs().is_dir());
        assert!(
            space
                .root()
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("minibox-"))
        );
    }

    #[test]
    fn rootfs_is_world_traversable() {
        let parent = tempfile::tempdir().expect("tempdir");
        let space = ScratchSpace::create(Some(parent.path())).expect("create");
        let mode = std::fs::metadata(space.rootfs()).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn layer_path_strips_algorithm_prefix() {
        let parent = tempfile::tempdir().expect("tempdir");
        let space = ScratchSpace::create(Some(parent.path())).expect("create");
        let digest = Digest::parse(DIGEST).expect("digest");
        let path = space.layer_path(&digest);
        assert!(path.starts_with(space.layers_dir()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef.tar.gz")
        );
    }

    #[test]
    fn drop_removes_the_tree() {
        let parent = tempfile::tempdir().expect("tempdir");
        let space = ScratchSpace::create(Some(parent.path())).expect("create");
        let root = space.root().to_path_buf();
        std::fs::write(space.rootfs().join("file"), b"x").expect("write");
        drop(space);
        assert!(!root.exists());
    }

    #[test]
    fn create_in_missing_parent_fails() {
        let parent = tempfile::tempdir().expect("tempdir");
        let missing = parent.path().join("absent");
        assert!(matches!(
            ScratchSpace::create(Some(&missing)),
            Err(MiniboxError::Io { .. })
        ));
    }
}
