//! Root filesystem switching via `chroot(2)`.
//!
//! The working directory is moved to the new `/` immediately afterwards so
//! no relative path can still resolve against the old root.

use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Changes the process's root directory to `new_root`.
///
/// # Errors
///
/// Returns `MiniboxError::Isolation` if `new_root` is not a directory or if
/// `chroot(2)` / `chdir(2)` fails (commonly `EPERM` without `CAP_SYS_CHROOT`).
#[cfg(target_os = "linux")]
pub fn change_root(new_root: &Path) -> Result<()> {
    if !new_root.is_dir() {
        return Err(MiniboxError::Isolation {
            step: "chroot",
            message: format!("{} is not a directory", new_root.display()),
        });
    }

    nix::unistd::chroot(new_root).map_err(|e| MiniboxError::Isolation {
        step: "chroot",
        message: format!("{}: {e}", new_root.display()),
    })?;
    nix::unistd::chdir("/").map_err(|e| MiniboxError::Isolation {
        step: "chdir",
        message: format!("/: {e}"),
    })?;

    tracing::info!(new_root = %new_root.display(), "changed root");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: root changes are only supported on Linux.
#[cfg(not(target_os = "linux"))]
pub fn change_root(_new_root: &Path) -> Result<()> {
    Err(MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    })
}
