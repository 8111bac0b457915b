//! Linux namespace management for container isolation.
//!
//! All requested namespaces are created with a single `unshare(2)` call.
//! A PID unshare only affects children created afterwards: the next
//! process spawned becomes PID 1 of the new namespace.

pub mod uts;

use minibox_common::error::{MiniboxError, Result};

/// Which namespaces to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate hostname and domain name.
    pub uts: bool,
    /// Isolate the process ID space.
    pub pid: bool,
    /// Isolate the mount table.
    pub mount: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            mount: true,
        }
    }
}

impl NamespaceConfig {
    /// Returns `true` when no namespace is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.uts || self.pid || self.mount)
    }

    /// Translates the configuration into `unshare(2)` flags.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn clone_flags(&self) -> nix::sched::CloneFlags {
        use nix::sched::CloneFlags;

        let mut flags = CloneFlags::empty();
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        flags
    }
}

/// Moves the calling process into fresh instances of the configured namespaces.
///
/// # Errors
///
/// Returns `MiniboxError::Isolation` if `unshare(2)` fails, typically
/// `EPERM` when the caller lacks `CAP_SYS_ADMIN`.
#[cfg(target_os = "linux")]
pub fn create_namespaces(config: &NamespaceConfig) -> Result<()> {
    if config.is_empty() {
        tracing::debug!("no namespaces requested");
        return Ok(());
    }
    nix::sched::unshare(config.clone_flags()).map_err(|e| MiniboxError::Isolation {
        step: "unshare",
        message: format!("{config:?}: {e}"),
    })?;
    tracing::info!(config = ?config, "namespaces created");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn create_namespaces(_config: &NamespaceConfig) -> Result<()> {
    Err(MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    })
}
