//! UTS namespace hostname management.

use minibox_common::error::{MiniboxError, Result};

/// Longest hostname the kernel accepts.
const HOST_NAME_MAX: usize = 64;

/// Checks a hostname before it is handed to the kernel.
///
/// # Errors
///
/// Returns `MiniboxError::Config` if the name is empty, longer than 64
/// bytes, or contains characters outside `[A-Za-z0-9.-]`.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    let valid_chars = hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if hostname.is_empty() || hostname.len() > HOST_NAME_MAX || !valid_chars {
        return Err(MiniboxError::Config {
            message: format!("invalid hostname: {hostname:?}"),
        });
    }
    Ok(())
}

/// Sets the hostname inside the current UTS namespace.
///
/// Only call this after a UTS unshare, or the host's name changes.
///
/// # Errors
///
/// Returns an error if the name is invalid or `sethostname(2)` fails.
#[cfg(target_os = "linux")]
pub fn set_hostname(hostname: &str) -> Result<()> {
    validate_hostname(hostname)?;
    nix::unistd::sethostname(hostname).map_err(|e| MiniboxError::Isolation {
        step: "sethostname",
        message: e.to_string(),
    })?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: UTS namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn set_hostname(_hostname: &str) -> Result<()> {
    Err(MiniboxError::Config {
        message: "Linux required for native container operations".into(),
    })
}
