//! # minibox-core
//!
//! Linux isolation primitives for minibox.
//!
//! This crate provides safe wrappers over:
//! - **Filesystem**: `chroot(2)` into the materialized root.
//! - **Namespaces**: UTS, PID, and mount isolation via `unshare(2)`.
//! - **Bootstrap**: the one-way `Unisolated -> FilesystemIsolated ->
//!   ProcessIsolated` sequence, generic over an [`bootstrap::Isolator`] so the
//!   ordering can be checked without privileges.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bootstrap;
pub mod filesystem;
pub mod namespace;
