//! Run pipeline for minibox.
//!
//! The parent side ([`engine`], [`launcher`]) prepares the root filesystem
//! and starts a fresh copy of the binary in init mode. The init side
//! ([`init`], [`process`]) isolates itself and runs the user command as
//! PID 1 of the new PID namespace.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod engine;
pub mod init;
pub mod launcher;
pub mod process;
