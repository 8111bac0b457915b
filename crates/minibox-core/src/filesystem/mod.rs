//! Filesystem isolation for the container process.

pub mod chroot;
