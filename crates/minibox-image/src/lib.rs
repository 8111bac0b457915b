//! # minibox-image
//!
//! Turns an image reference into a root filesystem on local disk.
//!
//! Handles:
//! - **Registry**: bearer-token exchange, manifest retrieval, blob download.
//! - **Storage**: the per-run scratch space holding blobs and the root.
//! - **Layers**: the extraction capability (`tar` utility or in-process).
//! - **Hashing**: SHA-256 verification of downloaded blobs.
//! - **Pull**: ordered download-then-extract of every manifest layer.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod hash;
pub mod layer;
pub mod pull;
pub mod registry;
pub mod storage;
