//! The `run` pipeline on the host side.
//!
//! ```text
//! reference -> token -> manifest -> layers (download, extract)* -> init -> exit code
//! ```
//!
//! Every step runs strictly after the previous one succeeded. The scratch
//! directory lives until the init process has exited and is removed on
//! every path out of [`Engine::run`].

use std::path::Path;

use minibox_common::config::MiniboxConfig;
use minibox_common::error::Result;
use minibox_common::types::ImageReference;
use minibox_image::layer::{Extractor, extractor_for};
use minibox_image::pull::LayerMaterializer;
use minibox_image::registry::{Manifest, RegistryApi, RegistryClient};
use minibox_image::storage::ScratchSpace;

use crate::launcher::{LaunchRequest, launch_isolated};
use crate::process::CommandSpec;

/// Pulls an image and runs a command inside it.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: MiniboxConfig,
    verbosity: u8,
}

impl Engine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub const fn new(config: MiniboxConfig) -> Self {
        Self { config, verbosity: 0 }
    }

    /// Log verbosity (`-v` count) passed on to the isolated init process.
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MiniboxConfig {
        &self.config
    }

    /// Runs `command` inside `image` and returns the command's exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is invalid, the image cannot be
    /// pulled, or the init process cannot be started. Failures inside the
    /// isolated process surface as its exit code instead.
    pub fn run(&self, image: &str, command: CommandSpec) -> Result<i32> {
        let reference = ImageReference::parse(image)?;
        let extractor = extractor_for(self.config.extractor)?;
        let scratch = ScratchSpace::create(self.config.scratch_dir.as_deref())?;
        tracing::info!(image = %reference, scratch = %scratch.root().display(), "preparing root filesystem");

        {
            let registry = RegistryClient::new(self.config.registry.clone())?;
            let _ = prepare_rootfs(
                &registry,
                extractor.as_ref(),
                &reference,
                &scratch.layers_dir(),
                &scratch.rootfs(),
                self.config.verify_digests,
            )?;
        }

        let request = LaunchRequest {
            rootfs: scratch.rootfs(),
            hostname: self.config.hostname.clone(),
            command,
            verbosity: self.verbosity,
        };
        let code = launch_isolated(&request)?;
        tracing::info!(code, "container exited");
        drop(scratch);
        Ok(code)
    }
}

/// Authenticates, fetches the manifest, and materializes every layer.
///
/// # Errors
///
/// Returns the first failing step's error. A token failure means no
/// manifest request is made; a manifest failure means no blob is fetched.
pub fn prepare_rootfs(
    registry: &dyn RegistryApi,
    extractor: &dyn Extractor,
    reference: &ImageReference,
    blob_dir: &Path,
    rootfs: &Path,
    verify_digests: bool,
) -> Result<Manifest> {
    let repository = reference.repository();
    let token = registry.obtain_token(&repository)?;
    let manifest = registry.fetch_manifest(&token, &repository, reference.tag())?;

    let _ = LayerMaterializer::new(registry, extractor)
        .verify_digests(verify_digests)
        .pull_and_extract_all(&token, &repository, &manifest, blob_dir, rootfs)?;
    Ok(manifest)
}
