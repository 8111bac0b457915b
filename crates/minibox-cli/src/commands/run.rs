//! `minibox run`: pull an image and run a command inside it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use minibox_common::config::{ExtractorKind, MiniboxConfig};
use minibox_runtime::engine::Engine;
use minibox_runtime::process::CommandSpec;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Registry base URL.
    #[arg(long, env = "MINIBOX_REGISTRY")]
    pub registry: Option<String>,

    /// Token endpoint base URL.
    #[arg(long, env = "MINIBOX_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Service name sent with token requests.
    #[arg(long, env = "MINIBOX_SERVICE")]
    pub service: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "MINIBOX_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Layer extractor: `tar` (system tar) or `native`.
    #[arg(long, env = "MINIBOX_EXTRACTOR")]
    pub extractor: Option<ExtractorKind>,

    /// Hostname inside the container.
    #[arg(long, env = "MINIBOX_HOSTNAME")]
    pub hostname: Option<String>,

    /// Skip SHA-256 verification of downloaded layers.
    #[arg(long)]
    pub no_verify: bool,

    /// Parent directory for the per-run scratch space.
    #[arg(long, env = "MINIBOX_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Image reference, `name[:tag]`.
    pub image: String,

    /// Command and arguments to run inside the image.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Applies command-line overrides on top of `config`.
    fn apply(&self, mut config: MiniboxConfig) -> MiniboxConfig {
        if let Some(url) = &self.registry {
            config.registry.registry_url.clone_from(url);
        }
        if let Some(url) = &self.auth_url {
            config.registry.auth_url.clone_from(url);
        }
        if let Some(service) = &self.service {
            config.registry.service.clone_from(service);
        }
        if let Some(secs) = self.timeout {
            config.registry.timeout_secs = secs;
        }
        if let Some(kind) = self.extractor {
            config.extractor = kind;
        }
        if self.hostname.is_some() {
            config.hostname.clone_from(&self.hostname);
        }
        if self.no_verify {
            config.verify_digests = false;
        }
        if self.scratch_dir.is_some() {
            config.scratch_dir.clone_from(&self.scratch_dir);
        }
        config
    }
}

/// Executes the `run` command and returns the container's exit code.
///
/// # Errors
///
/// Returns an error if configuration, pulling, or launching fails.
pub fn execute(args: RunArgs, config_path: Option<&Path>, verbosity: u8) -> anyhow::Result<i32> {
    let base = match config_path {
        Some(path) => MiniboxConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MiniboxConfig::default(),
    };
    let config = args.apply(base);
    config.registry.validate()?;

    let Some(command) = CommandSpec::from_argv(&args.command) else {
        anyhow::bail!("no command given");
    };
    tracing::info!(image = %args.image, program = %command.program, "run requested");

    let engine = Engine::new(config).with_verbosity(verbosity);
    let code = engine
        .run(&args.image, command)
        .with_context(|| format!("running {}", args.image))?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            registry: None,
            auth_url: None,
            service: None,
            timeout: None,
            extractor: None,
            hostname: None,
            no_verify: false,
            scratch_dir: None,
            image: "alpine".into(),
            command: vec!["true".into()],
        }
    }

    #[test]
    fn no_flags_keep_config_values() {
        let config = MiniboxConfig {
            hostname: Some("from-file".into()),
            ..MiniboxConfig::default()
        };
        assert_eq!(args().apply(config.clone()), config);
    }

    #[test]
    fn flags_override_config() {
        let overrides = RunArgs {
            registry: Some("http://127.0.0.1:5000".into()),
            timeout: Some(30),
            extractor: Some(ExtractorKind::Native),
            hostname: Some("box".into()),
            no_verify: true,
            ..args()
        };
        let config = overrides.apply(MiniboxConfig::default());
        assert_eq!(config.registry.registry_url, "http://127.0.0.1:5000");
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.extractor, ExtractorKind::Native);
        assert_eq!(config.hostname.as_deref(), Some("box"));
        assert!(!config.verify_digests);
    }

    #[test]
    fn zero_timeout_is_rejected_before_pulling() {
        let overrides = RunArgs {
            timeout: Some(0),
            ..args()
        };
        let err = execute(overrides, None, 0).unwrap_err();
        assert!(format!("{err:#}").contains("timeout"), "{err:#}");
    }

    #[test]
    fn missing_config_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = execute(args(), Some(&dir.path().join("missing.json")), 0).unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"), "{err:#}");
    }
}
