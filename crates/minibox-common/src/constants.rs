//! System-wide constants and default endpoints.

/// Default token service endpoint (Docker Hub).
pub const DEFAULT_AUTH_URL: &str = "https://auth.docker.io";

/// Default registry API endpoint (Docker Hub).
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.hub.docker.com";

/// Default `service` parameter sent to the token endpoint.
pub const DEFAULT_SERVICE: &str = "registry.docker.io";

/// Ceiling applied to every registry request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Tag used when an image reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace that unqualified image names resolve into.
pub const OFFICIAL_NAMESPACE: &str = "library";

/// Docker image manifest, schema 2.
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker manifest list (multi-architecture).
pub const MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI image index (multi-architecture).
pub const OCI_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";

/// Manifest schema version this client understands.
pub const MANIFEST_SCHEMA_VERSION: u32 = 2;

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Maximum number of layers accepted in a manifest.
pub const MAX_IMAGE_LAYERS: usize = 128;

/// Subdirectory of the scratch space holding downloaded blobs.
pub const LAYERS_DIR: &str = "layers";

/// Subdirectory of the scratch space that becomes the container root.
pub const ROOTFS_DIR: &str = "rootfs";

/// File suffix for downloaded layer blobs.
pub const LAYER_SUFFIX: &str = ".tar.gz";

/// Mode applied to the materialized root directory.
pub const ROOTFS_MODE: u32 = 0o755;

/// Prefix for per-run scratch directories.
pub const SCRATCH_PREFIX: &str = "minibox-";

/// Hidden subcommand the launcher re-executes to enter isolation.
pub const INIT_SUBCOMMAND: &str = "init";

/// Exit code for any setup failure or a command that could not start.
pub const SETUP_FAILURE_EXIT_CODE: i32 = 1;

/// Offset added to a signal number when the command is killed by a signal.
pub const SIGNAL_EXIT_OFFSET: i32 = 128;

/// Application name used in CLI output.
pub const APP_NAME: &str = "minibox";
