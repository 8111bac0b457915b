//! Configuration model for a minibox run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_AUTH_URL, DEFAULT_REGISTRY_URL, DEFAULT_SERVICE, DEFAULT_TIMEOUT_SECS};
use crate::error::{MiniboxError, Result};

/// Root configuration for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniboxConfig {
    /// Registry endpoints and request ceiling.
    pub registry: RegistryConfig,
    /// Which archive extractor materializes layers.
    pub extractor: ExtractorKind,
    /// Whether downloaded blobs are checked against their digest.
    pub verify_digests: bool,
    /// Hostname set inside the fresh UTS namespace.
    pub hostname: Option<String>,
    /// Parent directory for the per-run scratch space (system temp dir when unset).
    pub scratch_dir: Option<PathBuf>,
}

impl Default for MiniboxConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            extractor: ExtractorKind::default(),
            verify_digests: true,
            hostname: None,
            scratch_dir: None,
        }
    }
}

impl MiniboxConfig {
    /// Loads a configuration from a JSON file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MiniboxError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.registry.validate()?;
        Ok(config)
    }
}

/// Registry endpoints and the request ceiling for the HTTP client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the token service.
    pub auth_url: String,
    /// Base URL of the registry API.
    pub registry_url: String,
    /// `service` query parameter for token requests.
    pub service: String,
    /// Timeout applied to every request, in seconds.
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.into(),
            registry_url: DEFAULT_REGISTRY_URL.into(),
            service: DEFAULT_SERVICE.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    /// Checks that both endpoints are HTTP(S) URLs and the timeout is positive.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        for (field, url) in [("auth_url", &self.auth_url), ("registry_url", &self.registry_url)] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(MiniboxError::Config {
                    message: format!("{field} must be an http(s) URL: {url}"),
                });
            }
        }
        if self.timeout_secs == 0 {
            return Err(MiniboxError::Config {
                message: "timeout_secs must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Archive extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// The system `tar` utility.
    #[default]
    Tar,
    /// In-process extraction with whiteout handling.
    Native,
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tar => write!(f, "tar"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(Self::Tar),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown extractor '{other}' (expected 'tar' or 'native')")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_docker_hub() {
        let config = MiniboxConfig::default();
        assert_eq!(config.registry.auth_url, "https://auth.docker.io");
        assert_eq!(config.registry.registry_url, "https://registry.hub.docker.com");
        assert_eq!(config.registry.service, "registry.docker.io");
        assert_eq!(config.registry.timeout_secs, 10);
        assert_eq!(config.extractor, ExtractorKind::Tar);
        assert!(config.verify_digests);
        assert!(config.registry.validate().is_ok());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("minibox.json");
        std::fs::write(
            &path,
            r#"{ "extractor": "native", "registry": { "timeout_secs": 30 } }"#,
        )
        .expect("write");

        let config = MiniboxConfig::load(&path).expect("load");
        assert_eq!(config.extractor, ExtractorKind::Native);
        assert_eq!(config.registry.timeout_secs, 30);
        assert_eq!(config.registry.service, "registry.docker.io");
        assert!(config.verify_digests);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = MiniboxConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MiniboxError::Io { .. }));
    }

    #[test]
    fn load_rejects_non_http_endpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("minibox.json");
        std::fs::write(&path, r#"{ "registry": { "auth_url": "ftp://auth" } }"#).expect("write");
        assert!(matches!(
            MiniboxConfig::load(&path),
            Err(MiniboxError::Config { .. })
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let registry = RegistryConfig {
            timeout_secs: 0,
            ..RegistryConfig::default()
        };
        assert!(registry.validate().is_err());
    }

    #[test]
    fn extractor_kind_parses_case_insensitively() {
        assert_eq!("TAR".parse::<ExtractorKind>(), Ok(ExtractorKind::Tar));
        assert_eq!("native".parse::<ExtractorKind>(), Ok(ExtractorKind::Native));
        assert!("zip".parse::<ExtractorKind>().is_err());
        assert_eq!(ExtractorKind::Native.to_string(), "native");
    }
}
