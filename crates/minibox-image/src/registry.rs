//! Registry protocol client.
//!
//! Resolves an image to a bearer token, then to a schema-2 manifest, then
//! to the raw layer blobs the manifest lists. One HTTP client is built per
//! run from [`RegistryConfig`] and every request shares its timeout.
//! Nothing is retried: the first failure ends the run.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use minibox_common::config::RegistryConfig;
use minibox_common::constants::{
    MANIFEST_LIST_MEDIA_TYPE, MANIFEST_SCHEMA_VERSION, MANIFEST_V2_MEDIA_TYPE, MAX_IMAGE_LAYERS,
    OCI_INDEX_MEDIA_TYPE,
};
use minibox_common::error::{MiniboxError, Result};
use minibox_common::types::Digest;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

/// Raw layer bytes as they arrive from the registry.
pub type BlobStream = Box<dyn Read + Send>;

/// Bearer token scoped to pull access on one repository.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token for use in an `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Body of a token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Reference to a blob inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced blob.
    pub media_type: String,
    /// Size of the blob in bytes.
    pub size: u64,
    /// Content digest of the blob.
    pub digest: Digest,
}

/// Schema-2 image manifest. Layers are ordered base first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest schema version.
    pub schema_version: u32,
    /// Media type of the manifest itself.
    #[serde(default)]
    pub media_type: String,
    /// Image configuration blob.
    pub config: Descriptor,
    /// Filesystem layers, applied in order.
    pub layers: Vec<Descriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHeader {
    #[serde(default)]
    schema_version: u32,
    #[serde(default)]
    media_type: String,
}

impl Manifest {
    /// Decodes and validates a fully buffered manifest body.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Registry` if the body is not a schema-2 image
    /// manifest, is a multi-architecture list, or lists too many layers.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let header: ManifestHeader = serde_json::from_slice(body).map_err(|e| MiniboxError::Registry {
            message: format!("undecodable manifest: {e}"),
        })?;
        if header.media_type == MANIFEST_LIST_MEDIA_TYPE || header.media_type == OCI_INDEX_MEDIA_TYPE {
            return Err(MiniboxError::Registry {
                message: format!("multi-architecture manifests are not supported ({})", header.media_type),
            });
        }
        if header.schema_version != MANIFEST_SCHEMA_VERSION {
            return Err(MiniboxError::Registry {
                message: format!("unsupported manifest schema version {}", header.schema_version),
            });
        }

        let manifest: Self = serde_json::from_slice(body).map_err(|e| MiniboxError::Registry {
            message: format!("undecodable manifest: {e}"),
        })?;
        if manifest.layers.len() > MAX_IMAGE_LAYERS {
            return Err(MiniboxError::Registry {
                message: format!(
                    "manifest lists {} layers, limit is {MAX_IMAGE_LAYERS}",
                    manifest.layers.len()
                ),
            });
        }
        Ok(manifest)
    }

    /// Sum of all layer sizes in bytes.
    #[must_use]
    pub fn total_layer_bytes(&self) -> u64 {
        self.layers.iter().map(|l| l.size).sum()
    }
}

/// The registry operations the pull pipeline depends on.
pub trait RegistryApi {
    /// Obtains a pull-scoped bearer token for `repository`.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Auth` on transport failure, non-2xx status,
    /// or a body without a token.
    fn obtain_token(&self, repository: &str) -> Result<AccessToken>;

    /// Fetches the schema-2 manifest for `repository:tag`.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Registry` on transport failure, non-2xx
    /// status, or an undecodable body.
    fn fetch_manifest(&self, token: &AccessToken, repository: &str, tag: &str) -> Result<Manifest>;

    /// Opens the blob identified by `digest` as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Registry` on transport failure or non-2xx status.
    fn fetch_layer_blob(
        &self,
        token: &AccessToken,
        repository: &str,
        digest: &Digest,
    ) -> Result<BlobStream>;
}

/// Registry client over a blocking HTTP client.
#[derive(Debug)]
pub struct RegistryClient {
    http: reqwest::blocking::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    /// Builds the HTTP client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Config` if the configuration is invalid or the
    /// HTTP client cannot be initialized.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("minibox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MiniboxError::Config {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn token_url(&self) -> String {
        format!("{}/token", self.config.auth_url.trim_end_matches('/'))
    }

    fn manifest_url(&self, repository: &str, tag: &str) -> String {
        format!(
            "{}/v2/{repository}/manifests/{tag}",
            self.config.registry_url.trim_end_matches('/')
        )
    }

    fn blob_url(&self, repository: &str, digest: &Digest) -> String {
        format!(
            "{}/v2/{repository}/blobs/{digest}",
            self.config.registry_url.trim_end_matches('/')
        )
    }

    fn describe(&self, url: &str, err: &reqwest::Error) -> String {
        if err.is_timeout() {
            format!("request to {url} timed out after {}s", self.config.timeout_secs)
        } else {
            format!("request to {url} failed: {err}")
        }
    }
}

impl RegistryApi for RegistryClient {
    fn obtain_token(&self, repository: &str) -> Result<AccessToken> {
        let url = self.token_url();
        let scope = format!("repository:{repository}:pull");
        tracing::debug!(url = %url, scope = %scope, "requesting token");

        let response = self
            .http
            .get(&url)
            .query(&[("service", self.config.service.as_str()), ("scope", scope.as_str())])
            .send()
            .map_err(|e| MiniboxError::Auth {
                message: self.describe(&url, &e),
            })?;
        if !response.status().is_success() {
            return Err(MiniboxError::Auth {
                message: format!("token endpoint returned {}", response.status()),
            });
        }

        let body = response.bytes().map_err(|e| MiniboxError::Auth {
            message: self.describe(&url, &e),
        })?;
        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| MiniboxError::Auth {
            message: format!("malformed token response: {e}"),
        })?;
        let token = parsed
            .token
            .or(parsed.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MiniboxError::Auth {
                message: "token response carries no token".into(),
            })?;

        tracing::info!(repository, "obtained pull token");
        Ok(AccessToken(token))
    }

    fn fetch_manifest(&self, token: &AccessToken, repository: &str, tag: &str) -> Result<Manifest> {
        let url = self.manifest_url(repository, tag);
        tracing::debug!(url = %url, "fetching manifest");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .header(ACCEPT, MANIFEST_V2_MEDIA_TYPE)
            .send()
            .map_err(|e| MiniboxError::Registry {
                message: self.describe(&url, &e),
            })?;
        if !response.status().is_success() {
            return Err(MiniboxError::Registry {
                message: format!("manifest {repository}:{tag} returned {}", response.status()),
            });
        }

        let body = response.bytes().map_err(|e| MiniboxError::Registry {
            message: self.describe(&url, &e),
        })?;
        let manifest = Manifest::from_slice(&body)?;
        tracing::info!(
            repository,
            tag,
            layers = manifest.layers.len(),
            bytes = manifest.total_layer_bytes(),
            "fetched manifest"
        );
        Ok(manifest)
    }

    fn fetch_layer_blob(
        &self,
        token: &AccessToken,
        repository: &str,
        digest: &Digest,
    ) -> Result<BlobStream> {
        let url = self.blob_url(repository, digest);
        tracing::debug!(url = %url, "fetching blob");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token.as_str())
            .send()
            .map_err(|e| MiniboxError::Registry {
                message: self.describe(&url, &e),
            })?;
        if !response.status().is_success() {
            return Err(MiniboxError::Registry {
                message: format!("blob {digest} returned {}", response.status()),
            });
        }
        Ok(Box::new(response))
    }
}
