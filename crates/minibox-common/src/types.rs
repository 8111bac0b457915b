//! Domain primitive types used across the minibox workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TAG, OFFICIAL_NAMESPACE, SHA256_HEX_LENGTH};
use crate::error::{MiniboxError, Result};

/// A parsed `name[:tag]` image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    name: String,
    tag: String,
}

impl ImageReference {
    /// Parses a user-supplied reference of the form `name[:tag]`.
    ///
    /// Only the first `:` separates the name from the tag. A missing tag
    /// becomes `latest`.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::InvalidReference` if the name or an explicit
    /// tag is empty.
    pub fn parse(input: &str) -> Result<Self> {
        let (name, tag) = input.split_once(':').unwrap_or((input, DEFAULT_TAG));
        if name.is_empty() {
            return Err(MiniboxError::InvalidReference {
                reference: input.to_string(),
                reason: "image name is empty",
            });
        }
        if tag.is_empty() {
            return Err(MiniboxError::InvalidReference {
                reference: input.to_string(),
                reason: "tag is empty",
            });
        }
        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Returns the image name as given by the user.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the registry repository path.
    ///
    /// Unqualified names live under the `library/` namespace.
    #[must_use]
    pub fn repository(&self) -> String {
        if self.name.contains('/') {
            self.name.clone()
        } else {
            format!("{OFFICIAL_NAMESPACE}/{}", self.name)
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Content digest of a blob, `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// Parses an `algorithm:hex` digest string.
    ///
    /// # Errors
    ///
    /// Returns `MiniboxError::Config` if the separator is missing, either
    /// half is empty, the hex part is not hexadecimal, or a `sha256` digest
    /// has the wrong length.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || MiniboxError::Config {
            message: format!("invalid digest: {input}"),
        };
        let (algorithm, hex) = input.split_once(':').ok_or_else(invalid)?;
        if algorithm.is_empty() || hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        if algorithm == "sha256" && hex.len() != SHA256_HEX_LENGTH {
            return Err(invalid());
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Returns the hash algorithm, e.g. `sha256`.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Returns the hex-encoded hash without the algorithm prefix.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl TryFrom<String> for Digest {
    type Error = MiniboxError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}
