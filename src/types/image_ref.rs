// ABOUTME: Opaque container image reference with non-emptiness validation.
// ABOUTME: Derives pull coordinates (name, tag or digest) for the runtime API.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("image reference cannot contain whitespace: {0:?}")]
    Whitespace(String),
}

/// An image reference as the user wrote it (`registry/repo:tag` or digest form).
///
/// The core treats the value as opaque: two references are the same job only
/// if their trimmed text is identical. Whether the reference actually names a
/// pullable image is decided by the registry client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if input.chars().any(char::is_whitespace) {
            return Err(ParseImageRefError::Whitespace(input.to_string()));
        }

        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into the `fromImage` name and the tag or digest to request.
    ///
    /// A reference with neither tag nor digest is pulled as `latest`; asking
    /// the engine for a bare name would fetch every tag of the repository.
    pub fn pull_coordinates(&self) -> (&str, &str) {
        if let Some((name, digest)) = self.0.split_once('@') {
            return (name, digest);
        }

        match self.0.rsplit_once(':') {
            // A colon followed by a path segment is a registry port, not a tag
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => (&self.0, "latest"),
        }
    }

    /// Fully qualified form sent to the runtime (tag defaulted to `latest`).
    pub fn pull_reference(&self) -> String {
        let (name, tag_or_digest) = self.pull_coordinates();
        if self.0.contains('@') {
            format!("{}@{}", name, tag_or_digest)
        } else {
            format!("{}:{}", name, tag_or_digest)
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for ImageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ImageRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
