use std::{collections::BTreeMap, fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// What a builder produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// A container image reference.
    Image,
    /// A set of compiled binaries on disk.
    Binaries,
    /// A single package file or directory.
    Package,
}

/// Content fingerprint in `<algorithm>:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn sha256(hex_digest: impl AsRef<str>) -> Self {
        Self(format!("sha256:{}", hex_digest.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hex digest without the algorithm prefix.
    pub fn digest(&self) -> &str {
        self.0.split_once(':').map(|(_, d)| d).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of exactly one builder invocation.
///
/// Not `Clone`: a registry takes it by value, so it is published at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Image reference, or the directory holding `files`.
    pub location: String,
    /// Files making up the artifact, empty for images.
    pub files: Vec<PathBuf>,
    pub fingerprint: Fingerprint,
    pub size_bytes: u64,
    pub build_duration: Duration,
    pub metadata: BTreeMap<String, String>,
}

impl Artifact {
    /// An artifact that is nothing but an existing image reference.
    pub fn image(reference: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            kind: ArtifactKind::Image,
            location: reference.into(),
            files: Vec::new(),
            fingerprint,
            size_bytes: 0,
            build_duration: Duration::ZERO,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Where a registry published an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub location: String,
    pub digest: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Reference {
    pub fn new(location: impl Into<String>, digest: Fingerprint) -> Self {
        Self {
            location: location.into(),
            digest,
            url: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
