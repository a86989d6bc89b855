//! Build manifest emitted by the packaging pipeline.

use serde::{Deserialize, Serialize};

/// Cryptographic module linked into the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoModule {
    /// Module name, e.g. the provider library
    pub name: String,
    /// Module version
    #[serde(default)]
    pub version: Option<String>,
    /// Validation certificate number, when the module is validated
    #[serde(default)]
    pub certificate: Option<String>,
}

/// Structured record describing one packaged build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    /// Client version
    pub version: String,
    /// Source commit
    #[serde(default)]
    pub commit: Option<String>,
    /// Target platform triple
    #[serde(default)]
    pub target: Option<String>,
    /// Linked cryptographic modules
    #[serde(default)]
    pub crypto_modules: Vec<CryptoModule>,
    /// Digest of the SBOM document
    #[serde(default)]
    pub sbom_digest: Option<String>,
    /// Digest of the shipped binary
    #[serde(default)]
    pub binary_digest: Option<String>,
    /// Build time as reported by the pipeline
    #[serde(default)]
    pub built_at: Option<String>,
}
