use serde::{Deserialize, Serialize};

/// Marketplace image coordinates for a bootable base image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

impl ImageReference {
    pub fn new(publisher: &str, offer: &str, sku: &str, version: &str) -> Self {
        Self {
            publisher: publisher.to_string(),
            offer: offer.to_string(),
            sku: sku.to_string(),
            version: version.to_string(),
        }
    }
}

/// The lab-relevant slice of a course record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Catalog identifier
    pub id: String,
    /// Short course code (e.g. "WS2025-ADM")
    pub code: String,
    /// Display title
    pub title: String,
    /// Topic tags used for profile selection
    #[serde(default)]
    pub tags: Vec<String>,
    /// Explicit profile name, overriding tag/title selection
    #[serde(default)]
    pub profile: Option<String>,
    /// Whether launching this course's lab also grants scoped
    /// cloud-portal access via an ephemeral directory identity
    #[serde(default)]
    pub requires_elevated_portal: bool,
}
