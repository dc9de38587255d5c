use serde::{Deserialize, Serialize};

use crate::ManPage;

/// Serializable man page bundle used for distribution.
///
/// A package groups multiple [`ManPage`] values with version metadata,
/// making it suitable for shipping a whole documentation set as one JSON
/// file (optionally gzip-compressed).
///
/// # Examples
///
/// ```
/// use shell_explain_core::*;
///
/// let mut package = ManPagePackage::new("1.0.0", "2024-01-15T10:30:00Z");
/// package.name = Some("coreutils".into());
/// package.pages.push(ManPage::new("ls", "1"));
/// package.pages.push(ManPage::new("cp", "1"));
///
/// assert_eq!(package.page_count(), 2);
/// assert_eq!(package.version, "1.0.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManPagePackage {
    /// Man page contract version (populated from
    /// [`MANPAGE_CONTRACT_VERSION`](crate::MANPAGE_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_version: Option<String>,
    /// Package format version (semver string).
    pub version: String,
    /// Optional package name.
    pub name: Option<String>,
    /// Optional package description.
    pub description: Option<String>,
    /// ISO-8601 timestamp for package creation.
    pub generated_at: String,
    /// Man pages included in this package.
    pub pages: Vec<ManPage>,
}

impl ManPagePackage {
    /// Creates a package with required fields.
    pub fn new(version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            contract_version: Some(crate::MANPAGE_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            description: None,
            generated_at: generated_at.into(),
            pages: Vec::new(),
        }
    }

    /// Returns the number of pages in this package.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
