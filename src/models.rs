//! Core data models.
//!
//! Defines the categories, formats, and artifacts that flow between the
//! blob store, the artifact repository, and the template service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root prefix under which every artifact is stored.
pub const ROOT_PREFIX: &str = "examples";

/// Upper bound on artifact size (50 MB).
pub const MAX_ARTIFACT_BYTES: u64 = 50 * 1024 * 1024;

// ═══════════════════════════════════════════════════════════════════════
// Category
// ═══════════════════════════════════════════════════════════════════════

/// A classification bucket for artifacts (`sql`, `definitions`, ...).
///
/// Always a single lowercase path segment, so it can be spliced into a
/// storage path without escaping. Which categories a deployment accepts is
/// decided by configuration (see [`crate::config::StorageConfig::categories`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Categories available out of the box.
    pub const BUILTIN: [&'static str; 4] = ["sql", "definitions", "scripts", "data"];

    /// Parse and validate a category name.
    ///
    /// Accepts `[a-z0-9_-]+` after trimming and lowercasing.
    pub fn new(raw: &str) -> Result<Self, InvalidCategory> {
        let name = raw.trim().to_lowercase();
        let valid = !name.is_empty()
            && name.len() <= 64
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(name))
        } else {
            Err(InvalidCategory(raw.to_string()))
        }
    }

    pub fn sql() -> Self {
        Self("sql".to_string())
    }

    pub fn definitions() -> Self {
        Self("definitions".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote prefix holding this category's artifacts: `examples/<category>/`.
    pub fn prefix(&self) -> String {
        format!("{}/{}/", ROOT_PREFIX, self.0)
    }

    /// The builtin category set.
    pub fn builtin() -> Vec<Category> {
        Self::BUILTIN.iter().map(|c| Self(c.to_string())).collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Category {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Category {
    type Error = InvalidCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

/// Returned when a string is not a usable category segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid category '{0}': expected a single lowercase segment of [a-z0-9_-]")]
pub struct InvalidCategory(pub String);

// ═══════════════════════════════════════════════════════════════════════
// Format
// ═══════════════════════════════════════════════════════════════════════

/// Allow-listed artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Sql,
    Md,
    Txt,
    Json,
    Py,
    Yaml,
    Csv,
    Xml,
}

impl ArtifactFormat {
    /// Accepted file extensions in lookup priority order.
    ///
    /// A bare name is tried as `name.sql`, then `name.md`, and so on.
    pub const EXTENSIONS: [(&'static str, ArtifactFormat); 9] = [
        ("sql", ArtifactFormat::Sql),
        ("md", ArtifactFormat::Md),
        ("txt", ArtifactFormat::Txt),
        ("json", ArtifactFormat::Json),
        ("py", ArtifactFormat::Py),
        ("yaml", ArtifactFormat::Yaml),
        ("yml", ArtifactFormat::Yaml),
        ("csv", ArtifactFormat::Csv),
        ("xml", ArtifactFormat::Xml),
    ];

    /// Every format, one entry each.
    pub const ALL: [ArtifactFormat; 8] = [
        ArtifactFormat::Sql,
        ArtifactFormat::Md,
        ArtifactFormat::Txt,
        ArtifactFormat::Json,
        ArtifactFormat::Py,
        ArtifactFormat::Yaml,
        ArtifactFormat::Csv,
        ArtifactFormat::Xml,
    ];

    /// Look up a format by extension (without the dot, case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, f)| *f)
    }

    /// Split a filename into `(stem, format)` if it has an allowed extension.
    pub fn split_filename(filename: &str) -> Option<(&str, Self)> {
        let (stem, ext) = filename.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::from_extension(ext).map(|f| (stem, f))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Sql => "sql",
            ArtifactFormat::Md => "md",
            ArtifactFormat::Txt => "txt",
            ArtifactFormat::Json => "json",
            ArtifactFormat::Py => "py",
            ArtifactFormat::Yaml => "yaml",
            ArtifactFormat::Csv => "csv",
            ArtifactFormat::Xml => "xml",
        }
    }

    /// MIME type sent to the store on upload.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactFormat::Sql | ArtifactFormat::Txt => "text/plain",
            ArtifactFormat::Md => "text/markdown",
            ArtifactFormat::Json => "application/json",
            ArtifactFormat::Py => "text/x-python",
            ArtifactFormat::Yaml => "text/yaml",
            ArtifactFormat::Csv => "text/csv",
            ArtifactFormat::Xml => "text/xml",
        }
    }

    /// Human-readable kind, used in listings.
    pub fn description(&self) -> &'static str {
        match self {
            ArtifactFormat::Sql => "SQL query template",
            ArtifactFormat::Md => "Documentation",
            ArtifactFormat::Txt => "Text document",
            ArtifactFormat::Json => "JSON data",
            ArtifactFormat::Py => "Python script",
            ArtifactFormat::Yaml => "YAML configuration",
            ArtifactFormat::Csv => "CSV data",
            ArtifactFormat::Xml => "XML data",
        }
    }
}

impl FromStr for ArtifactFormat {
    type Err = String;

    /// Parse a format name or extension (`sql`, `.yml`, `YAML`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ext = s.trim().trim_start_matches('.');
        Self::from_extension(ext).ok_or_else(|| {
            let allowed: Vec<&str> = Self::ALL.iter().map(|f| f.as_str()).collect();
            format!("unknown format '{}' (expected one of: {})", s, allowed.join(", "))
        })
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Artifacts
// ═══════════════════════════════════════════════════════════════════════

/// Build the storage path for a filename within a category.
pub fn artifact_path(category: &Category, filename: &str) -> String {
    format!("{}{}", category.prefix(), filename)
}

/// Listing entry for a stored artifact, without its content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactMeta {
    pub category: Category,
    /// Filename minus extension.
    pub name: String,
    pub filename: String,
    pub path: String,
    pub format: ArtifactFormat,
    pub size_bytes: u64,
    /// Opaque revision token from the store. Audit only.
    pub version: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the content, when the uploader recorded one.
    pub sha256: Option<String>,
}

/// A stored artifact with its full content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub category: Category,
    pub name: String,
    pub filename: String,
    pub path: String,
    pub format: ArtifactFormat,
    /// Raw text exactly as stored.
    pub content: String,
    pub size_bytes: u64,
    /// Store revision token. Always set by writes; set by reads only when a
    /// fresh cached listing vouches for the bytes read.
    pub version: Option<String>,
}
