//! Normalized research output.
//!
//! A [`ResearchRecord`] is the unit of work product: ecosystem-agnostic
//! metadata, the README text and the code examples extracted from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use crate::ecosystem::Ecosystem;
use crate::error::{ResearchError, Result};
use crate::extract::extract_examples;

/// Trims `name` and rejects anything that is not a plausible package name
///
/// Names are passed to registry URLs and to local tools, so a leading `-`,
/// whitespace, control characters, `?`, `#`, `\` and empty or dot-only `/`
/// segments are refused. Scoped npm names such as `@types/node` pass.
pub fn validate_package_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    let rejected = trimmed.is_empty()
        || trimmed.starts_with('-')
        || trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '?' | '#' | '\\'))
        || trimmed
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if rejected {
        return Err(ResearchError::InvalidPackageName(name.to_string()));
    }
    Ok(trimmed)
}

/// Cache key: a package name within one ecosystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    name: String,
    ecosystem: Ecosystem,
}

impl PackageIdentity {
    /// Creates an identity from a name accepted by [`validate_package_name`]
    pub fn new(name: &str, ecosystem: Ecosystem) -> Result<Self> {
        Ok(Self {
            name: validate_package_name(name)?.to_string(),
            ecosystem,
        })
    }

    /// Package name as requested
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved ecosystem
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ecosystem, self.name)
    }
}

/// Ecosystem-agnostic package metadata
///
/// Fields the source did not report stay `None`; nothing is guessed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    /// Name as published, falling back to the requested name
    pub name: String,
    /// Latest published version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// One-line summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Project homepage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Source repository, normalized to an `https` URL where possible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// License name or SPDX expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Author or maintainer as reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Registry keywords, in published order
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Type declaration entry point (npm `types`/`typings`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    /// Popularity signal reported by the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
}

impl PackageMetadata {
    /// Metadata carrying only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// True when nothing beyond the name is known
    pub fn is_bare(&self) -> bool {
        self.version.is_none()
            && self.description.is_none()
            && self.homepage.is_none()
            && self.repository_url.is_none()
            && self.license.is_none()
            && self.author.is_none()
            && self.keywords.is_empty()
            && self.types.is_none()
            && self.downloads.is_none()
    }
}

/// Normalized research result for one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRecord {
    /// Requested name and resolved ecosystem
    pub identity: PackageIdentity,
    /// Normalized metadata from the first metadata source that answered
    pub metadata: PackageMetadata,
    /// README text, empty when none was found
    pub readme: String,
    /// Code blocks extracted from `readme`, in document order
    pub examples: Vec<String>,
    /// `Label: url` links, deduplicated
    pub additional_resources: Vec<String>,
    /// Chain steps that contributed, in the order they ran
    #[serde(default)]
    pub sources: Vec<String>,
    /// When the record was assembled
    pub fetched_at: DateTime<Utc>,
}

impl ResearchRecord {
    /// Assembles a record; `examples` is always extracted from `readme` here.
    pub fn new(
        identity: PackageIdentity,
        metadata: PackageMetadata,
        readme: String,
        additional_resources: Vec<String>,
        sources: Vec<String>,
    ) -> Self {
        let examples = extract_examples(&readme);
        Self {
            identity,
            metadata,
            readme,
            examples,
            additional_resources,
            sources,
            fetched_at: Utc::now(),
        }
    }

    /// The record returned when every source failed
    pub fn degraded(identity: PackageIdentity) -> Self {
        let metadata = PackageMetadata::named(identity.name());
        Self::new(identity, metadata, String::new(), Vec::new(), Vec::new())
    }

    /// Only the requested name and an empty README: research found nothing
    pub fn is_degraded(&self) -> bool {
        self.metadata.is_bare() && self.readme.is_empty()
    }

    /// Consumer-facing JSON shape used by context-serving endpoints
    pub fn to_context(&self) -> Value {
        let meta = &self.metadata;
        json!({
            "package": {
                "name": meta.name,
                "ecosystem": self.identity.ecosystem(),
                "version": meta.version,
                "description": meta.description,
                "homepage": meta.homepage,
                "repositoryUrl": meta.repository_url,
                "license": meta.license,
                "author": meta.author,
                "keywords": meta.keywords,
                "types": meta.types,
                "downloads": meta.downloads,
            },
            "documentation": {
                "readme": self.readme,
                "examples": self.examples,
                "additionalResources": self.additional_resources,
            },
            "fetchedAt": self.fetched_at,
        })
    }
}
