#![warn(missing_docs)]
#![warn(clippy::all)]

//! pkgresearch - package research for Node, Python and Ruby ecosystems
//!
//! This library answers "what is this package and how is it used" for a bare
//! package name. It detects the ecosystem when the caller does not know it,
//! walks a per-ecosystem chain of sources (registry API, repository README,
//! local package-manager tool, project page) and returns a normalized
//! [`ResearchRecord`] with the README's code examples extracted. Successful
//! records are memoized for the session in a [`ResearchCache`].
//!
//! ## Features
//! - Ecosystem probing with a deterministic fallback
//! - Ordered source fallback chains per ecosystem
//! - Fenced code example extraction from READMEs
//! - Session cache with at-most-one fetch per package
//!
//! ## Usage
//! ```rust,no_run
//! use pkgresearch::{EcosystemSelector, ResearchConfig, Researcher};
//!
//! async fn example() -> pkgresearch::Result<()> {
//!     let researcher = Researcher::new(&ResearchConfig::load()?)?;
//!     let record = researcher.research("left-pad", EcosystemSelector::Auto, false).await?;
//!     println!("{} examples", record.examples.len());
//!     Ok(())
//! }
//! ```

/// Session cache of research records
pub mod cache;
/// Configuration loading and environment overrides
pub mod config;
/// Ecosystem identifiers and selectors
pub mod ecosystem;
/// Error handling types and utilities
pub mod error;
/// Code example extraction from README text
pub mod extract;
/// Logging configuration and utilities
pub mod logging;
/// Normalized research records
pub mod model;
/// Ecosystem detection for bare names
pub mod probe;
/// Research orchestration
pub mod research;
/// Per-ecosystem source adapters and fallback chains
pub mod sources;
/// HTTP client, local tool runner and retry helpers
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export common types
pub use cache::{CacheEntry, ResearchCache};
pub use config::ResearchConfig;
pub use ecosystem::{Ecosystem, EcosystemSelector};
pub use error::{ResearchError, Result};
pub use extract::extract_examples;
pub use model::{validate_package_name, PackageIdentity, PackageMetadata, ResearchRecord};
pub use probe::EcosystemProbe;
pub use research::{ResearchRequest, Researcher};
