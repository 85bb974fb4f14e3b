//! Per-ecosystem source adapters.
//!
//! Each ecosystem owns a [`SourceChain`]: an ordered list of [`Source`]
//! strategies (registry API, repository README, local tool, page scrape).
//! A source only runs while the chain still lacks what that source provides,
//! so a rich primary answer short-circuits everything behind it.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::{debug, info};
use crate::config::ResearchConfig;
use crate::ecosystem::Ecosystem;
use crate::error::Result;
use crate::model::{PackageIdentity, PackageMetadata, ResearchRecord};
use crate::utils::{HttpClient, ToolRunner};

/// Shared URL builders and JSON helpers
pub mod common;
/// npm registry and `npm view`
pub mod npm;
/// PyPI JSON API, `pip show` and the project page
pub mod pypi;
/// README lookup on repository hosts
pub mod repository;
/// RubyGems API and `gem info`
pub mod rubygems;

/// What a source contributes to the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Runs only while no metadata has been found
    Metadata,
    /// Runs only while no README has been found
    Readme,
}

/// Partial research result accumulated along a chain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    /// Normalized metadata, once some source produced it
    pub metadata: Option<PackageMetadata>,
    /// README text, once some source produced it
    pub readme: Option<String>,
    /// `"Label: url"` entries
    pub resources: Vec<String>,
    /// Names of the sources that succeeded
    pub sources: Vec<String>,
}

impl Findings {
    /// Findings carrying metadata only
    pub fn with_metadata(metadata: PackageMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Adds a README, ignoring blank text
    pub fn readme(mut self, readme: Option<String>) -> Self {
        self.readme = readme.filter(|r| !r.trim().is_empty());
        self
    }

    /// Adds resources
    pub fn resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// True once any source succeeded
    pub fn succeeded(&self) -> bool {
        !self.sources.is_empty()
    }

    fn wants(&self, stage: Stage) -> bool {
        match stage {
            Stage::Metadata => self.metadata.is_none(),
            Stage::Readme => self.readme.is_none(),
        }
    }

    fn absorb(&mut self, source: &str, part: Findings) {
        if self.metadata.is_none() {
            self.metadata = part.metadata;
        }
        if self.readme.is_none() {
            self.readme = part.readme.filter(|r| !r.trim().is_empty());
        }
        for resource in part.resources {
            if !self.resources.contains(&resource) {
                self.resources.push(resource);
            }
        }
        self.sources.push(source.to_string());
    }

    /// Turns the findings into a record; missing pieces degrade to name-only
    pub fn into_record(self, identity: PackageIdentity) -> ResearchRecord {
        let metadata = self
            .metadata
            .unwrap_or_else(|| PackageMetadata::named(identity.name()));
        ResearchRecord::new(
            identity,
            metadata,
            self.readme.unwrap_or_default(),
            self.resources,
            self.sources,
        )
    }
}

/// One way of learning about a package
#[async_trait]
pub trait Source: Send + Sync {
    /// Short stable name used in logs and `ResearchRecord::sources`
    fn name(&self) -> &'static str;

    /// Which gap this source fills
    fn stage(&self) -> Stage;

    /// Attempts the lookup; `found` is what earlier sources produced
    async fn attempt(&self, package: &str, found: &Findings) -> Result<Findings>;
}

/// Ordered fallback chain for one ecosystem
pub struct SourceChain {
    ecosystem: Ecosystem,
    sources: Vec<Arc<dyn Source>>,
}

impl SourceChain {
    /// Creates a chain that tries `sources` in order
    pub fn new(ecosystem: Ecosystem, sources: Vec<Arc<dyn Source>>) -> Self {
        Self { ecosystem, sources }
    }

    /// Ecosystem this chain researches
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    /// Source names in chain order
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Runs the chain. Never fails: a source error is logged and the next source runs.
    pub async fn research(&self, package: &str) -> Findings {
        let mut found = Findings::default();
        for source in &self.sources {
            if !found.wants(source.stage()) {
                debug!(package, source = source.name(), "skipping source; already satisfied");
                continue;
            }
            match source.attempt(package, &found).await {
                Ok(part) => {
                    debug!(package, source = source.name(), "source succeeded");
                    found.absorb(source.name(), part);
                }
                Err(e) => {
                    info!(package, ecosystem = %self.ecosystem, source = source.name(), error = %e, "source unavailable");
                }
            }
        }
        found
    }
}

/// One chain per ecosystem; lookup is an exhaustive match
pub struct Adapters {
    /// npm chain
    pub node: SourceChain,
    /// PyPI chain
    pub python: SourceChain,
    /// RubyGems chain
    pub ruby: SourceChain,
}

impl Adapters {
    /// Builds the default chains for every ecosystem
    pub fn from_config(config: &ResearchConfig, http: HttpClient, tools: Arc<dyn ToolRunner>) -> Self {
        Self {
            node: npm::chain(config, http.clone(), Arc::clone(&tools)),
            python: pypi::chain(config, http.clone(), Arc::clone(&tools)),
            ruby: rubygems::chain(config, http, tools),
        }
    }

    /// The chain for `ecosystem`
    pub fn for_ecosystem(&self, ecosystem: Ecosystem) -> &SourceChain {
        match ecosystem {
            Ecosystem::Node => &self.node,
            Ecosystem::Python => &self.python,
            Ecosystem::Ruby => &self.ruby,
        }
    }
}
