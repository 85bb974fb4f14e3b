//! Ecosystem detection for bare package names.
//!
//! The probe asks each ecosystem, in a fixed priority order, whether it knows
//! the name. The first one that answers wins. When nobody answers the probe
//! falls back to [`Ecosystem::Node`]; that is a default, not a detection.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info};
use crate::config::ResearchConfig;
use crate::ecosystem::Ecosystem;
use crate::error::{ResearchError, Result};
use crate::sources::common::{npm_registry_url, pypi_json_url, rubygems_json_url};
use crate::utils::{HttpClient, ToolRunner};

/// Ecosystem returned when every check fails
pub const FALLBACK_ECOSYSTEM: Ecosystem = Ecosystem::Node;

/// A cheap "does this ecosystem know the package" query
#[async_trait]
pub trait ExistenceCheck: Send + Sync {
    /// Ecosystem this check answers for
    fn ecosystem(&self) -> Ecosystem;

    /// Succeeds when the package exists in the ecosystem
    async fn exists(&self, package: &str) -> Result<()>;
}

/// Runs existence checks in order, each under its own timeout
pub struct EcosystemProbe {
    checks: Vec<Arc<dyn ExistenceCheck>>,
    timeout: Duration,
}

impl EcosystemProbe {
    /// Creates a probe over explicit checks, tried in the given order
    pub fn new(checks: Vec<Arc<dyn ExistenceCheck>>, timeout: Duration) -> Self {
        Self { checks, timeout }
    }

    /// Default probe: npm registry, then pip/PyPI, then gem/RubyGems
    pub fn from_config(config: &ResearchConfig, http: HttpClient, tools: Arc<dyn ToolRunner>) -> Self {
        let checks: Vec<Arc<dyn ExistenceCheck>> = vec![
            Arc::new(NpmRegistryCheck {
                http: http.clone(),
                registry: config.endpoints.npm_registry.clone(),
            }),
            Arc::new(PipCheck {
                tools: Arc::clone(&tools),
                program: config.tools.pip.clone(),
                http: http.clone(),
                pypi: config.endpoints.pypi.clone(),
            }),
            Arc::new(GemCheck {
                tools,
                program: config.tools.gem.clone(),
                http,
                rubygems: config.endpoints.rubygems.clone(),
            }),
        ];
        Self::new(checks, config.probe_timeout())
    }

    /// Resolves the ecosystem of `package`
    pub async fn probe(&self, package: &str) -> Ecosystem {
        for check in &self.checks {
            let ecosystem = check.ecosystem();
            match timeout(self.timeout, check.exists(package)).await {
                Ok(Ok(())) => {
                    debug!(package, %ecosystem, "probe matched");
                    return ecosystem;
                }
                Ok(Err(e)) => debug!(package, %ecosystem, error = %e, "probe check failed"),
                Err(_) => info!(package, %ecosystem, timeout = ?self.timeout, "probe check timed out"),
            }
        }
        debug!(package, fallback = %FALLBACK_ECOSYSTEM, "no ecosystem matched; using fallback");
        FALLBACK_ECOSYSTEM
    }
}

/// Node: the registry knows the package
struct NpmRegistryCheck {
    http: HttpClient,
    registry: String,
}

#[async_trait]
impl ExistenceCheck for NpmRegistryCheck {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Node
    }

    async fn exists(&self, package: &str) -> Result<()> {
        self.http.exists(&npm_registry_url(&self.registry, package)?).await
    }
}

/// Python: `pip show` locally, else the PyPI JSON API
struct PipCheck {
    tools: Arc<dyn ToolRunner>,
    program: String,
    http: HttpClient,
    pypi: String,
}

#[async_trait]
impl ExistenceCheck for PipCheck {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Python
    }

    async fn exists(&self, package: &str) -> Result<()> {
        match self.tools.run(&self.program, &["show", "--", package]).await {
            Ok(_) => Ok(()),
            Err(e) => {
                debug!(package, error = %e, "pip show failed; asking PyPI");
                self.http.exists(&pypi_json_url(&self.pypi, package)?).await
            }
        }
    }
}

/// Ruby: `gem list -i` locally, else the RubyGems API
struct GemCheck {
    tools: Arc<dyn ToolRunner>,
    program: String,
    http: HttpClient,
    rubygems: String,
}

#[async_trait]
impl ExistenceCheck for GemCheck {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Ruby
    }

    async fn exists(&self, package: &str) -> Result<()> {
        let pattern = format!("^{}$", regex::escape(package));
        let local = match self.tools.run(&self.program, &["list", "-i", "--", &pattern]).await {
            Ok(out) if out.trim() == "true" => Ok(()),
            Ok(out) => Err(ResearchError::NotFound(format!("gem list -i printed {:?}", out.trim()))),
            Err(e) => Err(e),
        };
        match local {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(package, error = %e, "gem not installed locally; asking RubyGems");
                self.http.exists(&rubygems_json_url(&self.rubygems, package)?).await
            }
        }
    }
}
