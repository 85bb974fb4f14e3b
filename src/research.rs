//! Public entry point of the research pipeline.
//!
//! [`Researcher::research`] resolves the ecosystem, consults the cache, runs
//! the ecosystem's source chain and caches anything better than a degraded
//! record. Source failures never surface as errors; only a blank or malformed
//! package name does.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use futures::{stream, FutureExt, StreamExt};
use tracing::{debug, error, info, warn};
use crate::cache::ResearchCache;
use crate::config::ResearchConfig;
use crate::ecosystem::{Ecosystem, EcosystemSelector};
use crate::error::Result;
use crate::model::{validate_package_name, PackageIdentity, ResearchRecord};
use crate::probe::EcosystemProbe;
use crate::sources::Adapters;
use crate::utils::{HttpClient, SystemToolRunner, ToolRunner};

/// One entry of a batch passed to [`Researcher::research_many`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchRequest {
    /// Package name, validated when the request runs
    pub name: String,
    /// Explicit ecosystem or probe resolution
    pub selector: EcosystemSelector,
    /// Skip the cache lookup and fetch again
    pub force_refresh: bool,
}

impl ResearchRequest {
    /// Request with probe resolution and cache use
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selector: EcosystemSelector::Auto,
            force_refresh: false,
        }
    }

    /// Sets the ecosystem, or [`EcosystemSelector::Auto`] to probe
    pub fn ecosystem(mut self, selector: impl Into<EcosystemSelector>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Bypasses the cache when `force_refresh` is true
    pub fn refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Research orchestrator owning the probe, the adapters and a shared cache
pub struct Researcher {
    cache: Arc<ResearchCache>,
    probe: EcosystemProbe,
    adapters: Adapters,
    max_concurrent: usize,
}

impl Researcher {
    /// Builds the production pipeline with a fresh cache
    pub fn new(config: &ResearchConfig) -> Result<Self> {
        Self::with_cache(config, Arc::new(ResearchCache::new()))
    }

    /// Builds the production pipeline around an existing cache
    pub fn with_cache(config: &ResearchConfig, cache: Arc<ResearchCache>) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::new(config)?;
        let tools: Arc<dyn ToolRunner> = Arc::new(SystemToolRunner::new(config.tool_timeout()));
        let probe = EcosystemProbe::from_config(config, http.clone(), Arc::clone(&tools));
        let adapters = Adapters::from_config(config, http, tools);
        Ok(Self::from_parts(cache, probe, adapters, config.max_concurrent_requests))
    }

    /// Assembles a researcher from explicit components
    pub fn from_parts(cache: Arc<ResearchCache>, probe: EcosystemProbe, adapters: Adapters, max_concurrent: usize) -> Self {
        Self {
            cache,
            probe,
            adapters,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Shared cache handle
    pub fn cache(&self) -> &Arc<ResearchCache> {
        &self.cache
    }

    /// Resolves the ecosystem of `name` without researching it
    pub async fn probe(&self, name: &str) -> Result<Ecosystem> {
        let name = validate_package_name(name)?;
        Ok(self.probe.probe(name).await)
    }

    /// Researches one package
    ///
    /// Without `force_refresh` a cached record is returned without touching any
    /// source. A record nothing could be learned about is returned but not cached.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPackageName`](crate::ResearchError::InvalidPackageName) when `name` is blank or
    /// rejected by [`validate_package_name`], before any probe or source runs.
    /// Every other failure (unreachable registries, missing tools, timeouts,
    /// a panicking source) yields `Ok` with a degraded record instead.
    pub async fn research(&self, name: &str, selector: EcosystemSelector, force_refresh: bool) -> Result<ResearchRecord> {
        let name = validate_package_name(name)?;
        let ecosystem = match selector {
            EcosystemSelector::Explicit(ecosystem) => ecosystem,
            EcosystemSelector::Auto => self.probe.probe(name).await,
        };
        let key = PackageIdentity::new(name, ecosystem)?;

        if !force_refresh {
            if let Some(record) = self.cache.get(&key).await {
                debug!(%key, "cache hit");
                return Ok(record);
            }
        }

        let _guard = self.cache.lock_key(&key).await;
        if !force_refresh {
            // Another request may have filled the entry while this one waited.
            if let Some(record) = self.cache.get(&key).await {
                debug!(%key, "cache filled while waiting");
                return Ok(record);
            }
        }

        let record = self.run_chain(&key).await;
        if record.is_degraded() {
            warn!(%key, "no source produced information; returning degraded record");
        } else {
            info!(%key, sources = ?record.sources, examples = record.examples.len(), "researched");
            self.cache.put(key, record.clone()).await;
        }
        Ok(record)
    }

    /// Researches several packages concurrently; results keep input order
    pub async fn research_many(&self, requests: Vec<ResearchRequest>) -> Vec<Result<ResearchRecord>> {
        stream::iter(requests)
            .map(|request| async move {
                self.research(&request.name, request.selector, request.force_refresh)
                    .await
            })
            .buffered(self.max_concurrent)
            .collect()
            .await
    }

    /// Drops the cached record for `name` in `ecosystem`
    pub async fn invalidate(&self, name: &str, ecosystem: Ecosystem) -> Result<bool> {
        let key = PackageIdentity::new(name, ecosystem)?;
        Ok(self.cache.invalidate(&key).await)
    }

    async fn run_chain(&self, key: &PackageIdentity) -> ResearchRecord {
        let chain = self.adapters.for_ecosystem(key.ecosystem());
        match AssertUnwindSafe(chain.research(key.name())).catch_unwind().await {
            Ok(found) => found.into_record(key.clone()),
            Err(panic) => {
                error!(%key, panic = panic_message(panic.as_ref()), "source chain panicked");
                ResearchRecord::degraded(key.clone())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use crate::error::ResearchError;
    use crate::model::PackageMetadata;
    use crate::sources::{Findings, Source, SourceChain, Stage};
    use crate::testing::CountingSource;

    fn found(version: &str) -> Findings {
        Findings::with_metadata(PackageMetadata {
            version: Some(version.into()),
            ..PackageMetadata::named("pkg")
        })
        .readme(Some("```js\nrun()\n```".into()))
    }

    fn adapters(node: Vec<Arc<dyn Source>>, python: Vec<Arc<dyn Source>>, ruby: Vec<Arc<dyn Source>>) -> Adapters {
        Adapters {
            node: SourceChain::new(Ecosystem::Node, node),
            python: SourceChain::new(Ecosystem::Python, python),
            ruby: SourceChain::new(Ecosystem::Ruby, ruby),
        }
    }

    fn researcher(adapters: Adapters) -> Researcher {
        let probe = EcosystemProbe::new(Vec::new(), Duration::from_millis(50));
        Researcher::from_parts(Arc::new(ResearchCache::new()), probe, adapters, 4)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_adapter() {
        let source = CountingSource::ok("primary", Stage::Metadata, found("1.0.0"));
        let researcher = researcher(adapters(vec![source.clone()], vec![], vec![]));

        let first = researcher.research("pkg", Ecosystem::Node.into(), false).await.unwrap();
        let second = researcher.research("pkg", Ecosystem::Node.into(), false).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.examples, vec!["run()"]);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let source = CountingSource::ok("primary", Stage::Metadata, found("1.0.0"));
        let researcher = researcher(adapters(vec![], vec![source.clone()], vec![]));

        researcher.research("pkg", Ecosystem::Python.into(), false).await.unwrap();
        researcher.research("pkg", Ecosystem::Python.into(), true).await.unwrap();

        assert_eq!(source.calls(), 2);
        assert_eq!(researcher.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_degraded_record_is_not_cached() {
        let source = CountingSource::failing("primary", Stage::Metadata);
        let researcher = researcher(adapters(vec![], vec![], vec![source.clone()]));

        let record = researcher.research("nonexistent-pkg-xyz", Ecosystem::Ruby.into(), false).await.unwrap();
        assert!(record.is_degraded());
        assert_eq!(record.metadata, PackageMetadata::named("nonexistent-pkg-xyz"));
        assert!(record.examples.is_empty());
        assert!(researcher.cache().is_empty().await);

        researcher.research("nonexistent-pkg-xyz", Ecosystem::Ruby.into(), false).await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let researcher = researcher(adapters(vec![], vec![], vec![]));
        let result = researcher.research("   ", EcosystemSelector::Auto, false).await;
        assert!(matches!(result, Err(ResearchError::InvalidPackageName(_))));
        assert!(researcher.probe("").await.is_err());
    }

    #[tokio::test]
    async fn test_option_like_name_never_reaches_sources() {
        let source = CountingSource::ok("primary", Stage::Metadata, found("1.0.0"));
        let researcher = researcher(adapters(vec![source.clone()], vec![source.clone()], vec![source.clone()]));

        for name in ["--registry=http://attacker.example", "x?admin=1", "../simple"] {
            let result = researcher.research(name, EcosystemSelector::Auto, false).await;
            assert!(matches!(result, Err(ResearchError::InvalidPackageName(_))), "{name}");
        }
        assert!(researcher.probe("-rf").await.is_err());
        assert_eq!(source.calls(), 0);
        assert!(researcher.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_auto_falls_back_to_node() {
        let node = CountingSource::ok("node", Stage::Metadata, found("1.0.0"));
        let python = CountingSource::ok("python", Stage::Metadata, found("2.0.0"));
        let researcher = researcher(adapters(vec![node.clone()], vec![python.clone()], vec![]));

        let record = researcher.research("pkg", EcosystemSelector::Auto, false).await.unwrap();
        assert_eq!(record.identity.ecosystem(), Ecosystem::Node);
        assert_eq!((node.calls(), python.calls()), (1, 0));
    }

    #[tokio::test]
    async fn test_same_name_different_ecosystem_is_distinct() {
        let node = CountingSource::ok("node", Stage::Metadata, found("1.0.0"));
        let ruby = CountingSource::ok("ruby", Stage::Metadata, found("3.0.0"));
        let researcher = researcher(adapters(vec![node], vec![], vec![ruby]));

        let a = researcher.research("pkg", Ecosystem::Node.into(), false).await.unwrap();
        let b = researcher.research("pkg", Ecosystem::Ruby.into(), false).await.unwrap();
        assert_eq!(a.metadata.version.as_deref(), Some("1.0.0"));
        assert_eq!(b.metadata.version.as_deref(), Some("3.0.0"));
        assert_eq!(researcher.cache().len().await, 2);

        assert!(researcher.invalidate("pkg", Ecosystem::Ruby).await.unwrap());
        assert_eq!(researcher.cache().len().await, 1);
    }

    struct SlowSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Source for SlowSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn stage(&self) -> Stage {
            Stage::Metadata
        }

        async fn attempt(&self, _package: &str, _found: &Findings) -> Result<Findings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(found("1.0.0"))
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_fetch_once() {
        let slow = Arc::new(SlowSource { calls: AtomicUsize::new(0) });
        let researcher = researcher(adapters(vec![slow.clone()], vec![], vec![]));

        let requests = (0..5).map(|_| ResearchRequest::new("pkg").ecosystem(Ecosystem::Node)).collect();
        let results = researcher.research_many(requests).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.as_ref().is_ok_and(|rec| !rec.is_degraded())));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_research_many_keeps_input_order() {
        let node = CountingSource::ok("node", Stage::Metadata, found("1.0.0"));
        let researcher = researcher(adapters(vec![node], vec![], vec![]));

        let results = researcher
            .research_many(vec![
                ResearchRequest::new("b").ecosystem(Ecosystem::Node),
                ResearchRequest::new(" "),
                ResearchRequest::new("a").ecosystem(Ecosystem::Node),
            ])
            .await;

        assert_eq!(results[0].as_ref().unwrap().identity.name(), "b");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().identity.name(), "a");
    }

    struct PanickingSource;

    #[async_trait]
    impl Source for PanickingSource {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn stage(&self) -> Stage {
            Stage::Metadata
        }

        async fn attempt(&self, _package: &str, _found: &Findings) -> Result<Findings> {
            panic!("malformed upstream data")
        }
    }

    #[tokio::test]
    async fn test_panicking_source_degrades() {
        let researcher = researcher(adapters(vec![Arc::new(PanickingSource)], vec![], vec![]));
        let record = researcher.research("pkg", Ecosystem::Node.into(), false).await.unwrap();
        assert!(record.is_degraded());
        assert!(researcher.cache().is_empty().await);
    }
}
