use std::sync::Arc;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use crate::config::ResearchConfig;
use crate::ecosystem::Ecosystem;
use crate::error::{ResearchError, Result};
use crate::model::PackageMetadata;
use crate::sources::common::{self, push_resource, rubygems_json_url, str_field};
use crate::sources::repository::{RepoLocation, RepositoryReadme};
use crate::sources::{Findings, Source, SourceChain, Stage};
use crate::utils::{HttpClient, ToolRunner};

/// `rack (3.0.8)` header line printed by `gem info`
static GEM_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(\S+)\s+\(([^)\s,]+)").expect("gem header pattern is valid"));

/// RubyGems chain: JSON API, repository README, then `gem info`
pub fn chain(config: &ResearchConfig, http: HttpClient, tools: Arc<dyn ToolRunner>) -> SourceChain {
    SourceChain::new(
        Ecosystem::Ruby,
        vec![
            Arc::new(RubyGemsJson {
                http: http.clone(),
                rubygems: config.endpoints.rubygems.clone(),
            }),
            Arc::new(RepositoryReadme::new(config, http)),
            Arc::new(GemInfo {
                tools,
                program: config.tools.gem.clone(),
            }),
        ],
    )
}

/// `GET /api/v1/gems/<name>.json`
pub struct RubyGemsJson {
    http: HttpClient,
    rubygems: String,
}

#[async_trait]
impl Source for RubyGemsJson {
    fn name(&self) -> &'static str {
        "rubygems-json"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let document = self.http.get_json(&rubygems_json_url(&self.rubygems, package)?).await?;
        normalize_gem(package, &document)
    }
}

/// Normalizes a RubyGems gem document
pub fn normalize_gem(package: &str, document: &Value) -> Result<Findings> {
    if !document.is_object() {
        return Err(ResearchError::parse(format!("RubyGems response for {package} is not an object")));
    }

    let homepage = str_field(document, "homepage_uri");
    let repository = str_field(document, "source_code_uri")
        .or_else(|| homepage.clone().filter(|url| RepoLocation::parse(url).is_some()));

    let licenses: Vec<String> = document
        .get("licenses")
        .and_then(Value::as_array)
        .map(|all| all.iter().filter_map(Value::as_str).filter_map(common::clean).collect())
        .unwrap_or_default();

    let metadata = PackageMetadata {
        name: str_field(document, "name").unwrap_or_else(|| package.to_string()),
        version: str_field(document, "version"),
        description: str_field(document, "info"),
        homepage: homepage.clone(),
        repository_url: repository.clone(),
        license: (!licenses.is_empty()).then(|| licenses.join(", ")),
        author: str_field(document, "authors"),
        keywords: Vec::new(),
        types: None,
        downloads: document.get("downloads").and_then(Value::as_u64),
    };

    let mut resources = Vec::new();
    push_resource(&mut resources, "RubyGems", str_field(document, "project_uri").as_deref());
    push_resource(&mut resources, "Homepage", homepage.as_deref());
    push_resource(&mut resources, "Source", repository.as_deref());
    push_resource(&mut resources, "Documentation", str_field(document, "documentation_uri").as_deref());
    push_resource(&mut resources, "Changelog", str_field(document, "changelog_uri").as_deref());
    push_resource(&mut resources, "Issues", str_field(document, "bug_tracker_uri").as_deref());

    Ok(Findings::with_metadata(metadata).resources(resources))
}

/// `gem info <name> --remote --exact` from a local Ruby installation
pub struct GemInfo {
    tools: Arc<dyn ToolRunner>,
    program: String,
}

#[async_trait]
impl Source for GemInfo {
    fn name(&self) -> &'static str {
        "gem-info"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let output = self
            .tools
            .run(&self.program, &["info", "--remote", "--exact", "--", package])
            .await?;
        let metadata = parse_gem_info(package, &output)?;
        let mut resources = Vec::new();
        push_resource(&mut resources, "Homepage", metadata.homepage.as_deref());
        Ok(Findings::with_metadata(metadata).resources(resources))
    }
}

/// Best-effort parse of `gem info` text output
///
/// The layout belongs to RubyGems and changes between releases; only the
/// `name (version)` header and `Key: value` lines are read. A labelled
/// `Version:` line wins over the header.
pub fn parse_gem_info(package: &str, output: &str) -> Result<PackageMetadata> {
    let version = gem_field(output, &["Version"]).or_else(|| {
        GEM_HEADER
            .captures_iter(output)
            .find(|caps| caps[1].eq_ignore_ascii_case(package))
            .map(|caps| caps[2].to_string())
    });

    let homepage = gem_field(output, &["Homepage"]);
    // Summary is printed indented on the line after the header when unlabelled.
    let description = gem_field(output, &["Summary"]).or_else(|| {
        let mut lines = output.lines().skip_while(|l| !GEM_HEADER.is_match(l)).skip(1);
        lines
            .find(|l| !l.trim().is_empty() && !l.contains(':'))
            .and_then(common::clean)
    });

    if version.is_none() && description.is_none() {
        return Err(ResearchError::parse(format!("gem info output for {package} had nothing recognizable")));
    }

    Ok(PackageMetadata {
        version,
        description,
        repository_url: homepage.as_deref().filter(|u| RepoLocation::parse(u).is_some()).map(str::to_string),
        homepage,
        license: gem_field(output, &["License", "Licenses"]),
        author: gem_field(output, &["Author", "Authors"]),
        ..PackageMetadata::named(package)
    })
}

fn gem_field(output: &str, keys: &[&str]) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        keys.iter()
            .any(|k| key.trim().eq_ignore_ascii_case(k))
            .then(|| common::clean(value))
            .flatten()
    })
}
