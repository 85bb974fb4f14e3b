use std::sync::Arc;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use crate::config::ResearchConfig;
use crate::ecosystem::Ecosystem;
use crate::error::{ResearchError, Result};
use crate::model::PackageMetadata;
use crate::sources::common::{self, keywords_field, npm_downloads_url, npm_registry_url, push_resource, str_field};
use crate::sources::repository::{RepoLocation, RepositoryReadme};
use crate::sources::{Findings, Source, SourceChain, Stage};
use crate::utils::{HttpClient, ToolRunner};

/// Placeholder the registry stores for packages published without a README
const NO_README: &str = "ERROR: No README data found!";

/// npm chain: registry API, repository README, then `npm view`
pub fn chain(config: &ResearchConfig, http: HttpClient, tools: Arc<dyn ToolRunner>) -> SourceChain {
    SourceChain::new(
        Ecosystem::Node,
        vec![
            Arc::new(NpmRegistry {
                http: http.clone(),
                registry: config.endpoints.npm_registry.clone(),
                downloads_api: config.endpoints.npm_downloads.clone(),
            }),
            Arc::new(RepositoryReadme::new(config, http)),
            Arc::new(NpmCli {
                tools,
                program: config.tools.npm.clone(),
            }),
        ],
    )
}

/// Packument lookup against the npm registry
pub struct NpmRegistry {
    http: HttpClient,
    registry: String,
    downloads_api: String,
}

impl NpmRegistry {
    async fn weekly_downloads(&self, package: &str) -> Option<u64> {
        let stats = match npm_downloads_url(&self.downloads_api, package) {
            Ok(url) => self.http.get_json(&url).await,
            Err(e) => Err(e),
        };
        match stats {
            Ok(stats) => stats.get("downloads").and_then(Value::as_u64),
            Err(e) => {
                debug!(package, error = %e, "npm download stats unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl Source for NpmRegistry {
    fn name(&self) -> &'static str {
        "npm-registry"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let document = self.http.get_json(&npm_registry_url(&self.registry, package)?).await?;
        let mut findings = normalize_manifest(package, &document)?;
        if let Some(metadata) = findings.metadata.as_mut() {
            metadata.downloads = self.weekly_downloads(package).await;
        }
        Ok(findings)
    }
}

/// `npm view <name> --json` from a local npm installation
pub struct NpmCli {
    tools: Arc<dyn ToolRunner>,
    program: String,
}

#[async_trait]
impl Source for NpmCli {
    fn name(&self) -> &'static str {
        "npm-cli"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let output = self.tools.run(&self.program, &["view", "--json", "--", package]).await?;
        let parsed: Value = serde_json::from_str(output.trim())?;
        // Several matching versions come back as an array, oldest first.
        let document = match parsed {
            Value::Array(mut versions) => versions
                .pop()
                .ok_or_else(|| ResearchError::NotFound(format!("npm view returned no versions for {package}")))?,
            other => other,
        };
        normalize_manifest(package, &document)
    }
}

/// Normalizes a registry packument or a single version manifest
pub fn normalize_manifest(package: &str, document: &Value) -> Result<Findings> {
    if !document.is_object() {
        return Err(ResearchError::parse(format!("npm metadata for {package} is not an object")));
    }

    let latest = document
        .get("dist-tags")
        .and_then(|tags| str_field(tags, "latest"));
    let manifest = latest
        .as_deref()
        .and_then(|v| document.get("versions").and_then(|all| all.get(v)))
        .unwrap_or(document);
    let field = |key: &str| str_field(manifest, key).or_else(|| str_field(document, key));

    let name = str_field(document, "name").unwrap_or_else(|| package.to_string());
    let repository = repository_url(manifest).or_else(|| repository_url(document));
    let mut keywords = keywords_field(document, "keywords");
    if keywords.is_empty() {
        keywords = keywords_field(manifest, "keywords");
    }

    let metadata = PackageMetadata {
        version: latest.or_else(|| str_field(document, "version")),
        description: field("description"),
        homepage: field("homepage"),
        repository_url: repository.clone(),
        license: license(manifest).or_else(|| license(document)),
        author: author(manifest).or_else(|| author(document)),
        keywords,
        types: field("types").or_else(|| field("typings")),
        downloads: None,
        name,
    };

    let readme = str_field(document, "readme")
        .or_else(|| str_field(manifest, "readme"))
        .filter(|text| text != NO_README);

    let mut resources = Vec::new();
    let page = format!("https://www.npmjs.com/package/{}", metadata.name);
    push_resource(&mut resources, "npm", Some(&page));
    push_resource(&mut resources, "Homepage", metadata.homepage.as_deref());
    push_resource(&mut resources, "Repository", repository.as_deref());
    push_resource(&mut resources, "Issues", bugs_url(manifest).or_else(|| bugs_url(document)).as_deref());

    Ok(Findings::with_metadata(metadata).readme(readme).resources(resources))
}

/// `repository` as a string or `{ "url": ... }`, normalized to a browser URL when the host is known
fn repository_url(value: &Value) -> Option<String> {
    let raw = match value.get("repository")? {
        Value::String(s) => common::clean(s),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).and_then(common::clean),
        _ => None,
    }?;
    Some(RepoLocation::parse(&raw).map(|loc| loc.web_url()).unwrap_or(raw))
}

/// `license` as a string, `{ "type": ... }`, or the legacy `licenses` array
fn license(value: &Value) -> Option<String> {
    match value.get("license") {
        Some(Value::String(s)) => return common::clean(s),
        Some(Value::Object(obj)) => return obj.get("type").and_then(Value::as_str).and_then(common::clean),
        _ => {}
    }
    let types: Vec<String> = value
        .get("licenses")?
        .as_array()?
        .iter()
        .filter_map(|l| l.get("type").and_then(Value::as_str).and_then(common::clean))
        .collect();
    (!types.is_empty()).then(|| types.join(", "))
}

/// `author` as a string or `{ "name", "email" }`
fn author(value: &Value) -> Option<String> {
    match value.get("author")? {
        Value::String(s) => common::clean(s),
        Value::Object(_) => {
            let person = value.get("author")?;
            let name = str_field(person, "name")?;
            Some(match str_field(person, "email") {
                Some(email) => format!("{name} <{email}>"),
                None => name,
            })
        }
        _ => None,
    }
}

fn bugs_url(value: &Value) -> Option<String> {
    match value.get("bugs")? {
        Value::String(s) => common::clean(s),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).and_then(common::clean),
        _ => None,
    }
}
