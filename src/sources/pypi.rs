use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use crate::config::ResearchConfig;
use crate::ecosystem::Ecosystem;
use crate::error::{ResearchError, Result};
use crate::model::PackageMetadata;
use crate::sources::common::{self, keywords_field, push_resource, pypi_json_url, pypi_page_url, str_field};
use crate::sources::repository::{RepoLocation, RepositoryReadme};
use crate::sources::{Findings, Source, SourceChain, Stage};
use crate::utils::{HttpClient, ToolRunner};

/// Longest description kept from the project page scrape
pub const SCRAPED_DESCRIPTION_LIMIT: usize = 200;

/// PyPI chain: JSON API, repository README, `pip show`, then the project page
pub fn chain(config: &ResearchConfig, http: HttpClient, tools: Arc<dyn ToolRunner>) -> SourceChain {
    SourceChain::new(
        Ecosystem::Python,
        vec![
            Arc::new(PyPiJson {
                http: http.clone(),
                pypi: config.endpoints.pypi.clone(),
            }),
            Arc::new(RepositoryReadme::new(config, http.clone())),
            Arc::new(PipShow {
                tools,
                program: config.tools.pip.clone(),
            }),
            Arc::new(PyPiPage {
                http,
                pypi_web: config.endpoints.pypi_web.clone(),
            }),
        ],
    )
}

/// `GET /pypi/<name>/json`
pub struct PyPiJson {
    http: HttpClient,
    pypi: String,
}

#[async_trait]
impl Source for PyPiJson {
    fn name(&self) -> &'static str {
        "pypi-json"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let document = self.http.get_json(&pypi_json_url(&self.pypi, package)?).await?;
        normalize_info(package, &document)
    }
}

/// Normalizes the `info` object of a PyPI JSON response
pub fn normalize_info(package: &str, document: &Value) -> Result<Findings> {
    let info = document
        .get("info")
        .filter(|info| info.is_object())
        .ok_or_else(|| ResearchError::parse(format!("PyPI response for {package} has no info object")))?;

    let project_urls: Vec<(String, String)> = info
        .get("project_urls")
        .and_then(Value::as_object)
        .map(|urls| {
            urls.iter()
                .filter_map(|(label, url)| Some((label.clone(), url.as_str().and_then(common::clean)?)))
                .collect()
        })
        .unwrap_or_default();

    let homepage = str_field(info, "home_page").or_else(|| {
        project_urls
            .iter()
            .find(|(label, _)| label.eq_ignore_ascii_case("homepage"))
            .map(|(_, url)| url.clone())
    });
    let repository = repository_url(&project_urls, homepage.as_deref());

    let metadata = PackageMetadata {
        name: str_field(info, "name").unwrap_or_else(|| package.to_string()),
        version: str_field(info, "version"),
        description: str_field(info, "summary"),
        homepage: homepage.clone(),
        repository_url: repository,
        license: license(info),
        author: str_field(info, "author").or_else(|| str_field(info, "author_email")),
        keywords: keywords_field(info, "keywords"),
        types: None,
        downloads: None,
    };

    let mut resources = Vec::new();
    push_resource(&mut resources, "PyPI", str_field(info, "package_url").as_deref());
    push_resource(&mut resources, "Homepage", homepage.as_deref());
    push_resource(&mut resources, "Documentation", str_field(info, "docs_url").as_deref());
    for (label, url) in &project_urls {
        push_resource(&mut resources, label, Some(url));
    }

    Ok(Findings::with_metadata(metadata)
        .readme(str_field(info, "description"))
        .resources(resources))
}

/// Repository from labelled project URLs, else a homepage on a known host
///
/// An exact label such as `Source` or `Repository` wins over a label that only
/// contains one of those words. Issue trackers and conduct pages never count,
/// even when they live on a code host.
fn repository_url(project_urls: &[(String, String)], homepage: Option<&str>) -> Option<String> {
    const EXACT: [&str; 8] = ["source", "source code", "repository", "code", "github", "gitlab", "bitbucket", "repo"];
    const WORDS: [&str; 7] = ["source", "repository", "repo", "code", "github", "gitlab", "bitbucket"];
    const EXCLUDED: [&str; 5] = ["issue", "bug", "conduct", "tracker", "funding"];

    let candidates: Vec<(Vec<String>, &String)> = project_urls
        .iter()
        .map(|(label, url)| {
            let words = label
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            (words, url)
        })
        .filter(|(words, _)| !words.iter().any(|w| EXCLUDED.iter().any(|x| w.starts_with(x))))
        .collect();

    let exact = candidates.iter().find(|(words, _)| EXACT.contains(&words.join(" ").as_str()));
    let partial = || {
        candidates
            .iter()
            .find(|(words, _)| words.iter().any(|w| WORDS.contains(&w.as_str())))
    };
    exact
        .or_else(partial)
        .map(|(_, url)| (*url).clone())
        .or_else(|| {
            homepage
                .filter(|url| RepoLocation::parse(url).is_some())
                .map(str::to_string)
        })
}

/// PEP 639 expression, then the free-text field, then the trove classifier
fn license(info: &Value) -> Option<String> {
    str_field(info, "license_expression")
        .or_else(|| str_field(info, "license").filter(|l| l.lines().count() == 1))
        .or_else(|| {
            info.get("classifiers")?
                .as_array()?
                .iter()
                .filter_map(Value::as_str)
                .find(|c| c.starts_with("License ::"))
                .and_then(|c| c.rsplit("::").next())
                .and_then(common::clean)
        })
}

/// `pip show <name>` from a local Python installation
pub struct PipShow {
    tools: Arc<dyn ToolRunner>,
    program: String,
}

#[async_trait]
impl Source for PipShow {
    fn name(&self) -> &'static str {
        "pip-show"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let output = self.tools.run(&self.program, &["show", "--", package]).await?;
        let metadata = parse_pip_show(package, &output)?;
        let mut resources = Vec::new();
        push_resource(&mut resources, "Homepage", metadata.homepage.as_deref());
        Ok(Findings::with_metadata(metadata).resources(resources))
    }
}

/// Parses `Key: value` lines; keys are matched lower-cased
///
/// The output format belongs to pip and is not guaranteed across versions.
pub fn parse_pip_show(package: &str, output: &str) -> Result<PackageMetadata> {
    let fields: HashMap<String, String> = output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(key, value)| Some((key.trim().to_lowercase(), common::clean(value)?)))
        .collect();

    if !fields.contains_key("name") && !fields.contains_key("version") {
        return Err(ResearchError::parse(format!("pip show output for {package} has no Name or Version")));
    }

    let homepage = fields.get("home-page").cloned();
    Ok(PackageMetadata {
        name: fields.get("name").cloned().unwrap_or_else(|| package.to_string()),
        version: fields.get("version").cloned(),
        description: fields.get("summary").cloned(),
        repository_url: homepage.as_deref().filter(|u| RepoLocation::parse(u).is_some()).map(str::to_string),
        homepage,
        license: fields.get("license").cloned(),
        author: fields.get("author").or_else(|| fields.get("author-email")).cloned(),
        keywords: Vec::new(),
        types: None,
        downloads: None,
    })
}

/// Last resort: scrape the public project page
pub struct PyPiPage {
    http: HttpClient,
    pypi_web: String,
}

#[async_trait]
impl Source for PyPiPage {
    fn name(&self) -> &'static str {
        "pypi-page"
    }

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn attempt(&self, package: &str, _found: &Findings) -> Result<Findings> {
        let url = pypi_page_url(&self.pypi_web, package)?;
        let html = self.http.get_text(&url, None).await?;
        let metadata = parse_project_page(package, &html)?;
        Ok(Findings::with_metadata(metadata).resources(vec![format!("PyPI: {url}")]))
    }
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ResearchError::parse(format!("invalid selector {css}: {e:?}")))
}

/// Pulls version and description out of a project page
///
/// The description is cut to [`SCRAPED_DESCRIPTION_LIMIT`] characters with `...` appended.
pub fn parse_project_page(package: &str, html: &str) -> Result<PackageMetadata> {
    let document = Html::parse_document(html);
    let text_of = |css: &'static str| -> Result<Option<String>> {
        let selector = selector(css)?;
        Ok(document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .and_then(|text| common::clean(&text.split_whitespace().collect::<Vec<_>>().join(" "))))
    };

    let version = text_of("h1.package-header__name")?
        .and_then(|header| header.split_whitespace().last().map(str::to_string))
        .filter(|v| v.chars().next().is_some_and(|c| c.is_ascii_digit()));

    let meta_description = selector("meta[name=\"description\"]")?;
    let description = text_of("p.package-description__summary")?.or_else(|| {
        document
            .select(&meta_description)
            .next()
            .and_then(|el| el.value().attr("content"))
            .and_then(common::clean)
    });

    if version.is_none() && description.is_none() {
        return Err(ResearchError::parse(format!("PyPI page for {package} had nothing recognizable")));
    }

    Ok(PackageMetadata {
        version,
        description: description.map(|d| common::truncate_with_marker(&d, SCRAPED_DESCRIPTION_LIMIT)),
        ..PackageMetadata::named(package)
    })
}
