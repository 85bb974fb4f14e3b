use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;
use crate::config::{Endpoints, ResearchConfig};
use crate::error::{ResearchError, Result};
use crate::sources::{Findings, Source, Stage};
use crate::utils::HttpClient;

/// `git@github.com:owner/repo.git` style remotes
static SCP_REMOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.-]+@([\w.-]+):(.+)$").expect("scp remote pattern is valid"));

/// npm's `owner/repo` GitHub shorthand
static BARE_SHORTHAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w-]+/[\w.-]+$").expect("shorthand pattern is valid"));

/// Repository hosts with a known raw-content layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoHost {
    /// github.com
    GitHub,
    /// gitlab.com
    GitLab,
    /// bitbucket.org
    Bitbucket,
}

impl RepoHost {
    fn from_domain(domain: &str) -> Option<Self> {
        match domain.trim_start_matches("www.").to_lowercase().as_str() {
            "github.com" => Some(RepoHost::GitHub),
            "gitlab.com" => Some(RepoHost::GitLab),
            "bitbucket.org" => Some(RepoHost::Bitbucket),
            _ => None,
        }
    }

    fn domain(&self) -> &'static str {
        match self {
            RepoHost::GitHub => "github.com",
            RepoHost::GitLab => "gitlab.com",
            RepoHost::Bitbucket => "bitbucket.org",
        }
    }
}

/// A repository on a recognized host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    /// Hosting service
    pub host: RepoHost,
    /// User or organization
    pub owner: String,
    /// Repository name without a `.git` suffix
    pub repo: String,
}

impl RepoLocation {
    /// Parses repository URLs the way registries report them
    ///
    /// Handles `git+https://`, `git://`, `ssh://git@`, scp-style remotes,
    /// `github:`/`gitlab:`/`bitbucket:` prefixes, bare `owner/repo`, a trailing
    /// `.git` and deep links into the repository tree.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix("git+").unwrap_or(raw);

        for (prefix, host) in [
            ("github:", RepoHost::GitHub),
            ("gitlab:", RepoHost::GitLab),
            ("bitbucket:", RepoHost::Bitbucket),
        ] {
            if let Some(path) = raw.strip_prefix(prefix) {
                return Self::from_path(host, path);
            }
        }

        if let Some(caps) = SCP_REMOTE.captures(raw) {
            let host = RepoHost::from_domain(&caps[1])?;
            return Self::from_path(host, &caps[2]);
        }

        if raw.contains("://") {
            let url = Url::parse(raw).ok()?;
            let host = RepoHost::from_domain(url.host_str()?)?;
            return Self::from_path(host, url.path());
        }

        if let Some((domain, path)) = raw.split_once('/') {
            if let Some(host) = RepoHost::from_domain(domain) {
                return Self::from_path(host, path);
            }
        }

        if BARE_SHORTHAND.is_match(raw) {
            return Self::from_path(RepoHost::GitHub, raw);
        }
        None
    }

    fn from_path(host: RepoHost, path: &str) -> Option<Self> {
        let path = path.split(['#', '?']).next().unwrap_or_default();
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next()?.to_string();
        let repo = segments.next()?.trim_end_matches(".git").to_string();
        if repo.is_empty() {
            return None;
        }
        Some(Self { host, owner, repo })
    }

    /// Browser URL of the repository
    pub fn web_url(&self) -> String {
        format!("https://{}/{}/{}", self.host.domain(), self.owner, self.repo)
    }

    /// Raw-content URL of `file` on the default branch
    pub fn raw_url(&self, endpoints: &Endpoints, file: &str) -> String {
        match self.host {
            RepoHost::GitHub => format!(
                "{}/{}/{}/HEAD/{}",
                endpoints.github_raw.trim_end_matches('/'),
                self.owner,
                self.repo,
                file
            ),
            RepoHost::GitLab => format!(
                "{}/{}/{}/-/raw/HEAD/{}",
                endpoints.gitlab.trim_end_matches('/'),
                self.owner,
                self.repo,
                file
            ),
            RepoHost::Bitbucket => format!(
                "{}/{}/{}/raw/HEAD/{}",
                endpoints.bitbucket.trim_end_matches('/'),
                self.owner,
                self.repo,
                file
            ),
        }
    }
}

/// Fetches a README from the package's source repository
pub struct RepositoryReadme {
    http: HttpClient,
    endpoints: Endpoints,
    files: Vec<String>,
    github_token: Option<String>,
}

impl RepositoryReadme {
    /// README lookup against the configured raw-content hosts
    pub fn new(config: &ResearchConfig, http: HttpClient) -> Self {
        Self {
            http,
            endpoints: config.endpoints.clone(),
            files: config.readme_files.clone(),
            github_token: config.github_token.clone(),
        }
    }
}

#[async_trait]
impl Source for RepositoryReadme {
    fn name(&self) -> &'static str {
        "repository-readme"
    }

    fn stage(&self) -> Stage {
        Stage::Readme
    }

    async fn attempt(&self, package: &str, found: &Findings) -> Result<Findings> {
        let metadata = found
            .metadata
            .as_ref()
            .ok_or_else(|| ResearchError::NotFound(format!("no metadata for {package} to locate a repository")))?;

        let location = [metadata.repository_url.as_deref(), metadata.homepage.as_deref()]
            .into_iter()
            .flatten()
            .find_map(RepoLocation::parse)
            .ok_or_else(|| ResearchError::NotFound(format!("no recognized repository URL for {package}")))?;

        let token = match location.host {
            RepoHost::GitHub => self.github_token.as_deref(),
            _ => None,
        };

        for file in &self.files {
            let url = location.raw_url(&self.endpoints, file);
            match self.http.get_text(&url, token).await {
                Ok(body) if !body.trim().is_empty() => {
                    return Ok(Findings::default()
                        .readme(Some(body))
                        .resources(vec![format!("README: {url}")]));
                }
                Ok(_) => debug!(%url, "empty README candidate"),
                Err(e) => debug!(%url, error = %e, "README candidate unavailable"),
            }
        }

        Err(ResearchError::NotFound(format!("no README found in {}", location.web_url())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageMetadata;
    use test_case::test_case;

    #[test_case("https://github.com/stevemao/left-pad" ; "plain https")]
    #[test_case("git+https://github.com/stevemao/left-pad.git" ; "npm git plus")]
    #[test_case("git://github.com/stevemao/left-pad.git" ; "git protocol")]
    #[test_case("git@github.com:stevemao/left-pad.git" ; "scp remote")]
    #[test_case("ssh://git@github.com/stevemao/left-pad.git" ; "ssh url")]
    #[test_case("github:stevemao/left-pad" ; "github prefix")]
    #[test_case("stevemao/left-pad" ; "bare shorthand")]
    #[test_case("github.com/stevemao/left-pad" ; "schemeless host")]
    #[test_case("https://github.com/stevemao/left-pad/tree/master/docs#readme" ; "deep link")]
    fn test_parse_github_forms(raw: &str) {
        let location = RepoLocation::parse(raw).unwrap();
        assert_eq!(location.host, RepoHost::GitHub);
        assert_eq!(location.owner, "stevemao");
        assert_eq!(location.repo, "left-pad");
    }

    #[test]
    fn test_parse_other_hosts_and_rejects() {
        let gitlab = RepoLocation::parse("https://gitlab.com/gitlab-org/gitlab-runner").unwrap();
        assert_eq!(gitlab.host, RepoHost::GitLab);
        let bitbucket = RepoLocation::parse("https://bitbucket.org/atlassian/python-bitbucket").unwrap();
        assert_eq!(bitbucket.host, RepoHost::Bitbucket);

        assert_eq!(RepoLocation::parse("https://requests.readthedocs.io"), None);
        assert_eq!(RepoLocation::parse("https://github.com/onlyowner"), None);
        assert_eq!(RepoLocation::parse(""), None);
    }

    #[test]
    fn test_raw_urls() {
        let endpoints = Endpoints::default();
        let gh = RepoLocation::parse("github:psf/requests").unwrap();
        assert_eq!(
            gh.raw_url(&endpoints, "README.md"),
            "https://raw.githubusercontent.com/psf/requests/HEAD/README.md"
        );
        let gl = RepoLocation::parse("gitlab:o/r").unwrap();
        assert_eq!(gl.raw_url(&endpoints, "README.md"), "https://gitlab.com/o/r/-/raw/HEAD/README.md");
        assert_eq!(gl.web_url(), "https://gitlab.com/o/r");
    }

    fn readme_source(server_url: &str) -> RepositoryReadme {
        let mut config = ResearchConfig::default();
        config.endpoints = Endpoints::all_at(server_url);
        config.http_retries = 0;
        config.readme_files = vec!["README.md".into(), "readme.md".into(), "README.rst".into()];
        let http = HttpClient::new(&config).unwrap();
        RepositoryReadme::new(&config, http)
    }

    fn found_with_repo(url: &str) -> Findings {
        Findings::with_metadata(PackageMetadata {
            repository_url: Some(url.into()),
            ..PackageMetadata::named("requests")
        })
    }

    #[tokio::test]
    async fn test_first_resolving_filename_wins() {
        let mut server = mockito::Server::new_async().await;
        let first = server.mock("GET", "/psf/requests/HEAD/README.md").with_status(404).create_async().await;
        let second = server
            .mock("GET", "/psf/requests/HEAD/readme.md")
            .with_status(200)
            .with_body("# Requests\n\n```python\nrequests.get('https://x')\n```")
            .create_async()
            .await;
        let third = server.mock("GET", "/psf/requests/HEAD/README.rst").expect(0).create_async().await;

        let source = readme_source(&server.url());
        let found = source
            .attempt("requests", &found_with_repo("https://github.com/psf/requests"))
            .await
            .unwrap();

        assert!(found.readme.unwrap().starts_with("# Requests"));
        assert_eq!(found.resources.len(), 1);
        assert!(found.resources[0].starts_with("README: "));
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_without_repository_fails_fast() {
        let source = readme_source("http://127.0.0.1:9");
        let no_metadata = source.attempt("x", &Findings::default()).await;
        assert!(matches!(no_metadata, Err(ResearchError::NotFound(_))));

        let unrecognized = source
            .attempt("x", &found_with_repo("https://example.com/x"))
            .await;
        assert!(matches!(unrecognized, Err(ResearchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_no_candidate_resolves() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server.mock("GET", mockito::Matcher::Any).with_status(404).create_async().await;

        let source = readme_source(&server.url());
        let result = source.attempt("requests", &found_with_repo("github:psf/requests")).await;
        assert!(matches!(result, Err(ResearchError::NotFound(_))));
    }
}
