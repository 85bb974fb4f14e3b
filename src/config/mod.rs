mod env_manager;

use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use url::Url;
use crate::error::{ResearchError, Result};

pub use env_manager::EnvOverrides;

/// Main configuration struct for the research pipeline
///
/// Every field has a default, so a partial TOML file only needs to name what it
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Base URLs of every remote source
    pub endpoints: Endpoints,
    /// Time budgets for external calls
    pub timeouts: Timeouts,
    /// Local package-manager programs
    pub tools: ToolCommands,
    /// README filenames tried in order against repository hosts
    pub readme_files: Vec<String>,
    /// Extra attempts made for transient HTTP failures
    pub http_retries: u32,
    /// Base delay between HTTP retries, multiplied by the attempt number
    pub retry_delay_ms: u64,
    /// Upper bound on concurrently running requests in `research_many`
    pub max_concurrent_requests: usize,
    /// User-Agent header sent with every HTTP request
    pub user_agent: String,
    /// GitHub token for raw-content requests
    pub github_token: Option<String>,
}

/// Base URLs for registries and repository hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// npm registry metadata API
    pub npm_registry: String,
    /// npm download statistics API
    pub npm_downloads: String,
    /// PyPI JSON API host
    pub pypi: String,
    /// PyPI web pages host, used by the last-resort scrape
    pub pypi_web: String,
    /// RubyGems API host
    pub rubygems: String,
    /// Raw file host for GitHub repositories
    pub github_raw: String,
    /// GitLab host
    pub gitlab: String,
    /// Bitbucket host
    pub bitbucket: String,
}

/// Time budgets, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Per HTTP request
    pub http_secs: u64,
    /// Per local tool invocation
    pub tool_secs: u64,
    /// Per ecosystem existence check
    pub probe_secs: u64,
}

/// Program names for local package managers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommands {
    /// Node package manager
    pub npm: String,
    /// Python package installer
    pub pip: String,
    /// RubyGems client
    pub gem: String,
}

impl ResearchConfig {
    /// Loads configuration from the default config file location and the environment
    ///
    /// A missing config file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let mut config = match dirs::config_dir() {
            Some(dir) => {
                let path = dir.join("pkgresearch").join("config.toml");
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
            None => Self::default(),
        };
        EnvOverrides::from_env().apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ResearchError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| ResearchError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Checks that endpoints are URLs and that no time budget is zero
    pub fn validate(&self) -> Result<()> {
        let endpoints = [
            ("npm_registry", &self.endpoints.npm_registry),
            ("npm_downloads", &self.endpoints.npm_downloads),
            ("pypi", &self.endpoints.pypi),
            ("pypi_web", &self.endpoints.pypi_web),
            ("rubygems", &self.endpoints.rubygems),
            ("github_raw", &self.endpoints.github_raw),
            ("gitlab", &self.endpoints.gitlab),
            ("bitbucket", &self.endpoints.bitbucket),
        ];
        for (field, value) in endpoints {
            Url::parse(value)
                .map_err(|e| ResearchError::Config(format!("endpoints.{field} = {value:?}: {e}")))?;
        }

        if self.timeouts.http_secs == 0 || self.timeouts.tool_secs == 0 || self.timeouts.probe_secs == 0 {
            return Err(ResearchError::Config("timeouts must be at least one second".into()));
        }
        if self.readme_files.is_empty() {
            return Err(ResearchError::Config("readme_files must not be empty".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ResearchError::Config("max_concurrent_requests must be positive".into()));
        }
        Ok(())
    }

    /// Per-request HTTP timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.http_secs)
    }

    /// Per-invocation local tool timeout
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.tool_secs)
    }

    /// Per-check probe timeout
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.probe_secs)
    }

    /// Base delay between HTTP retries
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            timeouts: Timeouts::default(),
            tools: ToolCommands::default(),
            readme_files: [
                "README.md",
                "readme.md",
                "Readme.md",
                "README.markdown",
                "README.rst",
                "README.txt",
                "README",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            http_retries: 2,
            retry_delay_ms: 250,
            max_concurrent_requests: 4,
            user_agent: concat!("pkgresearch/", env!("CARGO_PKG_VERSION")).to_string(),
            github_token: None,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            npm_registry: "https://registry.npmjs.org".into(),
            npm_downloads: "https://api.npmjs.org".into(),
            pypi: "https://pypi.org".into(),
            pypi_web: "https://pypi.org".into(),
            rubygems: "https://rubygems.org".into(),
            github_raw: "https://raw.githubusercontent.com".into(),
            gitlab: "https://gitlab.com".into(),
            bitbucket: "https://bitbucket.org".into(),
        }
    }
}

impl Endpoints {
    /// Points every endpoint at one base URL, as used against a local mock server
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            npm_registry: base.clone(),
            npm_downloads: base.clone(),
            pypi: base.clone(),
            pypi_web: base.clone(),
            rubygems: base.clone(),
            github_raw: base.clone(),
            gitlab: base.clone(),
            bitbucket: base,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            http_secs: 15,
            tool_secs: 20,
            probe_secs: 8,
        }
    }
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            npm: "npm".into(),
            pip: "pip".into(),
            gem: "gem".into(),
        }
    }
}
