use std::env;
use super::ResearchConfig;

/// Configuration values that can be supplied through environment variables
///
/// Environment values win over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    /// `PKGRESEARCH_NPM_REGISTRY`
    pub npm_registry: Option<String>,
    /// `PKGRESEARCH_PYPI`
    pub pypi: Option<String>,
    /// `PKGRESEARCH_RUBYGEMS`
    pub rubygems: Option<String>,
    /// `PKGRESEARCH_HTTP_TIMEOUT`, in seconds
    pub http_timeout_secs: Option<u64>,
    /// `GITHUB_TOKEN`
    pub github_token: Option<String>,
}

impl EnvOverrides {
    /// Reads the overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the overrides through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            npm_registry: non_empty("PKGRESEARCH_NPM_REGISTRY"),
            pypi: non_empty("PKGRESEARCH_PYPI"),
            rubygems: non_empty("PKGRESEARCH_RUBYGEMS"),
            http_timeout_secs: non_empty("PKGRESEARCH_HTTP_TIMEOUT").and_then(|v| v.parse().ok()),
            github_token: non_empty("GITHUB_TOKEN"),
        }
    }

    /// Writes every present override into `config`
    pub fn apply(&self, config: &mut ResearchConfig) {
        if let Some(url) = &self.npm_registry {
            config.endpoints.npm_registry = url.clone();
        }
        if let Some(url) = &self.pypi {
            config.endpoints.pypi = url.clone();
            config.endpoints.pypi_web = url.clone();
        }
        if let Some(url) = &self.rubygems {
            config.endpoints.rubygems = url.clone();
        }
        if let Some(secs) = self.http_timeout_secs {
            config.timeouts.http_secs = secs;
        }
        if let Some(token) = &self.github_token {
            config.github_token = Some(token.clone());
        }
    }
}
