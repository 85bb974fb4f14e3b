//! Package ecosystems and the `auto` selector that resolves to one of them.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::ResearchError;

/// One of the supported package universes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// npm packages
    Node,
    /// PyPI packages
    Python,
    /// RubyGems packages
    Ruby,
}

impl Ecosystem {
    /// All ecosystems, in probe priority order
    pub const ALL: [Ecosystem; 3] = [Ecosystem::Node, Ecosystem::Python, Ecosystem::Ruby];

    /// Lower-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Node => "node",
            Ecosystem::Python => "python",
            Ecosystem::Ruby => "ruby",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Ecosystem {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "node" | "npm" | "javascript" | "js" | "typescript" | "ts" => Ok(Ecosystem::Node),
            "python" | "pip" | "pypi" | "py" => Ok(Ecosystem::Python),
            "ruby" | "gem" | "rubygems" | "rb" => Ok(Ecosystem::Ruby),
            other => Err(ResearchError::parse(format!("unknown ecosystem {:?}", other))),
        }
    }
}

/// Which ecosystem a request targets before resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EcosystemSelector {
    /// Resolve through the ecosystem probe
    #[default]
    Auto,
    /// Caller-supplied ecosystem; the probe is skipped
    Explicit(Ecosystem),
}

impl From<Ecosystem> for EcosystemSelector {
    fn from(ecosystem: Ecosystem) -> Self {
        EcosystemSelector::Explicit(ecosystem)
    }
}

impl fmt::Display for EcosystemSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcosystemSelector::Auto => f.write_str("auto"),
            EcosystemSelector::Explicit(ecosystem) => ecosystem.fmt(f),
        }
    }
}

impl FromStr for EcosystemSelector {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" | "unknown" => Ok(EcosystemSelector::Auto),
            other => other.parse().map(EcosystemSelector::Explicit),
        }
    }
}
