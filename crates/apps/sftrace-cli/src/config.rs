use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV: &str = "SF_TRACE_CONFIG";
pub const DEFAULT_ACCESS_TOKEN_ENV: &str = "SF_ACCESS_TOKEN";
pub const DEFAULT_API_VERSION: &str = "60.0";

/// Connection settings for one org, keyed by alias in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgProfile {
    pub instance_url: String,
    pub username: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_env: Option<String>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl OrgProfile {
    /// The bearer token: inline value first, then the named environment variable.
    pub fn access_token(&self) -> Result<String> {
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.trim().to_string());
        }
        let var = self
            .access_token_env
            .as_deref()
            .unwrap_or(DEFAULT_ACCESS_TOKEN_ENV);
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(anyhow!(
                "no access token for {}: set access_token in the config or export {var}",
                self.username
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_org: Option<String>,
    #[serde(default)]
    pub orgs: BTreeMap<String, OrgProfile>,
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Load the config file, or an empty config when none exists yet.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            log::debug!("no config at {}", path.display());
            return Ok(Self::default());
        }
        Self::from_path(&path)
    }

    /// Pick the org named on the command line, else the configured default.
    pub fn select_org<'a>(&'a self, requested: Option<&'a str>) -> Result<(&'a str, &'a OrgProfile)> {
        let alias = requested
            .filter(|alias| !alias.is_empty())
            .or(self.default_org.as_deref())
            .ok_or_else(|| {
                anyhow!("No default environment found. Use -o or --target-org to specify an environment.")
            })?;
        let profile = self
            .orgs
            .get(alias)
            .ok_or_else(|| anyhow!("No org configuration found for alias \"{alias}\""))?;
        Ok((alias, profile))
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let base = dirs::config_dir().ok_or_else(|| anyhow!("failed to resolve config directory"))?;
    Ok(base.join("sf-trace").join("config.toml"))
}
