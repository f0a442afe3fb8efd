//! Target networks and their environment configuration.

use std::{
    collections::HashMap,
    fmt,
    path::Path,
    str::FromStr,
};

use thiserror::Error;

/// Fixed endpoints of a local development network node.
pub const DEVNET_ALGOD_URL: &str = "http://localhost:4001";
pub const DEVNET_ALGOD_TOKEN: &str =
    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file missing: {0}")]
    Missing(String),

    #[error("config key missing: {0}")]
    KeyMissing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    MainNet,
    TestNet,
    DevNet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainNet => "mainnet",
            Self::TestNet => "testnet",
            Self::DevNet => "devnet",
        }
    }

    /// Live networks get the non-empty-output-directory deployment guard.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::MainNet | Self::TestNet)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::MainNet),
            "testnet" => Ok(Self::TestNet),
            "devnet" => Ok(Self::DevNet),
            other => Err(format!(
                "invalid network {other}; valid networks are mainnet, testnet, devnet"
            )),
        }
    }
}

/// Key-value configuration loaded from a `<network>.env` file.
///
/// Lines are `key=value`; blank lines and `#`/`//` comments are skipped,
/// values lose surrounding quotes. Malformed lines are logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    values: HashMap<String, String>,
}

impl EnvConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::Missing(path.display().to_string()))?;

        let mut values = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(%line, "malformed line in env file");
                continue;
            };
            values.insert(
                key.trim().to_string(),
                value.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
            );
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::KeyMissing(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse_roundtrip() {
        for name in ["mainnet", "testnet", "devnet"] {
            assert_eq!(name.parse::<Network>().unwrap().as_str(), name);
        }
        assert!("betanet".parse::<Network>().is_err());
    }

    #[test]
    fn test_env_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testnet.env");
        std::fs::write(
            &path,
            "# comment\nALGOD_PATH=http://node:8080\nALGOD_TOKEN = \"secret\"\n\nbroken line\n",
        )
        .unwrap();

        let config = EnvConfig::load(&path).unwrap();
        assert_eq!(config.get("ALGOD_PATH").unwrap(), "http://node:8080");
        assert_eq!(config.require("ALGOD_TOKEN").unwrap(), "secret");
        assert!(config.require("MISSING").is_err());
    }
}
