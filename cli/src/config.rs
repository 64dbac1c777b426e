//! Client configuration with TOML file support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the config file relative to the home directory.
pub const CONFIG_FILE: &str = "config/client.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid client config: {0}")]
    Parse(String),
}

/// Settings shared by every command.
///
/// Loaded from `<home_dir>/config/client.toml` when present. Command-line
/// flags override file values through [`ClientConfig::apply_overrides`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// `test`, `file`, `os` or `memory`.
    #[serde(default = "default_keyring_backend")]
    pub keyring_backend: String,

    /// CometBFT RPC endpoint, or a comma-separated list for a rotating pool.
    #[serde(default = "default_node_uri")]
    pub node_uri: String,

    #[serde(default)]
    pub chain_id: String,

    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,

    /// Whether `--fee-granter` may be used.
    #[serde(default = "default_true")]
    pub fee_granter_enabled: bool,
}

fn default_keyring_backend() -> String {
    "test".into()
}

fn default_node_uri() -> String {
    "tcp://localhost:26657".into()
}

fn default_home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".cosmtx")
}

fn default_true() -> bool {
    true
}

/// Overrides taken from the command line. `None` keeps the file value.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub home: Option<PathBuf>,
    pub node: Option<String>,
    pub chain_id: Option<String>,
    pub keyring_backend: Option<String>,
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ClientConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read `<home>/config/client.toml` if it exists, else the defaults.
    /// `home_dir` always ends up as `home`.
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(CONFIG_FILE);
        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "loading client config");
            Self::from_toml_file(&path)?
        } else {
            Self::default()
        };
        config.home_dir = home.to_path_buf();
        Ok(config)
    }

    /// Resolve the home directory, load the file there and apply flags.
    pub fn resolve(overrides: &Overrides) -> Result<Self, ConfigError> {
        let home = overrides.home.clone().unwrap_or_else(default_home_dir);
        let mut config = Self::load(&home)?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(home) = &overrides.home {
            self.home_dir = home.clone();
        }
        if let Some(node) = &overrides.node {
            self.node_uri = node.clone();
        }
        if let Some(chain_id) = &overrides.chain_id {
            self.chain_id = chain_id.clone();
        }
        if let Some(backend) = &overrides.keyring_backend {
            self.keyring_backend = backend.clone();
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keyring_backend: default_keyring_backend(),
            node_uri: default_node_uri(),
            chain_id: String::new(),
            home_dir: default_home_dir(),
            fee_granter_enabled: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = ClientConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        assert_eq!(ClientConfig::from_toml_str(&toml_str).unwrap(), config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config.keyring_backend, "test");
        assert_eq!(config.node_uri, "tcp://localhost:26657");
        assert_eq!(config.chain_id, "");
        assert!(config.fee_granter_enabled);
    }

    #[test]
    fn unknown_keys_rejected() {
        let err = ClientConfig::from_toml_str("output = \"json\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn file_then_flags() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join("config")).unwrap();
        std::fs::write(
            home.path().join(CONFIG_FILE),
            "chain_id = \"file-1\"\nfee_granter_enabled = false\nnode_uri = \"tcp://a:26657\"\n",
        )
        .unwrap();

        let config = ClientConfig::resolve(&Overrides {
            home: Some(home.path().to_path_buf()),
            chain_id: Some("flag-1".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.chain_id, "flag-1");
        assert_eq!(config.node_uri, "tcp://a:26657");
        assert!(!config.fee_granter_enabled);
        assert_eq!(config.home_dir, home.path());
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = ClientConfig::from_toml_file(Path::new("/nonexistent/client.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
