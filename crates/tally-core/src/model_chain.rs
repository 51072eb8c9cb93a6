//! Ordered model chains per backend
//!
//! The interpreter tries the models of its chain strictly in order. Chains are
//! loaded once at startup and never change afterwards; there is no health
//! tracking or reordering between requests.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/config/models.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! `TALLY_MODELS` (comma-separated) replaces the model list of the active backend.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::ai::BackendKind;
use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/models.toml");

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Priority-ordered list of models plus the per-request timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    models: Vec<String>,
    timeout: Duration,
}

impl ModelChain {
    pub fn new<I, S>(models: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            models: models
                .into_iter()
                .map(Into::into)
                .map(|m: String| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            timeout,
        }
    }

    /// Chain for `kind` from the config files, with `TALLY_MODELS` applied
    pub fn from_env(kind: BackendKind) -> Result<Self> {
        let config = ChainConfig::load()?;
        let chain = config.chain_for(kind);

        match std::env::var("TALLY_MODELS") {
            Ok(list) if !list.trim().is_empty() => {
                Ok(Self::new(list.split(','), chain.timeout))
            }
            _ => Ok(chain),
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Parsed model configuration for every backend
#[derive(Debug, Clone)]
pub struct ChainConfig {
    chains: HashMap<BackendKind, ModelChain>,
    default_timeout: Duration,
    source: Option<PathBuf>,
}

impl ChainConfig {
    /// Load from the default override location, else the embedded defaults
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Self::parse(DEFAULT_CONFIG),
        }
    }

    /// Load from an explicit path, falling back to embedded defaults if absent
    pub fn with_config_path(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Self::parse(DEFAULT_CONFIG)
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config = Self::parse(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse config from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid models TOML: {}", e)))?;

        let default_timeout = Duration::from_secs(
            raw.defaults
                .and_then(|d| d.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let mut chains = HashMap::new();
        for (name, backend) in raw.backends {
            let Ok(kind) = name.parse::<BackendKind>() else {
                tracing::warn!(backend = %name, "Ignoring unknown backend in models config");
                continue;
            };
            let timeout = backend
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default_timeout);
            chains.insert(kind, ModelChain::new(backend.models, timeout));
        }

        Ok(Self {
            chains,
            default_timeout,
            source: None,
        })
    }

    /// Chain for a backend; empty when the backend is not configured
    pub fn chain_for(&self, kind: BackendKind) -> ModelChain {
        self.chains
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ModelChain::new(Vec::<String>::new(), self.default_timeout))
    }

    /// Override file this config came from, None for embedded defaults
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config").join("models.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    defaults: Option<RawDefaults>,
    #[serde(default)]
    backends: HashMap<String, RawBackend>,
}

#[derive(Debug, Deserialize)]
struct RawDefaults {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawBackend {
    #[serde(default)]
    models: Vec<String>,
    timeout_secs: Option<u64>,
}
