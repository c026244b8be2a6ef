use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "vocab_cache.toml";
pub const DEFAULT_CACHE_ROOT: &str = "./AnyLoc/cache/vocabulary/dinov2_vitg14/l31_value_c32";
pub const DEFAULT_BACKBONE: &str = "DINOv2";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Environment category selecting which vocabulary variant to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Urban,
    Indoor,
    Aerial,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Urban, Domain::Indoor, Domain::Aerial];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Urban => "urban",
            Domain::Indoor => "indoor",
            Domain::Aerial => "aerial",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|domain| domain.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown domain '{}', expected one of urban, indoor, aerial", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda => f.write_str("cuda"),
        }
    }
}

/// Where the hub loader fetches checkpoints from.
///
/// Checkpoints resolve to
/// `{endpoint}/{repo}/resolve/{revision}/{backbone}/{domain}/{checkpoint}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub endpoint: String,
    pub repo: String,
    pub revision: String,
    pub checkpoint: String,
    /// Optional expected digests keyed by domain name.
    pub sha256: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    pub show_progress: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
            repo: "AnyLoc/DINO".to_string(),
            revision: "main".to_string(),
            checkpoint: "vlad.safetensors".to_string(),
            sha256: BTreeMap::new(),
            timeout_secs: None,
            show_progress: true,
        }
    }
}

impl HubConfig {
    pub fn expected_sha256(&self, domain: Domain) -> Option<&str> {
        self.sha256.get(domain.as_str()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulatorConfig {
    pub cache_root: PathBuf,
    pub backbone: String,
    pub domains: Vec<Domain>,
    pub hub: HubConfig,
}

impl Default for PopulatorConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(DEFAULT_CACHE_ROOT),
            backbone: DEFAULT_BACKBONE.to_string(),
            domains: Domain::ALL.to_vec(),
            hub: HubConfig::default(),
        }
    }
}

impl PopulatorConfig {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    pub fn with_domains(mut self, domains: impl IntoIterator<Item = Domain>) -> Self {
        self.domains = domains.into_iter().collect();
        self
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PopulatorConfig = toml::from_str(content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise `vocab_cache.toml` in the working
    /// directory when present, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_root.as_os_str().is_empty() {
            return Err("cache_root must not be empty".to_string());
        }
        if self.backbone.trim().is_empty() {
            return Err("backbone must not be empty".to_string());
        }
        if self.domains.is_empty() {
            return Err("at least one domain must be configured".to_string());
        }

        let hub_fields = [
            ("hub.endpoint", &self.hub.endpoint),
            ("hub.repo", &self.hub.repo),
            ("hub.revision", &self.hub.revision),
            ("hub.checkpoint", &self.hub.checkpoint),
        ];
        for (name, value) in hub_fields {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }

        Ok(())
    }

    /// Configured domains in order, first occurrence wins.
    pub fn domains(&self) -> Vec<Domain> {
        let mut ordered = Vec::with_capacity(self.domains.len());
        for domain in &self.domains {
            if !ordered.contains(domain) {
                ordered.push(*domain);
            }
        }
        ordered
    }

    pub fn domain_dir(&self, domain: Domain) -> PathBuf {
        self.cache_root.join(domain.as_str())
    }

    /// Applies command line overrides on top of file or default values.
    pub fn with_overrides(
        mut self,
        cache_root: Option<PathBuf>,
        domains: &[Domain],
        backbone: Option<&str>,
    ) -> Self {
        if let Some(cache_root) = cache_root {
            self.cache_root = cache_root;
        }
        if !domains.is_empty() {
            self.domains = domains.to_vec();
        }
        if let Some(backbone) = backbone {
            self.backbone = backbone.to_string();
        }
        self
    }
}
