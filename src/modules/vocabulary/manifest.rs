use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Domain, PopulatorConfig};
use super::populator::artifact_path;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub backbone: String,
    /// Relative to the cache root.
    pub file: String,
    pub shape: Vec<usize>,
    pub sha256: String,
    pub cached_at: DateTime<Utc>,
}

/// Record of what a populate run wrote, kept at `<cache_root>/manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub entries: BTreeMap<Domain, ManifestEntry>,
}

impl CacheManifest {
    pub fn path<P: AsRef<Path>>(root: P) -> PathBuf {
        root.as_ref().join(MANIFEST_FILE_NAME)
    }

    /// `Ok(None)` when no manifest has been written yet.
    pub async fn load<P: AsRef<Path>>(root: P) -> ManifestResult<Option<Self>> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub async fn save<P: AsRef<Path>>(&self, root: P) -> ManifestResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(Self::path(root), json).await?;
        Ok(())
    }

    pub fn record(&mut self, domain: Domain, entry: ManifestEntry) {
        self.entries.insert(domain, entry);
    }

    pub fn entry(&self, domain: Domain) -> Option<&ManifestEntry> {
        self.entries.get(&domain)
    }
}

#[derive(Debug, Clone)]
pub struct DomainStatus {
    pub domain: Domain,
    pub path: PathBuf,
    pub present: bool,
    pub entry: Option<ManifestEntry>,
}

/// Per configured domain: is the artifact on disk, and what did the last run
/// record for it.
pub async fn cache_status(config: &PopulatorConfig) -> ManifestResult<Vec<DomainStatus>> {
    let manifest = CacheManifest::load(&config.cache_root).await?.unwrap_or_default();

    Ok(config
        .domains()
        .into_iter()
        .map(|domain| {
            let path = artifact_path(&config.cache_root, domain);
            DomainStatus {
                domain,
                present: path.is_file(),
                path,
                entry: manifest.entry(domain).cloned(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(shape: Vec<usize>) -> ManifestEntry {
        ManifestEntry {
            backbone: "DINOv2".to_string(),
            file: "urban/c_centers.safetensors".to_string(),
            shape,
            sha256: "00".repeat(32),
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_load_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CacheManifest::load(dir.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = CacheManifest::default();
        manifest.record(Domain::Urban, entry(vec![32, 1536]));
        manifest.save(dir.path()).await.unwrap();

        let loaded = CacheManifest::load(dir.path()).await.unwrap().unwrap();
        assert_eq!(loaded, manifest);

        let json = std::fs::read_to_string(CacheManifest::path(dir.path())).unwrap();
        assert!(json.contains("\"urban\""));
    }

    #[test]
    fn test_record_replaces_entry() {
        let mut manifest = CacheManifest::default();
        manifest.record(Domain::Aerial, entry(vec![8, 4]));
        manifest.record(Domain::Aerial, entry(vec![32, 1536]));

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entry(Domain::Aerial).unwrap().shape, vec![32, 1536]);
    }

    #[tokio::test]
    async fn test_corrupt_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(CacheManifest::path(dir.path()), "{ not json").unwrap();

        let result = CacheManifest::load(dir.path()).await;
        assert!(matches!(result, Err(ManifestError::Serialization(_))));
    }
}
