use std::fmt;
use std::path::{Path, PathBuf};
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{Domain, PopulatorConfig};
use crate::utils::downloader::file_sha256;
use super::loader::{LoadResult, ModelLoader, ModelRequest};
use super::manifest::{CacheManifest, ManifestEntry};
use super::tensor::{extract_cluster_centers, ClusterCenters, TensorError, CENTERS_TENSOR_NAME};

pub const CENTERS_FILE_NAME: &str = "c_centers.safetensors";

#[derive(Error, Debug)]
pub enum PopulateError {
    #[error("Failed to create cache directory {path}: {source}")]
    Setup {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PopulateResult<T> = Result<T, PopulateError>;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] TensorError),
}

pub type PersistResult<T> = Result<T, PersistError>;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    Cached { path: PathBuf, shape: Vec<usize> },
    NotFound,
    Failed { cause: String },
}

impl DomainOutcome {
    pub fn is_cached(&self) -> bool {
        matches!(self, DomainOutcome::Cached { .. })
    }
}

impl fmt::Display for DomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainOutcome::Cached { path, shape } => {
                write!(f, "cached {:?} at {}", shape, path.display())
            }
            DomainOutcome::NotFound => f.write_str("skipped, no cluster centers in model"),
            DomainOutcome::Failed { cause } => write!(f, "failed: {}", cause),
        }
    }
}

/// Outcome of every attempted domain, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PopulationReport {
    outcomes: Vec<(Domain, DomainOutcome)>,
}

impl PopulationReport {
    fn push(&mut self, domain: Domain, outcome: DomainOutcome) {
        self.outcomes.push((domain, outcome));
    }

    pub fn outcomes(&self) -> &[(Domain, DomainOutcome)] {
        &self.outcomes
    }

    pub fn outcome(&self, domain: Domain) -> Option<&DomainOutcome> {
        self.outcomes
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, outcome)| outcome)
    }

    pub fn cached_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_cached()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_cached())
    }
}

pub fn artifact_path<P: AsRef<Path>>(root: P, domain: Domain) -> PathBuf {
    root.as_ref().join(domain.as_str()).join(CENTERS_FILE_NAME)
}

/// Creates `root/<domain>` for each domain. Existing directories are fine.
pub async fn ensure_cache_layout<P: AsRef<Path>>(root: P, domains: &[Domain]) -> PopulateResult<()> {
    let root = root.as_ref();
    for domain in domains {
        let dir = root.join(domain.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PopulateError::Setup {
                path: dir.display().to_string(),
                source,
            })?;
    }
    Ok(())
}

/// Writes `tensor` to `root/<domain>/c_centers.safetensors`, replacing any
/// previous file in place.
pub async fn persist_artifact<P: AsRef<Path>>(
    tensor: &ClusterCenters,
    domain: Domain,
    root: P,
) -> PersistResult<PathBuf> {
    let path = artifact_path(root, domain);
    let bytes = tensor.to_safetensors(CENTERS_TENSOR_NAME)?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Reads back an artifact written by [`persist_artifact`].
pub async fn read_artifact<P: AsRef<Path>>(path: P) -> LoadResult<Option<ClusterCenters>> {
    let bytes = tokio::fs::read(path).await?;
    let model = super::tensor::LoadedModel::from_safetensors(&bytes)?;
    Ok(extract_cluster_centers(&model))
}

pub struct CachePopulator<L> {
    config: PopulatorConfig,
    loader: L,
}

impl<L: ModelLoader> CachePopulator<L> {
    pub fn new(config: PopulatorConfig, loader: L) -> Self {
        Self { config, loader }
    }

    pub fn config(&self) -> &PopulatorConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub async fn ensure_cache_layout(&self) -> PopulateResult<()> {
        ensure_cache_layout(&self.config.cache_root, &self.config.domains()).await
    }

    /// `Ok(None)` when the model came back without cluster centers.
    pub async fn fetch_domain_artifact(&self, domain: Domain) -> LoadResult<Option<ClusterCenters>> {
        let request = ModelRequest::cpu(self.config.backbone.clone(), domain);
        let model = self.loader.load(&request).await?;
        Ok(extract_cluster_centers(&model))
    }

    pub async fn persist_artifact(&self, tensor: &ClusterCenters, domain: Domain) -> PersistResult<PathBuf> {
        persist_artifact(tensor, domain, &self.config.cache_root).await
    }

    /// Fetches and stores every configured domain in order. Only a layout
    /// failure aborts the run; per-domain failures land in the report.
    pub async fn populate_cache(&self) -> PopulateResult<PopulationReport> {
        let domains = self.config.domains();
        self.ensure_cache_layout().await?;

        info!(
            root = %self.config.cache_root.display(),
            backbone = %self.config.backbone,
            domains = domains.len(),
            "downloading cluster centers"
        );

        let mut report = PopulationReport::default();
        for domain in domains {
            info!(%domain, "processing domain");
            let outcome = self.populate_domain(domain).await;
            report.push(domain, outcome);
        }

        self.update_manifest(&report).await;

        info!(
            cached = report.cached_count(),
            total = report.outcomes().len(),
            root = %self.config.cache_root.display(),
            "cache population finished"
        );
        Ok(report)
    }

    async fn populate_domain(&self, domain: Domain) -> DomainOutcome {
        let tensor = match self.fetch_domain_artifact(domain).await {
            Ok(Some(tensor)) => tensor,
            Ok(None) => {
                warn!(%domain, "could not find cluster centers in loaded model");
                return DomainOutcome::NotFound;
            }
            Err(e) => {
                error!(%domain, error = %e, "failed to fetch vocabulary");
                return DomainOutcome::Failed { cause: e.to_string() };
            }
        };

        match self.persist_artifact(&tensor, domain).await {
            Ok(path) => {
                info!(%domain, path = %path.display(), shape = ?tensor.shape(), "saved cluster centers");
                DomainOutcome::Cached {
                    path,
                    shape: tensor.shape().to_vec(),
                }
            }
            Err(e) => {
                error!(%domain, error = %e, "failed to write cluster centers");
                DomainOutcome::Failed { cause: e.to_string() }
            }
        }
    }

    async fn update_manifest(&self, report: &PopulationReport) {
        let root = &self.config.cache_root;
        let mut manifest = match CacheManifest::load(root).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cache manifest");
                CacheManifest::default()
            }
        };

        for (domain, outcome) in report.outcomes() {
            let DomainOutcome::Cached { path, shape } = outcome else {
                continue;
            };

            let sha256 = match file_sha256(path).await {
                Ok(digest) => digest,
                Err(e) => {
                    warn!(%domain, error = %e, "could not hash cached artifact");
                    continue;
                }
            };

            manifest.record(
                *domain,
                ManifestEntry {
                    backbone: self.config.backbone.clone(),
                    file: format!("{}/{}", domain, CENTERS_FILE_NAME),
                    shape: shape.clone(),
                    sha256,
                    cached_at: Utc::now(),
                },
            );
        }

        if let Err(e) = manifest.save(root).await {
            warn!(error = %e, "failed to write cache manifest");
        }
    }
}
