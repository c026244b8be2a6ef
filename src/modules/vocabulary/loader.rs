use std::path::Path;
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{Device, Domain, HubConfig};
use crate::utils::downloader::{ArtifactDownloader, DownloadError};
use super::tensor::{LoadedModel, TensorError};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] TensorError),

    #[error("Unsupported device '{0}', vocabulary population runs on cpu")]
    UnsupportedDevice(Device),
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub backbone: String,
    pub domain: Domain,
    pub device: Device,
}

impl ModelRequest {
    pub fn cpu(backbone: impl Into<String>, domain: Domain) -> Self {
        Self {
            backbone: backbone.into(),
            domain,
            device: Device::Cpu,
        }
    }
}

/// Source of VLAD models. Implementations may touch the network and are
/// allowed to fail for any reason; callers treat errors as per-domain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, request: &ModelRequest) -> LoadResult<LoadedModel>;
}

/// Fetches VLAD checkpoints from a model hub over HTTP.
///
/// Each checkpoint is streamed into a scratch directory that is removed once
/// the tensors are parsed, whether or not the load succeeded. Nothing from
/// the hub is left behind in the vocabulary cache.
pub struct HubLoader {
    hub: HubConfig,
    downloader: ArtifactDownloader,
}

impl HubLoader {
    pub fn new(hub: HubConfig) -> LoadResult<Self> {
        let downloader = match hub.timeout_secs {
            Some(secs) => ArtifactDownloader::with_timeout(Duration::from_secs(secs))?,
            None => ArtifactDownloader::new(),
        }
        .with_progress(hub.show_progress);

        Ok(Self { hub, downloader })
    }

    pub fn checkpoint_url(&self, request: &ModelRequest) -> String {
        format!(
            "{}/{}/resolve/{}/{}/{}/{}",
            self.hub.endpoint.trim_end_matches('/'),
            self.hub.repo.trim_matches('/'),
            self.hub.revision,
            request.backbone,
            request.domain,
            self.hub.checkpoint,
        )
    }

    pub async fn read_checkpoint<P: AsRef<Path>>(path: P) -> LoadResult<LoadedModel> {
        let bytes = tokio::fs::read(path).await?;
        Ok(LoadedModel::from_safetensors(&bytes)?)
    }
}

#[async_trait]
impl ModelLoader for HubLoader {
    async fn load(&self, request: &ModelRequest) -> LoadResult<LoadedModel> {
        if request.device != Device::Cpu {
            return Err(LoadError::UnsupportedDevice(request.device));
        }

        let url = self.checkpoint_url(request);
        let scratch = tempfile::Builder::new()
            .prefix(&format!("vlad-{}-", request.domain))
            .tempdir()?;
        let destination = scratch.path().join(&self.hub.checkpoint);

        info!(domain = %request.domain, backbone = %request.backbone, %url, "fetching vlad checkpoint");
        let bytes = self
            .downloader
            .download_file(&url, &destination, self.hub.expected_sha256(request.domain))
            .await?;
        debug!(domain = %request.domain, bytes, "checkpoint downloaded");

        let model = Self::read_checkpoint(&destination).await?;
        debug!(
            domain = %request.domain,
            tensors = ?model.names().collect::<Vec<_>>(),
            "checkpoint parsed"
        );

        scratch.close()?;
        Ok(model)
    }
}
