use std::path::Path;
use std::time::Duration;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Sha256, Digest};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Progress bar template error: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),

    #[error("File verification failed: expected {expected}, got {actual}")]
    VerificationFailed { expected: String, actual: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type DownloadResult<T> = Result<T, DownloadError>;

pub struct ArtifactDownloader {
    client: Client,
    show_progress: bool,
}

impl Default for ArtifactDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            show_progress: true,
        }
    }

    pub fn with_timeout(timeout: Duration) -> DownloadResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total_size: u64, destination: &Path) -> DownloadResult<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", file_label(destination)));
        Ok(pb)
    }

    /// Streams `url` into `destination`, overwriting any previous file.
    ///
    /// When `expected_sha256` is given and the digest differs, the partial
    /// file is removed and `VerificationFailed` is returned.
    pub async fn download_file<P: AsRef<Path>>(
        &self,
        url: &str,
        destination: P,
        expected_sha256: Option<&str>,
    ) -> DownloadResult<u64> {
        let destination = destination.as_ref();

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(url, destination = %destination.display(), "starting download");

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_else(|_| "Unknown error".to_string())
            )));
        }

        let total_size = response.content_length().unwrap_or(0);
        let pb = self.progress_bar(total_size, destination)?;

        let mut file = File::create(destination).await?;
        let mut hasher = expected_sha256.map(|_| Sha256::new());
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;

            if let Some(ref mut hasher) = hasher {
                hasher.update(&chunk);
            }

            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await?;
        pb.finish_with_message(format!("Downloaded {}", file_label(destination)));

        if let (Some(expected_sha256), Some(hasher)) = (expected_sha256, hasher) {
            let actual_hash = hex::encode(hasher.finalize());
            if !actual_hash.eq_ignore_ascii_case(expected_sha256) {
                let _ = tokio::fs::remove_file(destination).await;
                return Err(DownloadError::VerificationFailed {
                    expected: expected_sha256.to_string(),
                    actual: actual_hash,
                });
            }
        }

        Ok(downloaded)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().into_owned()
}

/// Hex-encoded SHA-256 of a file on disk.
pub async fn file_sha256<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    let data = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sha256_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();

        let digest = file_sha256(&path).await.unwrap();
        assert_eq!(digest, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_verification_error_display() {
        let err = DownloadError::VerificationFailed {
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert!(err.to_string().contains("expected aa, got bb"));
    }

    #[test]
    fn test_hidden_progress_bar() {
        let downloader = ArtifactDownloader::new().with_progress(false);
        let pb = downloader.progress_bar(10, Path::new("x/c.bin")).unwrap();
        assert!(pb.is_hidden());
    }
}
