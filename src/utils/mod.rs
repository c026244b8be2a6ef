pub mod downloader;
pub mod logging;

pub use downloader::{ArtifactDownloader, DownloadError, DownloadResult, file_sha256};
pub use logging::init_logging;
