pub mod loader;
pub mod manifest;
pub mod populator;
pub mod tensor;

pub use loader::{HubLoader, LoadError, LoadResult, ModelLoader, ModelRequest};
pub use manifest::{cache_status, CacheManifest, DomainStatus, ManifestEntry, ManifestError, ManifestResult};
pub use populator::{
    artifact_path, ensure_cache_layout, persist_artifact, read_artifact, CachePopulator,
    DomainOutcome, PersistError, PersistResult, PopulateError, PopulateResult, PopulationReport,
    CENTERS_FILE_NAME,
};
pub use tensor::{
    extract_cluster_centers, ClusterCenters, LoadedModel, TensorError, TensorSource,
    CENTERS_TENSOR_NAME, NESTED_CENTERS_TENSOR_NAME,
};
