pub mod config;
pub mod modules;
pub mod utils;

pub use config::{Domain, Device, HubConfig, PopulatorConfig};
pub use modules::vocabulary::{
    CachePopulator, ClusterCenters, DomainOutcome, HubLoader, LoadedModel, ModelLoader,
    ModelRequest, PopulationReport,
};
