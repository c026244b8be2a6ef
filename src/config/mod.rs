pub mod cache_config;

pub use cache_config::{
    ConfigError, ConfigResult, Device, Domain, HubConfig, PopulatorConfig,
    DEFAULT_BACKBONE, DEFAULT_CACHE_ROOT, DEFAULT_CONFIG_FILE,
};
