use anyloc_vocab_cache::utils::init_logging;
use tracing::subscriber::{set_global_default, NoSubscriber};

#[test]
fn test_init_logging_installs_global_subscriber() {
    init_logging();
    tracing::info!(domain = "urban", "logging initialized");

    assert!(set_global_default(NoSubscriber::default()).is_err());
}
