pub mod http_mock;
pub mod loader_mock;

pub use http_mock::StubHub;
pub use loader_mock::{FakeHubLoader, FakeResponse, TestVocabularyData};
