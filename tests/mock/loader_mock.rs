#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use async_trait::async_trait;

use anyloc_vocab_cache::config::Domain;
use anyloc_vocab_cache::modules::vocabulary::{
    ClusterCenters, LoadError, LoadResult, LoadedModel, ModelLoader, ModelRequest,
    CENTERS_TENSOR_NAME, NESTED_CENTERS_TENSOR_NAME,
};
use anyloc_vocab_cache::utils::DownloadError;

#[derive(Debug, Clone)]
pub enum FakeResponse {
    Direct(Vec<usize>),
    Nested(Vec<usize>),
    Empty,
    Fail(String),
}

/// Stand-in for the hub: answers per domain and remembers every request.
pub struct FakeHubLoader {
    responses: HashMap<Domain, FakeResponse>,
    default_response: FakeResponse,
    requests: Mutex<Vec<ModelRequest>>,
}

impl FakeHubLoader {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: FakeResponse::Direct(TestVocabularyData::default_shape()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, domain: Domain, response: FakeResponse) -> Self {
        self.responses.insert(domain, response);
        self
    }

    pub fn with_default_response(mut self, response: FakeResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn failing_for(domain: Domain) -> Self {
        Self::new().with_response(domain, FakeResponse::Fail(format!("{} checkpoint unavailable", domain)))
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_domains(&self) -> Vec<Domain> {
        self.requests().into_iter().map(|r| r.domain).collect()
    }
}

#[async_trait]
impl ModelLoader for FakeHubLoader {
    async fn load(&self, request: &ModelRequest) -> LoadResult<LoadedModel> {
        self.requests.lock().unwrap().push(request.clone());

        let response = self
            .responses
            .get(&request.domain)
            .cloned()
            .unwrap_or_else(|| self.default_response.clone());

        match response {
            FakeResponse::Direct(shape) => Ok(LoadedModel::new()
                .with_tensor(CENTERS_TENSOR_NAME, TestVocabularyData::centers(&shape))),
            FakeResponse::Nested(shape) => Ok(LoadedModel::new()
                .with_tensor(NESTED_CENTERS_TENSOR_NAME, TestVocabularyData::centers(&shape))),
            FakeResponse::Empty => Ok(LoadedModel::new()
                .with_tensor("backbone.cls_token", TestVocabularyData::centers(&[1, 1, 8]))),
            FakeResponse::Fail(message) => Err(LoadError::Download(DownloadError::InvalidResponse(message))),
        }
    }
}

pub struct TestVocabularyData;

impl TestVocabularyData {
    pub fn default_shape() -> Vec<usize> {
        vec![32, 16]
    }

    pub fn centers(shape: &[usize]) -> ClusterCenters {
        let len: usize = shape.iter().product();
        let data = (0..len).map(|i| (i % 97) as f32 / 97.0).collect();
        ClusterCenters::from_shape_vec(shape, data).unwrap()
    }
}
