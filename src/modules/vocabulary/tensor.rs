use std::collections::BTreeMap;
use ndarray::{ArrayD, IxDyn, ShapeError};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensorError, SafeTensors};
use thiserror::Error;
use tracing::debug;

/// Name of the cluster-center tensor, both on the loaded model and in the
/// persisted cache file.
pub const CENTERS_TENSOR_NAME: &str = "c_centers";

/// Fallback location: the centers owned by the nested VLAD submodule.
pub const NESTED_CENTERS_TENSOR_NAME: &str = "vlad.c_centers";

#[derive(Error, Debug, Clone)]
pub enum TensorError {
    #[error("Invalid safetensors data: {0}")]
    Format(String),

    #[error("Array shape error: {0}")]
    Shape(String),
}

impl From<SafeTensorError> for TensorError {
    fn from(error: SafeTensorError) -> Self {
        TensorError::Format(format!("{:?}", error))
    }
}

impl From<ShapeError> for TensorError {
    fn from(error: ShapeError) -> Self {
        TensorError::Shape(error.to_string())
    }
}

/// Quantization centroids of a VLAD vocabulary, typically `[clusters, dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterCenters {
    array: ArrayD<f32>,
}

impl ClusterCenters {
    pub fn new(array: ArrayD<f32>) -> Self {
        Self { array }
    }

    pub fn from_shape_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
        let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self { array })
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    pub fn array(&self) -> &ArrayD<f32> {
        &self.array
    }

    /// Row-major little-endian `f32` bytes, the safetensors `F32` layout.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.array.len() * 4);
        for value in self.array.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Converts a floating point view. Returns `None` for dtypes a vocabulary
    /// is never stored in.
    pub fn from_view(view: &TensorView<'_>) -> Result<Option<Self>, TensorError> {
        let data: Vec<f32> = match view.dtype() {
            Dtype::F32 => view
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F64 => view
                .data()
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
            _ => return Ok(None),
        };

        Self::from_shape_vec(view.shape(), data).map(Some)
    }

    pub fn to_safetensors(&self, name: &str) -> Result<Vec<u8>, TensorError> {
        let bytes = self.to_le_bytes();
        let view = TensorView::new(Dtype::F32, self.shape().to_vec(), &bytes)?;
        Ok(safetensors::serialize([(name, view)], &None)?)
    }
}

/// Capability check over whatever the loader handed back.
pub trait TensorSource {
    fn tensor(&self, name: &str) -> Option<&ClusterCenters>;
}

/// Direct `c_centers` first, then the nested `vlad.c_centers`.
pub fn extract_cluster_centers(source: &dyn TensorSource) -> Option<ClusterCenters> {
    [CENTERS_TENSOR_NAME, NESTED_CENTERS_TENSOR_NAME]
        .into_iter()
        .find_map(|name| source.tensor(name))
        .cloned()
}

/// A model checkpoint as a flat map of dotted tensor names.
#[derive(Debug, Clone, Default)]
pub struct LoadedModel {
    tensors: BTreeMap<String, ClusterCenters>,
}

impl LoadedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tensor(mut self, name: impl Into<String>, tensor: ClusterCenters) -> Self {
        self.tensors.insert(name.into(), tensor);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn from_safetensors(bytes: &[u8]) -> Result<Self, TensorError> {
        let file = SafeTensors::deserialize(bytes)?;
        let mut tensors = BTreeMap::new();

        for (name, view) in file.tensors() {
            match ClusterCenters::from_view(&view)? {
                Some(tensor) => {
                    tensors.insert(name, tensor);
                }
                None => debug!(tensor = %name, dtype = ?view.dtype(), "skipping non-float tensor"),
            }
        }

        Ok(Self { tensors })
    }
}

impl TensorSource for LoadedModel {
    fn tensor(&self, name: &str) -> Option<&ClusterCenters> {
        self.tensors.get(name)
    }
}
