//! Dense row-major tensors holding layer parameters.
use definitions::NestedArray;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TensorError {
    #[error("Ragged array: expected shape {expected:?} but an element has shape {found:?}")]
    Ragged {
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Zero-dimensional arrays can not be concatenated")]
    ConcatenateScalar,
    #[error("Data length {len} does not match shape {shape:?}")]
    Length { len: usize, shape: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0f32; len],
        }
    }
    pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
        let len: usize = shape.iter().product();
        if len != data.len() {
            return Err(TensorError::Length {
                len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
    pub fn data(&self) -> &[f32] {
        &self.data
    }
    /// Convert a nested list into a tensor. Every element at the same depth should have the same shape.
    pub fn from_nested(array: &NestedArray) -> Result<Self, TensorError> {
        let shape = shape_of(array)?;
        let mut data = Vec::with_capacity(shape.iter().product());
        flatten(array, &mut data);
        Ok(Self { shape, data })
    }
    /// Concatenate the sub-arrays along the first axis,
    /// i.e., `[g, r, c, ...]` becomes `[g * r, c, ...]`.
    /// A one-dimensional array is a list of scalars and can not be concatenated.
    pub fn concatenate_groups(&self) -> Result<Self, TensorError> {
        if self.shape.len() < 2 {
            return Err(TensorError::ConcatenateScalar);
        }
        let mut shape = vec![self.shape[0] * self.shape[1]];
        shape.extend_from_slice(&self.shape[2..]);
        Ok(Self {
            shape,
            data: self.data.clone(),
        })
    }
}

fn shape_of(array: &NestedArray) -> Result<Vec<usize>, TensorError> {
    match array {
        NestedArray::Value(_) => Ok(vec![]),
        NestedArray::Array(xs) if xs.is_empty() => Ok(vec![0]),
        NestedArray::Array(xs) => {
            let inner = shape_of(&xs[0])?;
            for x in xs.iter().skip(1) {
                let found = shape_of(x)?;
                if found != inner {
                    return Err(TensorError::Ragged {
                        expected: inner,
                        found,
                    });
                }
            }
            let mut shape = vec![xs.len()];
            shape.extend(inner);
            Ok(shape)
        }
    }
}

fn flatten(array: &NestedArray, data: &mut Vec<f32>) {
    match array {
        NestedArray::Value(x) => data.push(*x as f32),
        NestedArray::Array(xs) => xs.iter().for_each(|x| flatten(x, data)),
    }
}
