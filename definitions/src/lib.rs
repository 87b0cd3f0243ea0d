//! Definitions -- A tiny interface for the basecall utilities.
//! Roughly speaking, we interact with the basecaller through two kinds of messages: a JSON model description, named [ModelDescription](ModelDescription), which is handed to the checkpoint converter,
//! and the per-read records ([BasecallRead](BasecallRead), [AlignmentRecord](AlignmentRecord), [JoinedRead](JoinedRead)) flowing through the q-score calibration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A neural network serialized by the basecaller.
/// Only the ordered list of layers is used. Other top-level keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    pub sublayers: Vec<LayerDescriptor>,
}

impl ModelDescription {
    /// The `type` tags of the layers, in order.
    pub fn layer_types(&self) -> Vec<&str> {
        self.sublayers.iter().map(|l| l.layer_type.as_str()).collect()
    }
}

/// One layer of the serialized network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(default)]
    pub insize: Option<usize>,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub activation: Option<String>,
    #[serde(default)]
    pub stride: Option<usize>,
    #[serde(default)]
    pub winlen: Option<usize>,
    /// Output alphabet of a modified-base aware output layer, e.g., `AZCGT`.
    #[serde(default)]
    pub output_alphabet: Option<String>,
    /// Number of modifications of each canonical base.
    #[serde(default)]
    pub can_nmods: Option<Vec<usize>>,
    #[serde(default)]
    pub modified_base_long_names: Option<Vec<String>>,
    /// The wrapped layer(s). Only `reverse` layers have this field.
    #[serde(default)]
    pub sublayers: Option<Sublayers>,
    /// Parameter role (`W`, `b`, `iW`, `sW`, ...) -> values.
    #[serde(default)]
    pub params: BTreeMap<String, NestedArray>,
}

impl LayerDescriptor {
    pub fn new(layer_type: &str) -> Self {
        Self {
            layer_type: layer_type.to_string(),
            insize: None,
            size: None,
            activation: None,
            stride: None,
            winlen: None,
            output_alphabet: None,
            can_nmods: None,
            modified_base_long_names: None,
            sublayers: None,
            params: BTreeMap::new(),
        }
    }
}

/// The wrapped layer of a `reverse` layer. Some serializations put a single layer here,
/// others a list of layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sublayers {
    One(Box<LayerDescriptor>),
    Many(Vec<LayerDescriptor>),
}

/// Arbitrary nested list of numbers, as written by `json.dump` of a numpy array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedArray {
    Value(f64),
    Array(Vec<NestedArray>),
}

impl From<f64> for NestedArray {
    fn from(x: f64) -> Self {
        NestedArray::Value(x)
    }
}

impl<T: Into<NestedArray>> From<Vec<T>> for NestedArray {
    fn from(xs: Vec<T>) -> Self {
        NestedArray::Array(xs.into_iter().map(|x| x.into()).collect())
    }
}

/// A basecall read summarized from a FASTQ record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasecallRead {
    /// Name of the read. It is the `id` in the fastq file.
    pub read_id: String,
    pub basecall_length: usize,
    /// Mean q-score in the probability space. None if the read is empty.
    pub mean_qscore: Option<f64>,
}

/// A line of an alignment summary. There can be more than one record for a read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentRecord {
    pub read_id: String,
    /// Accuracy as a proportion. None if the read failed to align.
    pub accuracy: Option<f64>,
    pub alignment_length: i64,
}

/// A basecall read with its best alignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinedRead {
    pub read_id: String,
    pub basecall_length: usize,
    pub mean_qscore: Option<f64>,
    pub accuracy: Option<f64>,
    /// -1 if unaligned.
    pub alignment_length: i64,
}

impl JoinedRead {
    pub fn unaligned(read: &BasecallRead) -> Self {
        Self {
            read_id: read.read_id.clone(),
            basecall_length: read.basecall_length,
            mean_qscore: read.mean_qscore,
            accuracy: None,
            alignment_length: -1,
        }
    }
    /// Aligned length / basecall length. None for an empty basecall.
    pub fn coverage(&self) -> Option<f64> {
        match self.basecall_length {
            0 => None,
            len => Some(self.alignment_length as f64 / len as f64),
        }
    }
}

impl std::fmt::Display for JoinedRead {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let fmt_opt = |x: Option<f64>| match x {
            Some(x) => format!("{:.4}", x),
            None => "nan".to_string(),
        };
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.read_id,
            self.basecall_length,
            fmt_opt(self.mean_qscore),
            fmt_opt(self.accuracy),
            self.alignment_length
        )
    }
}
