//! Layers -- parameter-holding network layers written into checkpoints.
//!
//! A layer knows its hyper-parameters and the names and shapes of its parameters, and nothing else.
//! Every parameter starts as zeros and is overwritten by [load_state_dict](Layer::load_state_dict).
//! The naming of the parameters follows the inference runtime, e.g., `cudnn_gru.weight_ih_l0`.
use crate::alphabet::AlphabetInfo;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of gates in a GRU cell.
pub const GRU_GATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Convolution,
    GruMod,
    Reverse,
    GlobalNormFlipFlop,
    GlobalNormFlipFlopCatMod,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Convolution,
        LayerKind::GruMod,
        LayerKind::Reverse,
        LayerKind::GlobalNormFlipFlop,
        LayerKind::GlobalNormFlipFlopCatMod,
    ];
    /// The `type` tag in the JSON model.
    pub fn tag(&self) -> &'static str {
        match self {
            LayerKind::Convolution => "convolution",
            LayerKind::GruMod => "GruMod",
            LayerKind::Reverse => "reverse",
            LayerKind::GlobalNormFlipFlop => "GlobalNormTwoState",
            LayerKind::GlobalNormFlipFlopCatMod => "GlobalNormTwoStateCatMod",
        }
    }
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().find(|k| k.tag() == tag).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Tanh,
}

impl std::str::FromStr for Activation {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tanh" => Ok(Activation::Tanh),
            _ => Err(s.to_string()),
        }
    }
}

/// Number of transition scores of a flip-flop model with `nbase` bases.
pub fn nflipflop(nbase: usize) -> usize {
    2 * nbase * (nbase + 1)
}

/// Inverse of [nflipflop]. None if `size` is not a valid number of transitions.
pub fn nbase_flipflop(size: usize) -> Option<usize> {
    (1..).take_while(|&n| nflipflop(n) <= size).find(|&n| nflipflop(n) == size)
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Error(s) in loading state dict. missing:{missing:?} unexpected:{unexpected:?} mismatched(name,expected,found):{mismatched:?}")]
pub struct StateDictError {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub mismatched: Vec<(String, Vec<usize>, Vec<usize>)>,
}

trait Parameterized {
    fn named_parameters(&self) -> Vec<(String, &Tensor)>;
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)>;
}

/// One dimensional convolution followed by an activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Convolution {
    pub insize: usize,
    pub size: usize,
    pub winlen: usize,
    pub stride: usize,
    pub activation: Activation,
    weight: Tensor,
    bias: Tensor,
}

impl Convolution {
    pub fn new(insize: usize, size: usize, winlen: usize, stride: usize, activation: Activation) -> Self {
        Self {
            insize,
            size,
            winlen,
            stride,
            activation,
            weight: Tensor::zeros(&[size, insize, winlen]),
            bias: Tensor::zeros(&[size]),
        }
    }
}

impl Parameterized for Convolution {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("conv.weight".to_string(), &self.weight),
            ("conv.bias".to_string(), &self.bias),
        ]
    }
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("conv.weight".to_string(), &mut self.weight),
            ("conv.bias".to_string(), &mut self.bias),
        ]
    }
}

/// Unidirectional GRU. Gates are stacked along the first axis in the order of reset, update, new.
/// `bias_hh` is not used in inference and stays at zero unless given explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GruMod {
    pub insize: usize,
    pub size: usize,
    weight_ih: Tensor,
    weight_hh: Tensor,
    bias_ih: Tensor,
    bias_hh: Tensor,
}

impl GruMod {
    pub fn new(insize: usize, size: usize) -> Self {
        Self {
            insize,
            size,
            weight_ih: Tensor::zeros(&[GRU_GATES * size, insize]),
            weight_hh: Tensor::zeros(&[GRU_GATES * size, size]),
            bias_ih: Tensor::zeros(&[GRU_GATES * size]),
            bias_hh: Tensor::zeros(&[GRU_GATES * size]),
        }
    }
}

impl Parameterized for GruMod {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("cudnn_gru.weight_ih_l0".to_string(), &self.weight_ih),
            ("cudnn_gru.weight_hh_l0".to_string(), &self.weight_hh),
            ("cudnn_gru.bias_ih_l0".to_string(), &self.bias_ih),
            ("cudnn_gru.bias_hh_l0".to_string(), &self.bias_hh),
        ]
    }
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("cudnn_gru.weight_ih_l0".to_string(), &mut self.weight_ih),
            ("cudnn_gru.weight_hh_l0".to_string(), &mut self.weight_hh),
            ("cudnn_gru.bias_ih_l0".to_string(), &mut self.bias_ih),
            ("cudnn_gru.bias_hh_l0".to_string(), &mut self.bias_hh),
        ]
    }
}

/// Run the wrapped GRU on the time-reversed input, then reverse its output.
/// Paired with a forward GRU, it makes a bidirectional stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reverse {
    pub layer: GruMod,
}

impl Reverse {
    pub fn new(layer: GruMod) -> Self {
        Self { layer }
    }
}

impl Parameterized for Reverse {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.layer
            .named_parameters()
            .into_iter()
            .map(|(name, t)| (format!("layer.{}", name), t))
            .collect()
    }
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.layer
            .named_parameters_mut()
            .into_iter()
            .map(|(name, t)| (format!("layer.{}", name), t))
            .collect()
    }
}

/// Flip-flop output layer, globally normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalNormFlipFlop {
    pub insize: usize,
    pub nbase: usize,
    weight: Tensor,
    bias: Tensor,
}

impl GlobalNormFlipFlop {
    pub fn new(insize: usize, nbase: usize) -> Self {
        let size = nflipflop(nbase);
        Self {
            insize,
            nbase,
            weight: Tensor::zeros(&[size, insize]),
            bias: Tensor::zeros(&[size]),
        }
    }
    pub fn size(&self) -> usize {
        nflipflop(self.nbase)
    }
}

impl Parameterized for GlobalNormFlipFlop {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("linear.weight".to_string(), &self.weight),
            ("linear.bias".to_string(), &self.bias),
        ]
    }
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("linear.weight".to_string(), &mut self.weight),
            ("linear.bias".to_string(), &mut self.bias),
        ]
    }
}

/// Flip-flop transitions over the canonical bases, followed by
/// categorical scores over every symbol of the alphabet (canonical and modified).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalNormFlipFlopCatMod {
    pub insize: usize,
    pub alphabet_info: AlphabetInfo,
    weight: Tensor,
    bias: Tensor,
}

impl GlobalNormFlipFlopCatMod {
    pub fn new(insize: usize, alphabet_info: AlphabetInfo) -> Self {
        let size = nflipflop(alphabet_info.ncan_base()) + alphabet_info.nbase();
        Self {
            insize,
            alphabet_info,
            weight: Tensor::zeros(&[size, insize]),
            bias: Tensor::zeros(&[size]),
        }
    }
    pub fn size(&self) -> usize {
        nflipflop(self.alphabet_info.ncan_base()) + self.alphabet_info.nbase()
    }
}

impl Parameterized for GlobalNormFlipFlopCatMod {
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        vec![
            ("linear.weight".to_string(), &self.weight),
            ("linear.bias".to_string(), &self.bias),
        ]
    }
    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("linear.weight".to_string(), &mut self.weight),
            ("linear.bias".to_string(), &mut self.bias),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Layer {
    Convolution(Convolution),
    GruMod(GruMod),
    Reverse(Reverse),
    GlobalNormFlipFlop(GlobalNormFlipFlop),
    GlobalNormFlipFlopCatMod(GlobalNormFlipFlopCatMod),
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Convolution(_) => LayerKind::Convolution,
            Layer::GruMod(_) => LayerKind::GruMod,
            Layer::Reverse(_) => LayerKind::Reverse,
            Layer::GlobalNormFlipFlop(_) => LayerKind::GlobalNormFlipFlop,
            Layer::GlobalNormFlipFlopCatMod(_) => LayerKind::GlobalNormFlipFlopCatMod,
        }
    }
    fn inner(&self) -> &dyn Parameterized {
        match self {
            Layer::Convolution(l) => l,
            Layer::GruMod(l) => l,
            Layer::Reverse(l) => l,
            Layer::GlobalNormFlipFlop(l) => l,
            Layer::GlobalNormFlipFlopCatMod(l) => l,
        }
    }
    fn inner_mut(&mut self) -> &mut dyn Parameterized {
        match self {
            Layer::Convolution(l) => l,
            Layer::GruMod(l) => l,
            Layer::Reverse(l) => l,
            Layer::GlobalNormFlipFlop(l) => l,
            Layer::GlobalNormFlipFlopCatMod(l) => l,
        }
    }
    /// Parameters in the canonical order.
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.inner().named_parameters()
    }
    pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.named_parameters()
            .into_iter()
            .map(|(name, t)| (name, t.shape().to_vec()))
            .collect()
    }
    /// Set all the parameters at once. Every name should be in `params` and no other name is allowed.
    /// The shapes should agree with the current ones. On error, the layer is left untouched.
    pub fn load_state_dict(&mut self, mut params: BTreeMap<String, Tensor>) -> Result<(), StateDictError> {
        let required = self.parameter_shapes();
        let missing: Vec<_> = required
            .iter()
            .filter(|(name, _)| !params.contains_key(name))
            .map(|(name, _)| name.clone())
            .collect();
        let unexpected: Vec<_> = params
            .keys()
            .filter(|name| required.iter().all(|(n, _)| n != *name))
            .cloned()
            .collect();
        let mismatched: Vec<_> = required
            .iter()
            .filter_map(|(name, shape)| {
                let found = params.get(name)?.shape();
                (found != shape.as_slice()).then(|| (name.clone(), shape.clone(), found.to_vec()))
            })
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() || !mismatched.is_empty() {
            return Err(StateDictError {
                missing,
                unexpected,
                mismatched,
            });
        }
        for (name, tensor) in self.inner_mut().named_parameters_mut() {
            if let Some(value) = params.remove(&name) {
                *tensor = value;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Layer::Convolution(l) => write!(
                f,
                "Convolution\t{}\t{}\twinlen:{}\tstride:{}\t{:?}",
                l.insize, l.size, l.winlen, l.stride, l.activation
            ),
            Layer::GruMod(l) => write!(f, "GruMod\t{}\t{}", l.insize, l.size),
            Layer::Reverse(l) => write!(f, "Reverse(GruMod)\t{}\t{}", l.layer.insize, l.layer.size),
            Layer::GlobalNormFlipFlop(l) => {
                write!(f, "GlobalNormFlipFlop\t{}\t{}\tnbase:{}", l.insize, l.size(), l.nbase)
            }
            Layer::GlobalNormFlipFlopCatMod(l) => write!(
                f,
                "GlobalNormFlipFlopCatMod\t{}\t{}\t{}",
                l.insize,
                l.size(),
                l.alphabet_info
            ),
        }
    }
}

/// Layers applied one after another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Serial {
    pub sublayers: Vec<Layer>,
}

impl Serial {
    pub fn new(sublayers: Vec<Layer>) -> Self {
        Self { sublayers }
    }
    /// Parameter names are prefixed by the position of the layer, e.g., `sublayers.1.cudnn_gru.weight_ih_l0`.
    pub fn parameter_shapes(&self) -> Vec<(String, Vec<usize>)> {
        self.sublayers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .parameter_shapes()
                    .into_iter()
                    .map(move |(name, shape)| (format!("sublayers.{}.{}", i, name), shape))
            })
            .collect()
    }
    pub fn summary(&self) -> String {
        let mut lines = vec![];
        for (i, layer) in self.sublayers.iter().enumerate() {
            lines.push(format!("{}\t{}", i, layer));
            for (name, shape) in layer.parameter_shapes() {
                lines.push(format!("\t{}\t{:?}", name, shape));
            }
        }
        lines.join("\n")
    }
}
