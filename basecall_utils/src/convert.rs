//! Rehydrate a JSON model into parameter-populated layers.
use crate::alphabet::{collapse_alphabet, AlphabetError, AlphabetInfo};
use crate::layers::*;
use crate::tensor::{Tensor, TensorError};
use definitions::{LayerDescriptor, ModelDescription, NestedArray, Sublayers};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Incompatible layer type(s) ({}) encountered.", .0.join(", "))]
    IncompatibleLayerTypes(Vec<String>),
    #[error("Incompatible convolutional layer activation function ({0}) encountered.")]
    IncompatibleActivation(String),
    #[error("Incompatible layer parameter type ({0}) encountered.")]
    IncompatibleParameter(String),
    #[error("{layer} layer lacks the field `{field}`")]
    MissingField { layer: String, field: &'static str },
    #[error("reverse layer should wrap exactly one layer, but {0} layers are given")]
    ReverseArity(usize),
    #[error("Output size {0} is not the size of any flip-flop layer")]
    FlipFlopSize(usize),
    #[error("Parameter {name}: {source}")]
    Tensor { name: String, source: TensorError },
    #[error(transparent)]
    Alphabet(#[from] AlphabetError),
    #[error(transparent)]
    StateDict(#[from] StateDictError),
    #[error("Invalid JSON model: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Checkpoint serialization failed: {0}")]
    Checkpoint(#[from] bincode::Error),
    #[error("Not a checkpoint file (magic: {0:?})")]
    Magic([u8; 8]),
    #[error("Unsupported checkpoint version {0}")]
    Version(u32),
}

pub trait ToNetwork {
    fn to_network(&self) -> Result<Serial, ConvertError>;
}

impl ToNetwork for ModelDescription {
    fn to_network(&self) -> Result<Serial, ConvertError> {
        check_layer_types(self)?;
        let sublayers = self
            .sublayers
            .iter()
            .map(parse_sublayer)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Serial::new(sublayers))
    }
}

/// Reject the model if any of the layers is not supported. No layer is constructed before this check.
pub fn check_layer_types(model: &ModelDescription) -> Result<(), ConvertError> {
    let mut incompatible: Vec<String> = model
        .layer_types()
        .into_iter()
        .filter(|tag| LayerKind::from_tag(tag).is_none())
        .map(|tag| tag.to_string())
        .collect();
    incompatible.sort();
    incompatible.dedup();
    match incompatible.is_empty() {
        true => Ok(()),
        false => Err(ConvertError::IncompatibleLayerTypes(incompatible)),
    }
}

fn field<T: Clone>(desc: &LayerDescriptor, value: &Option<T>, field: &'static str) -> Result<T, ConvertError> {
    value.clone().ok_or_else(|| ConvertError::MissingField {
        layer: desc.layer_type.clone(),
        field,
    })
}

/// Construct a layer from its descriptor and set its parameters.
pub fn parse_sublayer(desc: &LayerDescriptor) -> Result<Layer, ConvertError> {
    let kind = LayerKind::from_tag(&desc.layer_type)
        .ok_or_else(|| ConvertError::IncompatibleLayerTypes(vec![desc.layer_type.clone()]))?;
    let (mut layer, params) = match kind {
        LayerKind::Convolution => {
            let activation = field(desc, &desc.activation, "activation")?;
            let activation: Activation = activation
                .parse()
                .map_err(ConvertError::IncompatibleActivation)?;
            let insize = field(desc, &desc.insize, "insize")?;
            let size = field(desc, &desc.size, "size")?;
            let winlen = field(desc, &desc.winlen, "winlen")?;
            let stride = field(desc, &desc.stride, "stride")?;
            debug!(
                "LOAD\tConvolution\tinsize:{}\tsize:{}\twinlen:{}\tstride:{}",
                insize, size, winlen, stride
            );
            let conv = Convolution::new(insize, size, winlen, stride, activation);
            (Layer::Convolution(conv), &desc.params)
        }
        LayerKind::GruMod => {
            let insize = field(desc, &desc.insize, "insize")?;
            let size = field(desc, &desc.size, "size")?;
            debug!("LOAD\tGruMod\tinsize:{}\tsize:{}", insize, size);
            (Layer::GruMod(GruMod::new(insize, size)), &desc.params)
        }
        LayerKind::Reverse => {
            let inner = wrapped_layer(desc)?;
            if LayerKind::from_tag(&inner.layer_type) != Some(LayerKind::GruMod) {
                let tag = inner.layer_type.clone();
                return Err(ConvertError::IncompatibleLayerTypes(vec![tag]));
            }
            let insize = field(inner, &inner.insize, "insize")?;
            let size = field(inner, &inner.size, "size")?;
            debug!("LOAD\tReverse GruMod\tinsize:{}\tsize:{}", insize, size);
            let gru = GruMod::new(insize, size);
            (Layer::Reverse(Reverse::new(gru)), &inner.params)
        }
        LayerKind::GlobalNormFlipFlop => {
            let insize = field(desc, &desc.insize, "insize")?;
            let size = field(desc, &desc.size, "size")?;
            let nbase = nbase_flipflop(size).ok_or(ConvertError::FlipFlopSize(size))?;
            debug!("LOAD\tFlipFlop\tinsize:{}\tnbase:{}", insize, nbase);
            let flipflop = GlobalNormFlipFlop::new(insize, nbase);
            (Layer::GlobalNormFlipFlop(flipflop), &desc.params)
        }
        LayerKind::GlobalNormFlipFlopCatMod => {
            let insize = field(desc, &desc.insize, "insize")?;
            let output_alphabet = field(desc, &desc.output_alphabet, "output_alphabet")?;
            let can_nmods = field(desc, &desc.can_nmods, "can_nmods")?;
            let long_names = desc.modified_base_long_names.clone().unwrap_or_default();
            let collapse = collapse_alphabet(&output_alphabet, &can_nmods)?;
            let alphabet_info = AlphabetInfo::new(&output_alphabet, &collapse, &long_names)?;
            debug!(
                "LOAD\tFlipFlopCatMod\tinsize:{}\tmod bases:{:?}",
                insize,
                alphabet_info.mod_long_names()
            );
            let catmod = GlobalNormFlipFlopCatMod::new(insize, alphabet_info);
            if let Some(size) = desc.size.filter(|&size| size != catmod.size()) {
                warn!(
                    "The output size is {} but the alphabet implies {}",
                    size,
                    catmod.size()
                );
            }
            (Layer::GlobalNormFlipFlopCatMod(catmod), &desc.params)
        }
    };
    set_params(&mut layer, params)?;
    Ok(layer)
}

fn wrapped_layer(desc: &LayerDescriptor) -> Result<&LayerDescriptor, ConvertError> {
    match desc.sublayers.as_ref() {
        Some(Sublayers::One(inner)) => Ok(&**inner),
        Some(Sublayers::Many(inners)) if inners.len() == 1 => Ok(&inners[0]),
        Some(Sublayers::Many(inners)) => Err(ConvertError::ReverseArity(inners.len())),
        None => Err(ConvertError::MissingField {
            layer: desc.layer_type.clone(),
            field: "sublayers",
        }),
    }
}

enum Source {
    Supplied(Tensor),
    Retained,
}

fn to_tensor(name: &str, array: &NestedArray, concatenate: bool) -> Result<Tensor, ConvertError> {
    let tensor = Tensor::from_nested(array).and_then(|t| match concatenate {
        true => t.concatenate_groups(),
        false => Ok(t),
    });
    tensor.map_err(|source| ConvertError::Tensor {
        name: name.to_string(),
        source,
    })
}

// Guess the array for the parameter `name`.
// GRU weights are stored gate by gate and have to be stacked back.
fn resolve_param(name: &str, params: &BTreeMap<String, NestedArray>) -> Result<Source, ConvertError> {
    let tensor = if let Some(array) = params.get(name) {
        to_tensor(name, array, false)?
    } else if let (true, Some(array)) = (name.contains("weight_ih"), params.get("iW")) {
        to_tensor(name, array, true)?
    } else if let (true, Some(array)) = (name.contains("weight_hh"), params.get("sW")) {
        to_tensor(name, array, true)?
    } else if let (true, Some(array)) = (name.contains("bias_ih"), params.get("b")) {
        to_tensor(name, array, true)?
    } else if name.contains("bias_hh") {
        return Ok(Source::Retained);
    } else if let (true, Some(array)) = (name.contains("weight"), params.get("W")) {
        to_tensor(name, array, false)?
    } else if let (true, Some(array)) = (name.contains("bias"), params.get("b")) {
        to_tensor(name, array, false)?
    } else {
        return Err(ConvertError::IncompatibleParameter(name.to_string()));
    };
    Ok(Source::Supplied(tensor))
}

/// Set the parameters of `layer` from the serialized parameters.
pub fn set_params(layer: &mut Layer, params: &BTreeMap<String, NestedArray>) -> Result<(), ConvertError> {
    let mut state_dict = BTreeMap::new();
    for (name, current) in layer.named_parameters() {
        let tensor = match resolve_param(&name, params)? {
            Source::Supplied(tensor) => tensor,
            Source::Retained => current.clone(),
        };
        state_dict.insert(name, tensor);
    }
    let supplied: Vec<_> = state_dict
        .iter()
        .map(|(name, t)| (name.clone(), t.shape().to_vec()))
        .collect();
    if let Err(why) = layer.load_state_dict(state_dict) {
        error!("Failed to set the parameters of {}", layer);
        for (name, shape) in supplied.iter() {
            error!("SUPPLIED\t{}\t{:?}", name, shape);
        }
        for (name, shape) in layer.parameter_shapes() {
            error!("EXPECTED\t{}\t{:?}", name, shape);
        }
        return Err(why.into());
    }
    Ok(())
}

/// Convert the JSON model at `json_model` and write the checkpoint to `output`.
/// Nothing is written unless every layer is converted.
pub fn json_to_checkpoint<P: AsRef<Path>, Q: AsRef<Path>>(
    json_model: P,
    output: Q,
) -> Result<Serial, ConvertError> {
    debug!("Opening {}", json_model.as_ref().display());
    let reader = std::fs::File::open(json_model.as_ref()).map(std::io::BufReader::new)?;
    let model: ModelDescription = serde_json::from_reader(reader)?;
    debug!("Model\tLayers\t{}", model.sublayers.len());
    let network = model.to_network()?;
    crate::checkpoint::save(&network, output.as_ref())?;
    debug!("Wrote {}", output.as_ref().display());
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    fn matrix(rows: usize, cols: usize, offset: f64) -> NestedArray {
        (0..rows)
            .map(|i| {
                (0..cols)
                    .map(|j| offset + (i * cols + j) as f64)
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<_>>()
            .into()
    }
    fn vector(len: usize, value: f64) -> NestedArray {
        vec![value; len].into()
    }
    fn gru_params(insize: usize, size: usize) -> BTreeMap<String, NestedArray> {
        let mut params = BTreeMap::new();
        let iw: Vec<_> = (0..3).map(|g| matrix(size, insize, 100.0 * g as f64)).collect();
        let sw: Vec<_> = (0..3).map(|g| matrix(size, size, 10.0 * g as f64)).collect();
        let b: Vec<_> = (0..3).map(|g| vector(size, g as f64)).collect();
        params.insert("iW".to_string(), NestedArray::Array(iw));
        params.insert("sW".to_string(), NestedArray::Array(sw));
        params.insert("b".to_string(), NestedArray::Array(b));
        params
    }
    #[test]
    fn gru_params_are_stacked() {
        let mut layer = Layer::GruMod(GruMod::new(2, 3));
        set_params(&mut layer, &gru_params(2, 3)).unwrap();
        let params = layer.named_parameters();
        let (name, weight_ih) = &params[0];
        assert_eq!(name, "cudnn_gru.weight_ih_l0");
        assert_eq!(weight_ih.shape(), &[9, 2]);
        // The second gate starts at the fourth row.
        assert_eq!(weight_ih.data()[6], 100f32);
        let (_, bias_ih) = &params[2];
        assert_eq!(bias_ih.data(), &[0f32, 0f32, 0f32, 1f32, 1f32, 1f32, 2f32, 2f32, 2f32]);
        let (name, bias_hh) = &params[3];
        assert_eq!(name, "cudnn_gru.bias_hh_l0");
        assert!(bias_hh.data().iter().all(|&x| x == 0f32));
    }
    #[test]
    fn exact_name_takes_priority() {
        let mut layer = Layer::GruMod(GruMod::new(2, 3));
        let mut params = gru_params(2, 3);
        params.insert("cudnn_gru.bias_hh_l0".to_string(), vector(9, 7.0));
        set_params(&mut layer, &params).unwrap();
        let bias_hh = layer.named_parameters()[3].1.clone();
        assert!(bias_hh.data().iter().all(|&x| x == 7f32));
    }
    #[test]
    fn missing_parameter() {
        let mut layer = Layer::GruMod(GruMod::new(2, 3));
        let mut params = gru_params(2, 3);
        params.remove("sW");
        match set_params(&mut layer, &params) {
            Err(ConvertError::IncompatibleParameter(name)) => {
                assert_eq!(name, "cudnn_gru.weight_hh_l0")
            }
            x => panic!("{:?}", x),
        }
    }
    #[test]
    fn shape_mismatch() {
        let mut layer = Layer::Convolution(Convolution::new(1, 2, 3, 1, Activation::Tanh));
        let mut params = BTreeMap::new();
        params.insert("W".to_string(), matrix(2, 3, 0.0));
        params.insert("b".to_string(), vector(2, 0.0));
        match set_params(&mut layer, &params) {
            Err(ConvertError::StateDict(err)) => {
                assert_eq!(err.mismatched.len(), 1);
                assert_eq!(err.mismatched[0].0, "conv.weight");
            }
            x => panic!("{:?}", x),
        }
    }
    fn conv_desc(activation: &str) -> LayerDescriptor {
        let mut desc = LayerDescriptor::new("convolution");
        desc.insize = Some(1);
        desc.size = Some(2);
        desc.winlen = Some(3);
        desc.stride = Some(1);
        desc.activation = Some(activation.to_string());
        let w: Vec<_> = (0..2).map(|i| matrix(1, 3, i as f64)).collect();
        desc.params.insert("W".to_string(), NestedArray::Array(w));
        desc.params.insert("b".to_string(), vector(2, 0.1));
        desc
    }
    #[test]
    fn convolution_activation() {
        assert!(matches!(
            parse_sublayer(&conv_desc("tanh")),
            Ok(Layer::Convolution(_))
        ));
        match parse_sublayer(&conv_desc("relu")) {
            Err(ConvertError::IncompatibleActivation(act)) => assert_eq!(act, "relu"),
            x => panic!("{:?}", x),
        }
    }
    #[test]
    fn reverse_layer() {
        let mut inner = LayerDescriptor::new("GruMod");
        inner.insize = Some(2);
        inner.size = Some(3);
        inner.params = gru_params(2, 3);
        let mut desc = LayerDescriptor::new("reverse");
        desc.sublayers = Some(Sublayers::One(Box::new(inner.clone())));
        let layer = parse_sublayer(&desc).unwrap();
        assert_eq!(layer.kind(), LayerKind::Reverse);
        assert_eq!(layer.named_parameters()[0].0, "layer.cudnn_gru.weight_ih_l0");
        desc.sublayers = Some(Sublayers::Many(vec![inner.clone()]));
        assert!(parse_sublayer(&desc).is_ok());
        desc.sublayers = Some(Sublayers::Many(vec![inner.clone(), inner]));
        assert!(matches!(
            parse_sublayer(&desc),
            Err(ConvertError::ReverseArity(2))
        ));
        desc.sublayers = Some(Sublayers::One(Box::new(conv_desc("tanh"))));
        assert!(matches!(
            parse_sublayer(&desc),
            Err(ConvertError::IncompatibleLayerTypes(_))
        ));
    }
    #[test]
    fn flipflop_layers() {
        let mut desc = LayerDescriptor::new("GlobalNormTwoState");
        desc.insize = Some(3);
        desc.size = Some(40);
        desc.params.insert("W".to_string(), matrix(40, 3, 0.0));
        desc.params.insert("b".to_string(), vector(40, 0.0));
        match parse_sublayer(&desc).unwrap() {
            Layer::GlobalNormFlipFlop(layer) => assert_eq!(layer.nbase, 4),
            x => panic!("{:?}", x),
        }
        desc.size = Some(41);
        assert!(matches!(
            parse_sublayer(&desc),
            Err(ConvertError::FlipFlopSize(41))
        ));
        let mut desc = LayerDescriptor::new("GlobalNormTwoStateCatMod");
        desc.insize = Some(3);
        desc.size = Some(45);
        desc.output_alphabet = Some("AZCGT".to_string());
        desc.can_nmods = Some(vec![1, 0, 0, 0]);
        desc.modified_base_long_names = Some(vec!["6mA".to_string()]);
        desc.params.insert("W".to_string(), matrix(45, 3, 0.0));
        desc.params.insert("b".to_string(), vector(45, 0.0));
        match parse_sublayer(&desc).unwrap() {
            Layer::GlobalNormFlipFlopCatMod(layer) => {
                assert_eq!(layer.alphabet_info.collapse_alphabet(), "AACGT");
                assert_eq!(layer.alphabet_info.mod_bases(), "Z");
            }
            x => panic!("{:?}", x),
        }
    }
    #[test]
    fn incompatible_types_are_listed() {
        let model = ModelDescription {
            sublayers: vec![
                LayerDescriptor::new("bogus"),
                conv_desc("tanh"),
                LayerDescriptor::new("lstm"),
                LayerDescriptor::new("bogus"),
            ],
        };
        match model.to_network() {
            Err(ConvertError::IncompatibleLayerTypes(types)) => {
                assert_eq!(types, vec!["bogus".to_string(), "lstm".to_string()])
            }
            x => panic!("{:?}", x),
        }
        let err = check_layer_types(&model).unwrap_err();
        assert_eq!(
            format!("{}", err),
            "Incompatible layer type(s) (bogus, lstm) encountered."
        );
    }
    #[test]
    fn json_file_to_checkpoint() {
        let mut gru = LayerDescriptor::new("GruMod");
        gru.insize = Some(2);
        gru.size = Some(3);
        gru.params = gru_params(2, 3);
        let mut reverse = LayerDescriptor::new("reverse");
        reverse.sublayers = Some(Sublayers::Many(vec![gru.clone()]));
        let mut output = LayerDescriptor::new("GlobalNormTwoState");
        output.insize = Some(3);
        output.size = Some(40);
        output.params.insert("W".to_string(), matrix(40, 3, 0.0));
        output.params.insert("b".to_string(), vector(40, 0.0));
        let mut model = ModelDescription {
            sublayers: vec![conv_desc("tanh"), gru, reverse, output],
        };
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("model.json");
        let out = dir.path().join("model.checkpoint");
        std::fs::write(&json, serde_json::to_string(&model).unwrap()).unwrap();
        let network = json_to_checkpoint(&json, &out).unwrap();
        let loaded = crate::checkpoint::load(&out).unwrap();
        let kinds: Vec<_> = loaded.sublayers.iter().map(|l| l.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Convolution,
                LayerKind::GruMod,
                LayerKind::Reverse,
                LayerKind::GlobalNormFlipFlop
            ]
        );
        assert_eq!(loaded.parameter_shapes(), network.parameter_shapes());
        assert_eq!(loaded, network);
        // A bogus layer leaves no output behind.
        model.sublayers.push(LayerDescriptor::new("bogus"));
        std::fs::write(&json, serde_json::to_string(&model).unwrap()).unwrap();
        let out = dir.path().join("bogus.checkpoint");
        assert!(matches!(
            json_to_checkpoint(&json, &out),
            Err(ConvertError::IncompatibleLayerTypes(_))
        ));
        assert!(!out.exists());
    }
}
