//! Checkpoint -- a single [Serial](crate::layers::Serial) network in a file.
//!
//! The file starts with the 8 byte magic `BCNNCKPT`, followed by the bincode encoding of the version and the network.
use crate::convert::ConvertError;
use crate::layers::Serial;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

pub const CHECKPOINT_MAGIC: [u8; 8] = *b"BCNNCKPT";
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Serialize)]
struct CheckpointRef<'a> {
    version: u32,
    network: &'a Serial,
}

#[derive(Deserialize)]
struct Checkpoint {
    version: u32,
    network: Serial,
}

pub fn to_bytes(network: &Serial) -> Result<Vec<u8>, ConvertError> {
    let checkpoint = CheckpointRef {
        version: CHECKPOINT_VERSION,
        network,
    };
    let mut bytes = CHECKPOINT_MAGIC.to_vec();
    bincode::serialize_into(&mut bytes, &checkpoint)?;
    Ok(bytes)
}

/// Write `network` to `path`. The file is created only after the whole checkpoint is encoded.
pub fn save<P: AsRef<Path>>(network: &Serial, path: P) -> Result<(), ConvertError> {
    let bytes = to_bytes(network)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn from_reader<R: Read>(mut reader: R) -> Result<Serial, ConvertError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if magic != CHECKPOINT_MAGIC {
        return Err(ConvertError::Magic(magic));
    }
    let checkpoint: Checkpoint = bincode::deserialize_from(reader)?;
    if checkpoint.version != CHECKPOINT_VERSION {
        return Err(ConvertError::Version(checkpoint.version));
    }
    Ok(checkpoint.network)
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Serial, ConvertError> {
    let reader = std::fs::File::open(path).map(std::io::BufReader::new)?;
    from_reader(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::*;
    #[test]
    fn bytes_round_trip() {
        let network = Serial::new(vec![
            Layer::Convolution(Convolution::new(1, 4, 5, 2, Activation::Tanh)),
            Layer::Reverse(Reverse::new(GruMod::new(4, 4))),
            Layer::GlobalNormFlipFlop(GlobalNormFlipFlop::new(4, 4)),
        ]);
        let bytes = to_bytes(&network).unwrap();
        assert_eq!(&bytes[..8], &CHECKPOINT_MAGIC);
        let loaded = from_reader(bytes.as_slice()).unwrap();
        assert_eq!(loaded, network);
    }
    #[test]
    fn wrong_magic() {
        let bytes = b"NOTACKPT and some more bytes".to_vec();
        assert!(matches!(
            from_reader(bytes.as_slice()),
            Err(ConvertError::Magic(_))
        ));
    }
}
