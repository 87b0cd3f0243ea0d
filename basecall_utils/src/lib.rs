//! Utilities around a nanopore basecaller:
//! converting a JSON model into a checkpoint, and calibrating per-read q-scores against alignments.
pub mod alignment_summary;
pub mod alphabet;
pub mod calibration;
pub mod checkpoint;
pub mod convert;
pub mod filter;
pub mod layers;
pub mod merge;
pub mod plot;
pub mod qscore;
pub mod regression;
pub mod tensor;
#[macro_use]
extern crate log;
