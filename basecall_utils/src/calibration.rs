//! Calibration -- fit the per-read accuracy estimated from q-scores to the one measured by alignments.
//!
//! The empirical q-score of a read is `-10 log10(1 - accuracy)`, and it is regressed on the mean q-score of the basecall:
//!
//!```text
//! qscore(accuracy) ~ slope * mean_qscore + intercept
//!```
use crate::alignment_summary::{BASECALLER_COLUMNS, SAMACC_COLUMNS};
use crate::filter::CalibrationPoint;
use crate::regression::{HuberRegression, LinearFit, RegressionError};
use definitions::JoinedRead;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const FASTQ_EXTENSION: &str = "fastq";
pub const ALIGNMENT_SUMMARY_NAME: &str = "alignment_summary.txt";

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("You must supply a directory containing fastqs or the path to a fastq file")]
    NoFastqInput,
    #[error("No fastq files found in {}", .0.display())]
    NoFastqFiles(PathBuf),
    #[error("No alignment summary is given. Supply one, or a directory containing {}", ALIGNMENT_SUMMARY_NAME)]
    NoAlignmentSummary,
    #[error("Alignment summary {} is empty", .0.display())]
    EmptySummary(PathBuf),
    #[error(
        "Alignment summary file must contain either columns ({}) or ({}). Columns are {:?}",
        BASECALLER_COLUMNS.join(", "),
        SAMACC_COLUMNS.join(", "),
        .found
    )]
    AlignmentSchema { found: Vec<String> },
    #[error("{}:{}: expected {} fields but found {}", .path.display(), .line, .expected, .found)]
    AlignmentFields {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{}:{}: can not parse {} as {}", .path.display(), .line, .value, .column)]
    AlignmentValue {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
    },
    #[error("Failed to parse {}: {}", .path.display(), .source)]
    Fastq {
        path: PathBuf,
        source: needletail::errors::ParseError,
    },
    #[error("Failed to draw {}: {}", .path.display(), .message)]
    Plot { path: PathBuf, message: String },
    #[error(transparent)]
    Regression(#[from] RegressionError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Files to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationInputs {
    pub fastqs: Vec<PathBuf>,
    pub alignment_summary: PathBuf,
}

/// List `*.fastq` in `dir`, sorted by name.
pub fn list_fastqs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, CalibrationError> {
    let mut fastqs = vec![];
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == FASTQ_EXTENSION) {
            fastqs.push(path);
        }
    }
    fastqs.sort();
    Ok(fastqs)
}

/// Decide the input files.
/// An explicit FASTQ file overrides the files in the directory,
/// and an explicit alignment summary overrides the one in the directory.
pub fn resolve_inputs(
    input_directory: Option<&Path>,
    fastq: Option<&Path>,
    alignment_summary: Option<&Path>,
) -> Result<CalibrationInputs, CalibrationError> {
    let mut fastqs = None;
    let mut summary = None;
    if let Some(dir) = input_directory {
        let files = list_fastqs(dir)?;
        if files.is_empty() {
            return Err(CalibrationError::NoFastqFiles(dir.to_path_buf()));
        }
        info!(
            "Getting q scores for {} fastq files from {}",
            files.len(),
            dir.display()
        );
        fastqs = Some(files);
        summary = Some(dir.join(ALIGNMENT_SUMMARY_NAME));
    }
    if let Some(fastq) = fastq {
        if fastqs.is_some() {
            warn!("Command-line argument fastq overrides directory list");
        }
        info!("Calculating average q scores for {}", fastq.display());
        fastqs = Some(vec![fastq.to_path_buf()]);
    }
    if let Some(path) = alignment_summary {
        info!("Using alignment summary file at {}", path.display());
        summary = Some(path.to_path_buf());
    }
    let fastqs = fastqs.ok_or(CalibrationError::NoFastqInput)?;
    let alignment_summary = summary.ok_or(CalibrationError::NoAlignmentSummary)?;
    Ok(CalibrationInputs {
        fastqs,
        alignment_summary,
    })
}

/// q-score of an accuracy, clamped above at `max_score`. A perfect alignment gets `max_score`.
pub fn empirical_qscore(accuracy: f64, max_score: f64) -> f64 {
    let score = -10f64 * (1f64 - accuracy).log10();
    score.min(max_score)
}

/// Pairs of (mean q-score, empirical q-score) of the reads.
pub fn calibration_pairs(points: &[CalibrationPoint], max_alignment_score: f64) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|p| (p.mean_qscore, empirical_qscore(p.accuracy, max_alignment_score)))
        .collect()
}

/// Regress the empirical q-scores of the reads on their mean q-scores.
pub fn single_read_accuracy_fit(
    points: &[CalibrationPoint],
    max_alignment_score: f64,
) -> Result<(Vec<(f64, f64)>, LinearFit), CalibrationError> {
    let pairs = calibration_pairs(points, max_alignment_score);
    let (xs, ys): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
    let fit = HuberRegression::default().fit(&xs, &ys)?;
    debug!(
        "FIT\tIntercept\t{}\tSlope\t{}\tScale\t{}\tIterations\t{}",
        fit.intercept, fit.slope, fit.scale, fit.iterations
    );
    Ok((pairs, fit))
}

/// Dump the joined table as a TSV with a header.
pub fn write_per_read_tsv<W: Write>(mut wtr: W, reads: &[JoinedRead]) -> std::io::Result<()> {
    writeln!(
        wtr,
        "read_id\tbasecall_length\tmean_qscore\taccuracy\talignment_length"
    )?;
    for read in reads.iter() {
        writeln!(wtr, "{}", read)?;
    }
    wtr.flush()
}
