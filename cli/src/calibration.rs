//! Calibration run -- from FASTQ files and an alignment summary to the shift and the scale of the q-scores.
use basecall_utils::alignment_summary::read_alignment_summary;
use basecall_utils::calibration::*;
use basecall_utils::filter::filter_data;
use basecall_utils::merge::merge_align_fastq_data;
use basecall_utils::plot::plot_calibration;
use basecall_utils::qscore::read_fastqs;
use basecall_utils::regression::LinearFit;
use log::*;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The parameters of a calibration run.
/// A profile can set any subset of them; the rest take the default values.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub alignment_summary: Option<PathBuf>,
    /// Reads with (alignment length)/(basecall length) at or below this value are removed.
    pub coverage_threshold: f64,
    /// Upper bound of the q-score computed from an alignment accuracy.
    pub max_alignment_score: f64,
    pub min_fastqscore: f64,
    pub fastq: Option<PathBuf>,
    pub input_directory: Option<PathBuf>,
    pub maxreads: Option<usize>,
    pub plot_title: Option<String>,
    pub plot_filename: PathBuf,
    pub per_read_tsv: Option<PathBuf>,
}

impl std::default::Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            alignment_summary: None,
            coverage_threshold: 0.8,
            max_alignment_score: 40.0,
            min_fastqscore: 7.0,
            fastq: None,
            input_directory: None,
            maxreads: None,
            plot_title: None,
            plot_filename: PathBuf::from("qscore_calibration.png"),
            per_read_tsv: None,
        }
    }
}

impl CalibrationConfig {
    pub fn from_profile<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::read_to_string(path)?;
        toml::from_str(&file)
            .map_err(|why| std::io::Error::new(std::io::ErrorKind::InvalidData, why))
    }
    /// Build the configuration from the profile (if `--profile` is given) and the command-line arguments.
    pub fn from_matches(matches: &clap::ArgMatches) -> std::io::Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("profile") {
            Some(profile) => {
                debug!("Loading {}", profile.display());
                Self::from_profile(profile)?
            }
            None => Self::default(),
        };
        config.update(matches);
        Ok(config)
    }
    fn update(&mut self, matches: &clap::ArgMatches) {
        let path = |name: &str| matches.get_one::<PathBuf>(name).cloned();
        let float = |name: &str| matches.get_one::<f64>(name).copied();
        if let Some(summary) = path("alignment_summary") {
            self.alignment_summary = Some(summary);
        }
        if let Some(threshold) = float("coverage_threshold") {
            self.coverage_threshold = threshold;
        }
        if let Some(score) = float("max_alignment_score") {
            self.max_alignment_score = score;
        }
        if let Some(score) = float("min_fastqscore") {
            self.min_fastqscore = score;
        }
        if let Some(fastq) = path("fastq") {
            self.fastq = Some(fastq);
        }
        if let Some(dir) = path("input_directory") {
            self.input_directory = Some(dir);
        }
        if let Some(&maxreads) = matches.get_one::<usize>("maxreads") {
            self.maxreads = Some(maxreads);
        }
        if let Some(title) = matches.get_one::<String>("plot_title") {
            self.plot_title = Some(title.clone());
        }
        if let Some(filename) = path("plot_filename") {
            self.plot_filename = filename;
        }
        if let Some(tsv) = path("per_read_tsv") {
            self.per_read_tsv = Some(tsv);
        }
    }
}

/// Run the whole calibration and write the diagnostics and the fit to `wtr`.
pub fn run_calibration<W: Write>(
    config: &CalibrationConfig,
    mut wtr: W,
) -> Result<LinearFit, CalibrationError> {
    debug!("START\tCalibration");
    let inputs = resolve_inputs(
        config.input_directory.as_deref(),
        config.fastq.as_deref(),
        config.alignment_summary.as_deref(),
    )?;
    let reads = read_fastqs(&inputs.fastqs, config.maxreads)?;
    let alignments = read_alignment_summary(&inputs.alignment_summary)?;
    let (joined, merge_report) = merge_align_fastq_data(&reads, &alignments);
    writeln!(wtr, "{}", merge_report)?;
    if let Some(path) = config.per_read_tsv.as_ref() {
        let file = std::fs::File::create(path).map(BufWriter::new)?;
        write_per_read_tsv(file, &joined)?;
        info!("Wrote the per-read table to {}", path.display());
    }
    let (points, filter_report) =
        filter_data(&joined, config.coverage_threshold, config.min_fastqscore);
    writeln!(wtr, "{}", filter_report)?;
    let (pairs, fit) = single_read_accuracy_fit(&points, config.max_alignment_score)?;
    writeln!(wtr, "Best-fit slope (qscore_scale) = {:3.4}", fit.slope)?;
    writeln!(wtr, "Best-fit shift (qscore_shift) = {:3.4}", fit.intercept)?;
    plot_calibration(
        &config.plot_filename,
        &pairs,
        &fit,
        config.plot_title.as_deref(),
    )?;
    writeln!(wtr, "Saved plot to {}", config.plot_filename.display())?;
    Ok(fit)
}
