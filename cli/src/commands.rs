use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

pub fn json_to_checkpoint_parser() -> Command {
    Command::new("json_to_checkpoint")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Convert a JSON model into a checkpoint file.")
        .arg(verbose())
        .arg(
            Arg::new("json_model")
                .value_name("JSON_MODEL")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON model file."),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("PATH")
                .default_value("model.checkpoint")
                .value_parser(value_parser!(PathBuf))
                .help("Output checkpoint file."),
        )
}

// No default values here, so that a value missing from the command line falls back to the profile.
pub fn calibrate_qscores_parser() -> Command {
    Command::new("calibrate_qscores")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Calculate shift and scale factors for the per-read q-scores from the alignment accuracies.")
        .arg(verbose())
        .arg(
            Arg::new("alignment_summary")
                .long("alignment_summary")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Input alignment summary. [default: alignment_summary.txt in the input directory]"),
        )
        .arg(
            Arg::new("coverage_threshold")
                .long("coverage_threshold")
                .value_name("FLOAT")
                .value_parser(value_parser!(f64))
                .help("Exclude reads with coverage at or below this value. [default: 0.8]"),
        )
        .arg(
            Arg::new("max_alignment_score")
                .long("max_alignment_score")
                .value_name("FLOAT")
                .value_parser(value_parser!(f64))
                .help("Exclude reads with alignment score above this value. [default: 40.0]"),
        )
        .arg(
            Arg::new("min_fastqscore")
                .long("min_fastqscore")
                .value_name("FLOAT")
                .value_parser(value_parser!(f64))
                .help("Exclude reads with fastq score below this value. [default: 7.0]"),
        )
        .arg(
            Arg::new("fastq")
                .long("fastq")
                .value_name("FASTQ")
                .value_parser(value_parser!(PathBuf))
                .help("Fastq file to read. Overrides the input directory."),
        )
        .arg(
            Arg::new("input_directory")
                .long("input_directory")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory containing fastq files and alignment_summary.txt."),
        )
        .arg(
            Arg::new("maxreads")
                .long("maxreads")
                .value_name("NUM")
                .value_parser(value_parser!(usize))
                .help("Maximum number of reads to read."),
        )
        .arg(
            Arg::new("plot_title")
                .long("plot_title")
                .value_name("TITLE")
                .help("Title of the plot."),
        )
        .arg(
            Arg::new("plot_filename")
                .long("plot_filename")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("File to save the plot. The format follows the extension (png or svg). [default: qscore_calibration.png]"),
        )
        .arg(
            Arg::new("per_read_tsv")
                .long("per_read_tsv")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Write the joined per-read table to this file."),
        )
        .arg(
            Arg::new("profile")
                .long("profile")
                .value_name("TOML")
                .value_parser(value_parser!(PathBuf))
                .help("TOML file of the parameters. Command-line arguments override it."),
        )
}
