//! Per-read q-scores of basecalls.
use crate::calibration::CalibrationError;
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_reader;
use definitions::BasecallRead;
use std::path::Path;

pub const PHRED_OFFSET: u8 = 33;
const READS_PER_REPORT: usize = 100;

/// Average q-score of a read, computed in the probability space.
/// In other words, it is the q-score of the expected proportion of errors in the read.
/// None if the read is empty.
pub fn mean_qscore(qualities: &[u8]) -> Option<f64> {
    if qualities.is_empty() {
        return None;
    }
    let error_sum: f64 = qualities
        .iter()
        .map(|&q| 10f64.powf(-(q as f64) / 10f64))
        .sum();
    let mean_error = error_sum / qualities.len() as f64;
    Some(-10f64 * mean_error.log10())
}

/// Phred+33 encoded qualities into q-scores.
pub fn decode_qualities(encoded: &[u8]) -> Vec<u8> {
    encoded.iter().map(|q| q.saturating_sub(PHRED_OFFSET)).collect()
}

// The id is the header up to the first whitespace.
fn read_id(header: &[u8]) -> String {
    let id = header
        .split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or(header);
    String::from_utf8_lossy(id).to_string()
}

/// Read the FASTQ files in the given order and summarize each record.
/// An empty record is kept, with no mean q-score. An empty file has no records.
/// Stop as soon as `max_reads` reads are collected.
pub fn read_fastqs<P: AsRef<Path>>(
    files: &[P],
    max_reads: Option<usize>,
) -> Result<Vec<BasecallRead>, CalibrationError> {
    let mut reads = vec![];
    let reached = |reads: &Vec<BasecallRead>| max_reads.map_or(false, |max| max <= reads.len());
    for file in files.iter().map(|f| f.as_ref()) {
        if reached(&reads) {
            break;
        }
        debug!("Opening {}", file.display());
        let fastq_error = |source| CalibrationError::Fastq {
            path: file.to_path_buf(),
            source,
        };
        let mut reader = match parse_fastx_reader(std::fs::File::open(file)?) {
            Ok(reader) => reader,
            Err(why) if matches!(why.kind, ParseErrorKind::EmptyFile) => {
                warn!("{} is empty", file.display());
                continue;
            }
            Err(why) => return Err(fastq_error(why)),
        };
        while let Some(record) = reader.next() {
            let record = record.map_err(fastq_error)?;
            let qualities = decode_qualities(record.qual().unwrap_or(&[]));
            reads.push(BasecallRead {
                read_id: read_id(record.id()),
                basecall_length: qualities.len(),
                mean_qscore: mean_qscore(&qualities),
            });
            if reads.len() % READS_PER_REPORT == 0 {
                debug!("Fastq\tReadNum\t{}", reads.len());
            }
            if reached(&reads) {
                info!("Reached the maximum number of reads ({})", reads.len());
                break;
            }
        }
    }
    Ok(reads)
}
