//! Alignment summaries -- accuracy and aligned length of each alignment.
//!
//! Two layouts are accepted. Both are whitespace-separated tables with a header line.
//! A read can appear more than once, as there can be more than one alignment for it.
use crate::calibration::CalibrationError;
use definitions::AlignmentRecord;
use std::io::BufRead;
use std::path::Path;

/// Columns of the summary written by the basecaller.
pub const BASECALLER_COLUMNS: [&str; 4] = [
    "read_id",
    "alignment_accuracy",
    "alignment_strand_end",
    "alignment_strand_start",
];

/// Columns of the per-alignment accuracy table (`.samacc`).
pub const SAMACC_COLUMNS: [&str; 6] = [
    "query",
    "accuracy",
    "reference_end",
    "reference_start",
    "insertion",
    "deletion",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySchema {
    /// Length is `alignment_strand_end - alignment_strand_start`. Negative accuracies mean unaligned.
    Basecaller,
    /// Length is `reference_end - reference_start + insertion - deletion`.
    Samacc,
}

impl SummarySchema {
    fn columns(&self) -> &'static [&'static str] {
        match self {
            SummarySchema::Basecaller => &BASECALLER_COLUMNS,
            SummarySchema::Samacc => &SAMACC_COLUMNS,
        }
    }
    /// Decide the layout by the header. The basecaller's layout is tried first.
    pub fn detect(header: &[String]) -> Option<Self> {
        [SummarySchema::Basecaller, SummarySchema::Samacc]
            .into_iter()
            .find(|schema| {
                schema
                    .columns()
                    .iter()
                    .all(|col| header.iter().any(|h| h == col))
            })
    }
}

pub fn read_alignment_summary<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<AlignmentRecord>, CalibrationError> {
    let path = path.as_ref();
    debug!("Opening {}", path.display());
    let reader = std::fs::File::open(path).map(std::io::BufReader::new)?;
    let (schema, records) = parse_alignment_summary(reader, path)?;
    info!(
        "Interpreted {} as {:?} alignment summary ({} alignments)",
        path.display(),
        schema,
        records.len()
    );
    Ok(records)
}

/// Parse an alignment summary. `path` is only used in error messages.
pub fn parse_alignment_summary<R: BufRead>(
    reader: R,
    path: &Path,
) -> Result<(SummarySchema, Vec<AlignmentRecord>), CalibrationError> {
    let mut lines = reader.lines().enumerate();
    let header: Vec<String> = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line.split_whitespace().map(|x| x.to_string()).collect();
                }
            }
            None => return Err(CalibrationError::EmptySummary(path.to_path_buf())),
        }
    };
    let schema = SummarySchema::detect(&header).ok_or_else(|| CalibrationError::AlignmentSchema {
        found: header.clone(),
    })?;
    let index: Vec<usize> = schema
        .columns()
        .iter()
        .filter_map(|col| header.iter().position(|h| h == col))
        .collect();
    let mut records = vec![];
    for (lineno, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != header.len() {
            return Err(CalibrationError::AlignmentFields {
                path: path.to_path_buf(),
                line: lineno + 1,
                expected: header.len(),
                found: fields.len(),
            });
        }
        let number = |i: usize| -> Result<f64, CalibrationError> {
            let value = fields[index[i]];
            value
                .parse::<f64>()
                .map_err(|_| CalibrationError::AlignmentValue {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    column: schema.columns()[i].to_string(),
                    value: value.to_string(),
                })
        };
        let read_id = fields[index[0]].to_string();
        let accuracy = number(1)?;
        let (accuracy, length) = match schema {
            SummarySchema::Basecaller => {
                let accuracy = Some(accuracy).filter(|&acc| 0f64 <= acc);
                (accuracy, number(2)? - number(3)?)
            }
            SummarySchema::Samacc => {
                let accuracy = Some(accuracy).filter(|acc| !acc.is_nan());
                (accuracy, number(2)? - number(3)? + number(4)? - number(5)?)
            }
        };
        let alignment_length = match length.is_finite() {
            true => length as i64,
            false => -1,
        };
        records.push(AlignmentRecord {
            read_id,
            accuracy,
            alignment_length,
        });
    }
    Ok((schema, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    fn parse(text: &str) -> Result<(SummarySchema, Vec<AlignmentRecord>), CalibrationError> {
        parse_alignment_summary(text.as_bytes(), Path::new("test.txt"))
    }
    #[test]
    fn basecaller_summary() {
        let text = "filename\tread_id\talignment_genome\talignment_strand_start\talignment_strand_end\talignment_accuracy\n\
                    a.fast5\tr1\tchr1\t10\t110\t0.95\n\
                    a.fast5\tr2\t*\t-1\t-1\t-1.0\n\
                    a.fast5\tr3\tchr2\t0\t50\tnan\n";
        let (schema, records) = parse(text).unwrap();
        assert_eq!(schema, SummarySchema::Basecaller);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].read_id, "r1");
        assert_eq!(records[0].accuracy, Some(0.95));
        assert_eq!(records[0].alignment_length, 100);
        assert_eq!(records[1].accuracy, None);
        assert_eq!(records[1].alignment_length, 0);
        assert_eq!(records[2].accuracy, None);
    }
    #[test]
    fn samacc_summary() {
        let text = "query reference strand match mismatch insertion deletion coverage id accuracy reference_start reference_end\n\
                    r1 chr1 + 90 5 3 2 0.9 0.9 0.89 100 200\n\
                    \n\
                    r1 chr2 - 80 5 3 12 0.9 0.9 0.79 300 400\n";
        let (schema, records) = parse(text).unwrap();
        assert_eq!(schema, SummarySchema::Samacc);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].accuracy, Some(0.89));
        assert_eq!(records[0].alignment_length, 101);
        assert_eq!(records[1].alignment_length, 91);
    }
    #[test]
    fn both_schemas_prefer_basecaller() {
        let text = "read_id alignment_accuracy alignment_strand_end alignment_strand_start query accuracy reference_end reference_start insertion deletion\n\
                    r1 0.5 20 10 q 0.9 100 0 0 0\n";
        let (schema, records) = parse(text).unwrap();
        assert_eq!(schema, SummarySchema::Basecaller);
        assert_eq!(records[0].accuracy, Some(0.5));
        assert_eq!(records[0].alignment_length, 10);
    }
    #[test]
    fn unknown_schema() {
        let text = "name acc start end\nr1 0.9 0 10\n";
        match parse(text) {
            Err(CalibrationError::AlignmentSchema { found }) => {
                assert_eq!(found, vec!["name", "acc", "start", "end"]);
            }
            x => panic!("{:?}", x),
        }
        let message = format!("{}", parse(text).unwrap_err());
        assert!(message.contains("alignment_strand_start"));
        assert!(message.contains("insertion"));
        assert!(message.contains("acc"));
    }
    #[test]
    fn malformed_lines() {
        let text = "read_id alignment_accuracy alignment_strand_end alignment_strand_start\nr1 0.9 10\n";
        assert!(matches!(
            parse(text),
            Err(CalibrationError::AlignmentFields { line: 2, .. })
        ));
        let text = "read_id alignment_accuracy alignment_strand_end alignment_strand_start\nr1 high 10 0\n";
        assert!(matches!(
            parse(text),
            Err(CalibrationError::AlignmentValue { line: 2, .. })
        ));
        assert!(matches!(
            parse("\n\n"),
            Err(CalibrationError::EmptySummary(_))
        ));
    }
}
