//! Remove unaligned, poorly covered, and low quality reads before the regression.
use definitions::JoinedRead;

/// Number of reads remaining after each filter. Each count includes the filters before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterReport {
    pub total: usize,
    pub aligned: usize,
    pub covered: usize,
    pub passed: usize,
    pub min_coverage: f64,
    pub min_fastqscore: f64,
}

impl std::fmt::Display for FilterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Total number of reads = {}", self.total)?;
        writeln!(f, "    After removing those not aligned: {}", self.aligned)?;
        writeln!(
            f,
            "    After also removing coverage <= {:3.2}: {}",
            self.min_coverage, self.covered
        )?;
        write!(
            f,
            "    After also removing fastq score < {:3.1}: {}",
            self.min_fastqscore, self.passed
        )
    }
}

/// A read kept for the regression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub accuracy: f64,
    pub mean_qscore: f64,
}

/// Filter reads where
/// - the accuracy is missing (unaligned),
/// - the coverage, (aligned length)/(basecall length), is less than or equal to `min_coverage`,
/// - the mean q-score is less than `min_fastqscore` or missing.
///
/// Empty basecalls have no coverage and are removed by the second filter.
pub fn filter_data(
    reads: &[JoinedRead],
    min_coverage: f64,
    min_fastqscore: f64,
) -> (Vec<CalibrationPoint>, FilterReport) {
    let aligned: Vec<(&JoinedRead, f64)> = reads
        .iter()
        .filter_map(|r| r.accuracy.map(|acc| (r, acc)))
        .collect();
    let covered: Vec<_> = aligned
        .iter()
        .filter(|(r, _)| r.coverage().map_or(false, |cov| min_coverage < cov))
        .collect();
    let passed: Vec<_> = covered
        .iter()
        .filter_map(|&&(r, accuracy)| {
            let mean_qscore = r.mean_qscore.filter(|&q| min_fastqscore <= q)?;
            Some(CalibrationPoint {
                accuracy,
                mean_qscore,
            })
        })
        .collect();
    let report = FilterReport {
        total: reads.len(),
        aligned: aligned.len(),
        covered: covered.len(),
        passed: passed.len(),
        min_coverage,
        min_fastqscore,
    };
    (passed, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    fn joined(accuracy: Option<f64>, alignment_length: i64, mean_qscore: f64) -> JoinedRead {
        JoinedRead {
            read_id: "read".to_string(),
            basecall_length: 100,
            mean_qscore: Some(mean_qscore),
            accuracy,
            alignment_length,
        }
    }
    #[test]
    fn filter_counts() {
        let reads = vec![
            joined(Some(0.90), 95, 12.0),
            joined(None, -1, 12.0),
            joined(Some(0.95), 90, 15.0),
            joined(Some(0.80), 50, 12.0),
            joined(None, -1, 20.0),
            joined(Some(0.85), 81, 9.0),
            joined(Some(0.70), 80, 12.0),
            joined(Some(0.60), 99, 5.0),
            joined(None, 100, 12.0),
            joined(Some(0.99), 100, 25.0),
        ];
        let (points, report) = filter_data(&reads, 0.8, 7.0);
        assert_eq!(points.len(), 4);
        assert_eq!(report.total, 10);
        assert_eq!(report.aligned, 7);
        assert_eq!(report.covered, 5);
        assert_eq!(report.passed, 4);
        let accuracies: Vec<_> = points.iter().map(|p| p.accuracy).collect();
        assert_eq!(accuracies, vec![0.90, 0.95, 0.85, 0.99]);
        let printed = format!("{}", report);
        let counts: Vec<&str> = printed
            .lines()
            .map(|line| line.rsplit(' ').next().unwrap())
            .collect();
        assert_eq!(counts, vec!["10", "7", "5", "4"]);
    }
    #[test]
    fn empty_and_missing() {
        let mut empty = joined(Some(0.9), 0, 12.0);
        empty.basecall_length = 0;
        let mut no_qscore = joined(Some(0.9), 100, 12.0);
        no_qscore.mean_qscore = None;
        let (points, report) = filter_data(&[empty, no_qscore], 0.8, 7.0);
        assert!(points.is_empty());
        assert_eq!((report.aligned, report.covered, report.passed), (2, 1, 0));
    }
}
