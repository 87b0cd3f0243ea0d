//! Join basecalls with their alignments.
use definitions::{AlignmentRecord, BasecallRead, JoinedRead};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub reads: usize,
    pub not_found: usize,
    pub multiple_alignments: usize,
}

impl std::fmt::Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{} reads read from fastq.", self.reads)?;
        writeln!(f, "    {} not found in alignment summary.", self.not_found)?;
        write!(f, "    {} with more than one alignment.", self.multiple_alignments)
    }
}

// A present accuracy beats a missing one. Ties keep the earlier record.
fn is_better(candidate: &AlignmentRecord, best: &AlignmentRecord) -> bool {
    match (candidate.accuracy, best.accuracy) {
        (Some(c), Some(b)) => b < c,
        (Some(_), None) => true,
        _ => false,
    }
}

/// For each basecall, take the most accurate of its alignments.
/// Reads without any alignment get no accuracy and the length of -1.
pub fn merge_align_fastq_data(
    reads: &[BasecallRead],
    alignments: &[AlignmentRecord],
) -> (Vec<JoinedRead>, MergeReport) {
    let mut alignments_of: HashMap<&str, Vec<&AlignmentRecord>> = HashMap::new();
    for aln in alignments.iter() {
        alignments_of.entry(aln.read_id.as_str()).or_default().push(aln);
    }
    let mut report = MergeReport {
        reads: reads.len(),
        ..Default::default()
    };
    let joined: Vec<JoinedRead> = reads
        .iter()
        .map(|read| {
            let mut joined = JoinedRead::unaligned(read);
            let alns = match alignments_of.get(read.read_id.as_str()) {
                Some(alns) => alns,
                None => {
                    report.not_found += 1;
                    return joined;
                }
            };
            if 1 < alns.len() {
                report.multiple_alignments += 1;
            }
            let mut best = alns[0];
            for aln in alns.iter().skip(1) {
                if is_better(aln, best) {
                    best = *aln;
                }
            }
            joined.accuracy = best.accuracy;
            joined.alignment_length = best.alignment_length;
            joined
        })
        .collect();
    (joined, report)
}
