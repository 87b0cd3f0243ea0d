//! Alphabets of modified-base aware output layers.
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AlphabetError {
    #[error("Output alphabet {alphabet} is incompatible with the modification counts {can_nmods:?}")]
    ModCounts {
        alphabet: String,
        can_nmods: Vec<usize>,
    },
    #[error("Alphabet {alphabet} and collapse alphabet {collapse} differ in length")]
    Length { alphabet: String, collapse: String },
    #[error("Alphabet {0} has duplicated symbols")]
    Duplicated(String),
    #[error("Canonical base {0} is not in the alphabet")]
    MissingCanonical(char),
    #[error("{nmod} modified bases but {nnames} long names")]
    LongNames { nmod: usize, nnames: usize },
}

/// Expand each canonical base into itself plus its modifications.
/// `output_alphabet` either lists every symbol, each canonical base followed by its modified bases (`AZCGT` for `[1,0,0,0]`),
/// or only the canonical bases (`ACGT`).
pub fn collapse_alphabet(output_alphabet: &str, can_nmods: &[usize]) -> Result<String, AlphabetError> {
    let symbols: Vec<char> = output_alphabet.chars().collect();
    let total: usize = can_nmods.iter().map(|n| n + 1).sum();
    let mut collapse = String::with_capacity(total);
    if symbols.len() == total {
        let mut current = 0;
        for &nmod in can_nmods.iter() {
            collapse.extend(std::iter::repeat(symbols[current]).take(nmod + 1));
            current += nmod + 1;
        }
    } else if symbols.len() == can_nmods.len() {
        for (&base, &nmod) in symbols.iter().zip(can_nmods.iter()) {
            collapse.extend(std::iter::repeat(base).take(nmod + 1));
        }
    } else {
        return Err(AlphabetError::ModCounts {
            alphabet: output_alphabet.to_string(),
            can_nmods: can_nmods.to_vec(),
        });
    }
    Ok(collapse)
}

/// Alphabet of a network emitting canonical and modified bases.
/// The order of the symbols is kept as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphabetInfo {
    alphabet: String,
    collapse_alphabet: String,
    mod_long_names: Vec<String>,
    can_bases: String,
    mod_bases: String,
    can_nmods: Vec<usize>,
}

impl AlphabetInfo {
    pub fn new(
        alphabet: &str,
        collapse_alphabet: &str,
        mod_long_names: &[String],
    ) -> Result<Self, AlphabetError> {
        let symbols: Vec<char> = alphabet.chars().collect();
        let collapse: Vec<char> = collapse_alphabet.chars().collect();
        if symbols.len() != collapse.len() {
            return Err(AlphabetError::Length {
                alphabet: alphabet.to_string(),
                collapse: collapse_alphabet.to_string(),
            });
        }
        let distinct: std::collections::HashSet<_> = symbols.iter().collect();
        if distinct.len() != symbols.len() {
            return Err(AlphabetError::Duplicated(alphabet.to_string()));
        }
        let mut can_bases = String::new();
        for &c in collapse.iter() {
            if !can_bases.contains(c) {
                can_bases.push(c);
            }
        }
        if let Some(c) = can_bases.chars().find(|c| !symbols.contains(c)) {
            return Err(AlphabetError::MissingCanonical(c));
        }
        let mod_bases: String = symbols
            .iter()
            .zip(collapse.iter())
            .filter(|(s, c)| s != c)
            .map(|(&s, _)| s)
            .collect();
        if mod_bases.chars().count() != mod_long_names.len() {
            return Err(AlphabetError::LongNames {
                nmod: mod_bases.chars().count(),
                nnames: mod_long_names.len(),
            });
        }
        let can_nmods = can_bases
            .chars()
            .map(|can| {
                symbols
                    .iter()
                    .zip(collapse.iter())
                    .filter(|&(&s, &c)| c == can && s != can)
                    .count()
            })
            .collect();
        Ok(Self {
            alphabet: alphabet.to_string(),
            collapse_alphabet: collapse_alphabet.to_string(),
            mod_long_names: mod_long_names.to_vec(),
            can_bases,
            mod_bases,
            can_nmods,
        })
    }
    pub fn collapse_alphabet(&self) -> &str {
        &self.collapse_alphabet
    }
    pub fn mod_long_names(&self) -> &[String] {
        &self.mod_long_names
    }
    pub fn can_bases(&self) -> &str {
        &self.can_bases
    }
    pub fn mod_bases(&self) -> &str {
        &self.mod_bases
    }
    pub fn can_nmods(&self) -> &[usize] {
        &self.can_nmods
    }
    pub fn nbase(&self) -> usize {
        self.alphabet.chars().count()
    }
    pub fn ncan_base(&self) -> usize {
        self.can_bases.chars().count()
    }
}

impl std::fmt::Display for AlphabetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.can_bases)?;
        for (m, name) in self.mod_bases.chars().zip(self.mod_long_names.iter()) {
            write!(f, " {}:{}", m, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn canonical_only() {
        assert_eq!(collapse_alphabet("ACGT", &[0, 0, 0, 0]).unwrap(), "ACGT");
        let collapse = collapse_alphabet("ACGT", &[1, 0, 0, 0]).unwrap();
        assert_eq!(collapse.len(), 5);
        assert_eq!(collapse, "AACGT");
    }
    #[test]
    fn with_mod_symbols() {
        assert_eq!(collapse_alphabet("AZCGT", &[1, 0, 0, 0]).unwrap(), "AACGT");
        assert_eq!(collapse_alphabet("AYCZGT", &[1, 1, 0, 0]).unwrap(), "AACCGT");
        assert!(collapse_alphabet("AZC", &[1, 0, 0, 0]).is_err());
    }
    #[test]
    fn alphabet_info() {
        let names = vec!["6mA".to_string(), "5mC".to_string()];
        let info = AlphabetInfo::new("AYCZGT", "AACCGT", &names).unwrap();
        assert_eq!(info.can_bases(), "ACGT");
        assert_eq!(info.mod_bases(), "YZ");
        assert_eq!(info.can_nmods(), &[1, 1, 0, 0]);
        assert_eq!(info.nbase(), 6);
        assert_eq!(info.ncan_base(), 4);
        assert_eq!(info.mod_bases().chars().count(), 2);
        assert_eq!(format!("{}", info), "ACGT Y:6mA Z:5mC");
    }
    #[test]
    fn alphabet_info_error() {
        let names = vec!["6mA".to_string()];
        assert!(matches!(
            AlphabetInfo::new("AZCGT", "AACG", &names),
            Err(AlphabetError::Length { .. })
        ));
        assert!(matches!(
            AlphabetInfo::new("AZCGT", "AACGT", &[]),
            Err(AlphabetError::LongNames { nmod: 1, nnames: 0 })
        ));
        assert!(matches!(
            AlphabetInfo::new("ZZCGT", "AACGT", &names),
            Err(AlphabetError::Duplicated(_))
        ));
        // Canonical-only alphabet expanded with a modification has no symbol for it.
        let collapse = collapse_alphabet("ACGT", &[1, 0, 0, 0]).unwrap();
        assert!(AlphabetInfo::new("ACGT", &collapse, &names).is_err());
    }
}
