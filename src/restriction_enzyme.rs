use crate::{
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult},
    iupac_code::{IupacCode, reverse_complement, reverse_complement_bytes},
    position::PositionPair,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_MAX_WOBBLE_EXPANSIONS: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnzymeClass {
    /// Cuts within or next to the recognition sequence
    TypeII,
    /// Cuts at a fixed distance outside the recognition sequence
    TypeIIs,
}

impl EnzymeClass {
    pub fn all() -> [EnzymeClass; 2] {
        [EnzymeClass::TypeII, EnzymeClass::TypeIIs]
    }
}

impl fmt::Display for EnzymeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// `top_cut`/`bottom_cut` follow REBASE `(top/bottom)` notation for Type IIs
/// enzymes (distance past the end of the site). For Type II enzymes they are
/// negative distances into the site, so EcoRI `G^AATTC` is `(-5/-1)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionEnzyme {
    pub name: String,
    pub sequence: String,
    #[serde(default)]
    pub note: Option<String>,
    pub top_cut: isize,
    pub bottom_cut: isize,
    pub class: EnzymeClass,
    #[serde(default)]
    pub end_length: usize,
    #[serde(skip_serializing, default)]
    is_palindromic: bool,
}

impl RestrictionEnzyme {
    pub fn new(
        name: &str,
        sequence: &str,
        top_cut: isize,
        bottom_cut: isize,
        class: EnzymeClass,
    ) -> EngineResult<Self> {
        let mut ret = Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            note: None,
            top_cut,
            bottom_cut,
            class,
            end_length: 0,
            is_palindromic: false,
        };
        ret.finalize()?;
        Ok(ret)
    }

    /// Normalizes the recognition sequence and derives the cached fields.
    pub fn finalize(&mut self) -> EngineResult<()> {
        self.sequence = self.sequence.trim().to_ascii_uppercase();
        if self.sequence.is_empty() {
            return Err(EngineError::invalid_input(format!(
                "Enzyme '{}' has an empty recognition sequence",
                self.name
            )));
        }
        if let Some(bad) = self
            .sequence
            .bytes()
            .find(|c| !IupacCode::is_valid_letter(*c))
        {
            return Err(EngineError::invalid_input(format!(
                "Enzyme '{}' has invalid recognition letter '{}'",
                self.name, bad as char
            )));
        }
        let derived = self.strand_offset_delta().unsigned_abs();
        if self.end_length != 0 && self.end_length != derived {
            return Err(EngineError::invalid_input(format!(
                "Enzyme '{}' declares end length {} but its cut offsets ({}/{}) give {}",
                self.name, self.end_length, self.top_cut, self.bottom_cut, derived
            )));
        }
        self.end_length = derived;
        self.check_palindromic();
        Ok(())
    }

    pub fn check_palindromic(&mut self) {
        self.is_palindromic = self.sequence == reverse_complement(&self.sequence);
    }

    pub fn is_palindromic(&self) -> bool {
        self.is_palindromic
    }

    pub fn recognition_len(&self) -> usize {
        self.sequence.len()
    }

    /// Distance from the top-strand cut to the bottom-strand cut, positive
    /// for 5' overhangs.
    pub fn strand_offset_delta(&self) -> isize {
        self.bottom_cut - self.top_cut
    }

    pub fn is_type_iis(&self) -> bool {
        self.class == EnzymeClass::TypeIIs
    }

    pub fn get_sites(&self, seq: &DNAsequence, max_expansions: usize) -> EngineResult<RestrictionSites> {
        let positions = self.find_positions(seq, max_expansions)?;
        Ok(RestrictionSites {
            enzyme: self.to_owned(),
            positions,
        })
    }

    fn find_positions(&self, seq: &DNAsequence, max_expansions: usize) -> EngineResult<Vec<PositionPair>> {
        let recognition_len = self.recognition_len();
        let seq_len = seq.len();
        if seq_len == 0 || recognition_len > seq_len {
            return Ok(vec![]);
        }
        let patterns = IupacCode::expand_pattern(self.sequence.as_bytes(), max_expansions)
            .ok_or_else(|| {
                EngineError::invalid_input(format!(
                    "Recognition sequence {} of '{}' expands to more than {max_expansions} concrete sites",
                    self.sequence, self.name
                ))
            })?;
        let haystack = seq.search_haystack(recognition_len);
        let haystack = haystack.as_bytes();

        let mut ret = vec![];
        for pattern in &patterns {
            for offset in Self::find_all(haystack, pattern, seq_len) {
                ret.push(PositionPair::from_match(offset, recognition_len, seq_len, false));
            }
            let rc = reverse_complement_bytes(pattern);
            if rc == *pattern {
                continue;
            }
            for offset in Self::find_all(haystack, &rc, seq_len) {
                ret.push(PositionPair::from_match(offset, recognition_len, seq_len, true));
            }
        }
        // Forward hits sort before reverse hits at one location, so the
        // forward record is the one kept.
        ret.sort();
        ret.dedup_by(|later, kept| kept.same_location(later));
        Ok(ret)
    }

    /// Start offsets of `needle` in `haystack` that begin inside the first
    /// `limit` bases; later starts would duplicate an origin-spanning match.
    fn find_all(haystack: &[u8], needle: &[u8], limit: usize) -> Vec<usize> {
        if needle.is_empty() || haystack.len() < needle.len() {
            return vec![];
        }
        haystack
            .windows(needle.len())
            .enumerate()
            .take(limit)
            .filter(|(_, window)| *window == needle)
            .map(|(offset, _)| offset)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionSites {
    pub enzyme: RestrictionEnzyme,
    pub positions: Vec<PositionPair>,
}

impl RestrictionSites {
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    pub fn forward(&self) -> Vec<PositionPair> {
        self.positions.iter().filter(|p| !p.reverse).copied().collect()
    }

    pub fn reverse(&self) -> Vec<PositionPair> {
        self.positions.iter().filter(|p| p.reverse).copied().collect()
    }

    pub fn all(&self) -> &[PositionPair] {
        &self.positions
    }
}

pub fn find_restriction_sites(
    seq: &DNAsequence,
    enzymes: &[RestrictionEnzyme],
    max_expansions: usize,
) -> EngineResult<Vec<RestrictionSites>> {
    enzymes
        .par_iter()
        .map(|re| re.get_sites(seq, max_expansions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sap_i() -> RestrictionEnzyme {
        RestrictionEnzyme::new("SapI", "GCTCTTC", 1, 4, EnzymeClass::TypeIIs).unwrap()
    }

    fn eco_ri() -> RestrictionEnzyme {
        RestrictionEnzyme::new("EcoRI", "GAATTC", -5, -1, EnzymeClass::TypeII).unwrap()
    }

    #[test]
    fn test_restriction_enzyme() {
        let re = eco_ri();
        assert!(re.is_palindromic());
        assert_eq!(re.end_length, 4);
        let seq = DNAsequence::from_sequence("GAATTC").unwrap();
        let sites = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.count(), 1);
        assert_eq!(sites.positions[0], PositionPair::new(1, 6, false));
    }

    #[test]
    fn test_restriction_enzyme_sites() {
        let re = eco_ri();
        let seq = DNAsequence::from_sequence("GAATTCGAATTC").unwrap();
        let sites = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.count(), 2);
        assert_eq!(sites.positions[0].code_friendly(false), (0, 5));
        assert_eq!(sites.positions[1].code_friendly(false), (6, 11));
        assert!(sites.reverse().is_empty());
    }

    #[test]
    fn test_sites_on_both_strands() {
        let re = sap_i();
        assert!(!re.is_palindromic());
        let seq = DNAsequence::from_sequence("GCTCTTCAAACTGTGAAGAGC").unwrap();
        let sites = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.count(), 2);
        assert_eq!(sites.forward(), vec![PositionPair::new(1, 7, false)]);
        assert_eq!(sites.reverse(), vec![PositionPair::new(21, 15, true)]);
    }

    #[test]
    fn test_sites_across_origin() {
        let re = sap_i();
        let seq = DNAsequence::new(Some("wrap"), "TTCAAAAAAGCTC", true).unwrap();
        let sites = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.count(), 1);
        let site = sites.positions[0];
        assert!(!site.reverse);
        assert_eq!((site.start, site.end), (10, 3));
        assert_eq!(site.leftmost(), 9);

        let linear = DNAsequence::new(Some("wrap"), "TTCAAAAAAGCTC", false).unwrap();
        assert_eq!(re.get_sites(&linear, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap().count(), 0);
    }

    #[test]
    fn test_degenerate_site_is_expanded_and_deduplicated() {
        let bgl_i = RestrictionEnzyme::new("BglI", "GCCNNNNNGGC", -10, -7, EnzymeClass::TypeII).unwrap();
        assert!(bgl_i.is_palindromic());
        let seq = DNAsequence::from_sequence("TTGCCATGCAGGCTT").unwrap();
        let sites = bgl_i.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.count(), 1);
        assert_eq!(sites.positions[0].code_friendly(true), (2, 12));
    }

    #[test]
    fn test_wobble_cap() {
        let re = RestrictionEnzyme::new("Wobbly", "NNNNNNNN", 1, 5, EnzymeClass::TypeIIs).unwrap();
        let seq = DNAsequence::from_sequence("ACGTACGTACGT").unwrap();
        let err = re.get_sites(&seq, 1000).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
        assert!(err.message.contains("Wobbly"));
    }

    #[test]
    fn test_end_length_mismatch_rejected() {
        let mut re = sap_i();
        re.end_length = 4;
        assert!(re.finalize().is_err());
        assert!(RestrictionEnzyme::new("Bad", "GGXC", 1, 5, EnzymeClass::TypeIIs).is_err());
    }

    #[test]
    fn test_find_restriction_sites_keeps_enzyme_order() {
        let seq = DNAsequence::from_sequence("GAATTCGCTCTTCAAA").unwrap();
        let sites =
            find_restriction_sites(&seq, &[sap_i(), eco_ri()], DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap();
        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].enzyme.name, "SapI");
        assert_eq!(sites[0].count(), 1);
        assert_eq!(sites[1].enzyme.name, "EcoRI");
        assert_eq!(sites[1].count(), 1);
    }
}
