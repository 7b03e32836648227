use crate::{
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult},
    position::PositionPair,
    restriction_enzyme::{EnzymeClass, RestrictionEnzyme},
};
use serde::{Deserialize, Serialize};

/// Where both strands are cut, as boundaries on the top-strand axis: a cut
/// at `p` separates base `p - 1` from base `p`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutSite {
    pub enzyme: String,
    pub site: PositionPair,
    pub top: isize,
    pub bottom: isize,
    /// Bases between the two cuts, read on the top strand
    pub window: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverhangKind {
    Blunt,
    FivePrime,
    ThreePrime,
}

impl CutSite {
    pub fn lo(&self) -> isize {
        self.top.min(self.bottom)
    }

    pub fn hi(&self) -> isize {
        self.top.max(self.bottom)
    }

    pub fn kind(&self) -> OverhangKind {
        match self.top.cmp(&self.bottom) {
            std::cmp::Ordering::Less => OverhangKind::FivePrime,
            std::cmp::Ordering::Greater => OverhangKind::ThreePrime,
            std::cmp::Ordering::Equal => OverhangKind::Blunt,
        }
    }

    pub(crate) fn shifted(&self, by: isize) -> Self {
        Self {
            top: self.top + by,
            bottom: self.bottom + by,
            ..self.clone()
        }
    }
}

/// Raw `(top, bottom)` cut boundaries for one recognition site. The values
/// are not wrapped and may fall outside the sequence.
pub fn calculate_cut(site: &PositionPair, enzyme: &RestrictionEnzyme) -> (isize, isize) {
    let site_start = site.leftmost() as isize;
    let site_end = site_start + enzyme.recognition_len() as isize;
    let delta = enzyme.strand_offset_delta();
    let top = match (enzyme.class, site.reverse) {
        (EnzymeClass::TypeIIs, false) => site_end + enzyme.top_cut,
        (EnzymeClass::TypeIIs, true) => site_start - enzyme.bottom_cut,
        (EnzymeClass::TypeII, false) => site_start - enzyme.bottom_cut,
        (EnzymeClass::TypeII, true) => site_end + enzyme.top_cut,
    };
    (top, top + delta)
}

/// Cut boundaries placed on `seq`: wrapped into range for circular
/// sequences, rejected when outside a linear one.
pub fn cut_positions(
    seq: &DNAsequence,
    site: &PositionPair,
    enzyme: &RestrictionEnzyme,
) -> EngineResult<CutSite> {
    let (top, bottom) = calculate_cut(site, enzyme);
    let len = seq.len() as isize;
    let cut = CutSite {
        enzyme: enzyme.name.clone(),
        site: *site,
        top,
        bottom,
        window: String::new(),
    };
    let cut = if seq.is_circular() {
        if cut.lo() < -len || cut.hi() > 2 * len || cut.hi() - cut.lo() >= len {
            return Err(EngineError::geometry(format!(
                "{} cut ({top}/{bottom}) at site {:?} wraps more than once around '{}' ({len} bp)",
                enzyme.name,
                site.human_friendly(false),
                seq.display_name()
            )));
        }
        let shift = cut.lo().rem_euclid(len) - cut.lo();
        cut.shifted(shift)
    } else {
        if cut.lo() < 0 || cut.hi() > len {
            return Err(EngineError::geometry(format!(
                "{} cut ({top}/{bottom}) at site {:?} falls outside linear sequence '{}' ({len} bp)",
                enzyme.name,
                site.human_friendly(false),
                seq.display_name()
            )));
        }
        cut
    };
    let window = seq.slice_wrapped(cut.lo(), cut.hi())?;
    Ok(CutSite { window, ..cut })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restriction_enzyme::DEFAULT_MAX_WOBBLE_EXPANSIONS;

    fn bsa_i() -> RestrictionEnzyme {
        RestrictionEnzyme::new("BsaI", "GGTCTC", 1, 5, EnzymeClass::TypeIIs).unwrap()
    }

    fn cuts(seq: &DNAsequence, re: &RestrictionEnzyme) -> Vec<CutSite> {
        re.get_sites(seq, DEFAULT_MAX_WOBBLE_EXPANSIONS)
            .unwrap()
            .positions
            .iter()
            .map(|site| cut_positions(seq, site, re).unwrap())
            .collect()
    }

    #[test]
    fn test_type_iis_forward_and_reverse() {
        // GGTCTC A AATG ccccc GCTT T GAGACC
        let seq = DNAsequence::from_sequence("GGTCTCAAATGCCCCCGCTTTGAGACC").unwrap();
        let found = cuts(&seq, &bsa_i());
        assert_eq!(found.len(), 2);
        assert_eq!((found[0].top, found[0].bottom), (7, 11));
        assert_eq!(found[0].window, "AATG");
        assert_eq!(found[0].kind(), OverhangKind::FivePrime);
        assert_eq!((found[1].top, found[1].bottom), (16, 20));
        assert_eq!(found[1].window, "GCTT");
    }

    #[test]
    fn test_type_ii_cuts() {
        let eco_ri = RestrictionEnzyme::new("EcoRI", "GAATTC", -5, -1, EnzymeClass::TypeII).unwrap();
        let seq = DNAsequence::from_sequence("AAGAATTCAA").unwrap();
        let found = cuts(&seq, &eco_ri);
        assert_eq!((found[0].top, found[0].bottom), (3, 7));
        assert_eq!(found[0].window, "AATT");

        let pst_i = RestrictionEnzyme::new("PstI", "CTGCAG", -1, -5, EnzymeClass::TypeII).unwrap();
        let seq = DNAsequence::from_sequence("AACTGCAGAA").unwrap();
        let cut = &cuts(&seq, &pst_i)[0];
        assert_eq!((cut.top, cut.bottom), (7, 3));
        assert_eq!(cut.kind(), OverhangKind::ThreePrime);
        assert_eq!(cut.window, "TGCA");

        let eco_rv = RestrictionEnzyme::new("EcoRV", "GATATC", -3, -3, EnzymeClass::TypeII).unwrap();
        let seq = DNAsequence::from_sequence("AAGATATCAA").unwrap();
        let cut = &cuts(&seq, &eco_rv)[0];
        assert_eq!(cut.kind(), OverhangKind::Blunt);
        assert_eq!(cut.top, 5);
    }

    #[test]
    fn test_non_palindromic_type_ii_mirrors_on_reverse_strand() {
        let re = RestrictionEnzyme::new("Odd", "GACGTT", -4, -2, EnzymeClass::TypeII).unwrap();
        let forward = DNAsequence::from_sequence("AAGACGTTAA").unwrap();
        let reverse = DNAsequence::from_sequence("TTAACGTCTT").unwrap();
        let f = &cuts(&forward, &re)[0];
        let r = &cuts(&reverse, &re)[0];
        assert_eq!((f.top, f.bottom), (4, 6));
        assert_eq!((r.top, r.bottom), (4, 6));
    }

    #[test]
    fn test_linear_out_of_range_is_geometry_error() {
        let seq = DNAsequence::new(Some("short"), "AAGGTCTCAA", false).unwrap();
        let re = bsa_i();
        let site = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap().positions[0];
        let err = cut_positions(&seq, &site, &re).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Geometry);
        assert!(err.message.contains("short"));
        assert!(err.message.contains("BsaI"));
    }

    #[test]
    fn test_circular_cut_wraps() {
        let seq = DNAsequence::new(Some("ring"), "AAGGTCTCAA", true).unwrap();
        let cut = &cuts(&seq, &bsa_i())[0];
        assert_eq!((cut.top, cut.bottom), (9, 13));
        assert_eq!(cut.window, "AAAG");
    }

    #[test]
    fn test_circular_double_wrap_rejected() {
        let re = RestrictionEnzyme::new("Far", "GGTCTC", 30, 34, EnzymeClass::TypeIIs).unwrap();
        let seq = DNAsequence::new(Some("ring"), "AAGGTCTCAA", true).unwrap();
        let site = re.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap().positions[0];
        let err = cut_positions(&seq, &site, &re).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::Geometry);
    }
}
