use crate::{
    cut_site::{CutSite, OverhangKind, cut_positions},
    dna_sequence::{DNAoverhang, DNAsequence},
    error::{EngineError, EngineResult},
    iupac_code::reverse_complement,
    parameters::EngineParameters,
    restriction_enzyme::{RestrictionEnzyme, RestrictionSites, find_restriction_sites},
};
use log::debug;
use serde::Serialize;

/// An end that can pair with another, its bases read on the top strand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StickyEnd {
    pub kind: OverhangKind,
    pub bases: String,
}

/// A linear double-stranded piece. `top_strand` carries `forward_5` and
/// `forward_3`; `bottom_strand` (5'->3') carries `reverse_5` and `reverse_3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DigestedFragment {
    top_strand: String,
    bottom_strand: String,
    overhang: DNAoverhang,
}

impl DigestedFragment {
    pub fn new(top_strand: &str, bottom_strand: &str, overhang: DNAoverhang) -> EngineResult<Self> {
        let overhang = DNAoverhang {
            forward_3: overhang.forward_3.to_ascii_uppercase(),
            forward_5: overhang.forward_5.to_ascii_uppercase(),
            reverse_3: overhang.reverse_3.to_ascii_uppercase(),
            reverse_5: overhang.reverse_5.to_ascii_uppercase(),
        };
        if !overhang.forward_5.is_empty() && !overhang.reverse_3.is_empty() {
            return Err(EngineError::internal(format!(
                "Fragment has overhangs on both strands at its left end ({}/{})",
                overhang.forward_5, overhang.reverse_3
            )));
        }
        if !overhang.forward_3.is_empty() && !overhang.reverse_5.is_empty() {
            return Err(EngineError::internal(format!(
                "Fragment has overhangs on both strands at its right end ({}/{})",
                overhang.forward_3, overhang.reverse_5
            )));
        }
        let ret = Self {
            top_strand: top_strand.to_ascii_uppercase(),
            bottom_strand: bottom_strand.to_ascii_uppercase(),
            overhang,
        };
        ret.check_duplex()?;
        Ok(ret)
    }

    /// Builds both strands around a double-stranded `core`.
    pub fn from_core(core: &str, overhang: DNAoverhang) -> EngineResult<Self> {
        let top = format!("{}{core}{}", overhang.forward_5, overhang.forward_3);
        let bottom = format!(
            "{}{}{}",
            overhang.reverse_5,
            reverse_complement(core),
            overhang.reverse_3
        );
        Self::new(&top, &bottom, overhang)
    }

    fn check_duplex(&self) -> EngineResult<()> {
        let top = Self::strip(&self.top_strand, &self.overhang.forward_5, &self.overhang.forward_3);
        let bottom = Self::strip(
            &self.bottom_strand,
            &self.overhang.reverse_5,
            &self.overhang.reverse_3,
        );
        match (top, bottom) {
            (Some(top), Some(bottom)) if top == reverse_complement(bottom) => Ok(()),
            _ => Err(EngineError::internal(format!(
                "Fragment strands {} / {} do not pair with overhangs {:?}",
                self.top_strand, self.bottom_strand, self.overhang
            ))),
        }
    }

    fn strip<'a>(strand: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
        strand.strip_prefix(prefix)?.strip_suffix(suffix)
    }

    pub fn top_strand(&self) -> &str {
        &self.top_strand
    }

    pub fn bottom_strand(&self) -> &str {
        &self.bottom_strand
    }

    pub fn overhang(&self) -> &DNAoverhang {
        &self.overhang
    }

    /// The double-stranded part between the two ends
    pub fn core(&self) -> &str {
        let start = self.overhang.forward_5.len();
        let end = self.top_strand.len() - self.overhang.forward_3.len();
        &self.top_strand[start..end]
    }

    pub fn len(&self) -> usize {
        self.top_strand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.top_strand.is_empty()
    }

    pub fn left_end(&self) -> Option<StickyEnd> {
        if !self.overhang.forward_5.is_empty() {
            Some(StickyEnd {
                kind: OverhangKind::FivePrime,
                bases: self.overhang.forward_5.clone(),
            })
        } else if !self.overhang.reverse_3.is_empty() {
            Some(StickyEnd {
                kind: OverhangKind::ThreePrime,
                bases: reverse_complement(&self.overhang.reverse_3),
            })
        } else {
            None
        }
    }

    pub fn right_end(&self) -> Option<StickyEnd> {
        if !self.overhang.forward_3.is_empty() {
            Some(StickyEnd {
                kind: OverhangKind::ThreePrime,
                bases: self.overhang.forward_3.clone(),
            })
        } else if !self.overhang.reverse_5.is_empty() {
            Some(StickyEnd {
                kind: OverhangKind::FivePrime,
                bases: reverse_complement(&self.overhang.reverse_5),
            })
        } else {
            None
        }
    }

    pub fn is_sticky(&self) -> bool {
        self.overhang.is_sticky()
    }

    /// Whether this fragment's right end anneals to `other`'s left end.
    /// Blunt ends never do.
    pub fn ligates_to(&self, other: &Self) -> bool {
        match (self.right_end(), other.left_end()) {
            (Some(right), Some(left)) => right == left,
            _ => false,
        }
    }

    /// The same molecule read from the other strand
    pub fn flipped(&self) -> Self {
        Self {
            top_strand: self.bottom_strand.clone(),
            bottom_strand: self.top_strand.clone(),
            overhang: self.overhang.flipped(),
        }
    }

    /// Anneals `other` to the right of `self`.
    pub fn join(&self, other: &Self) -> EngineResult<Self> {
        if !self.ligates_to(other) {
            return Err(EngineError::incompatible_ends(format!(
                "Right end {:?} does not pair with left end {:?}",
                self.right_end(),
                other.left_end()
            )));
        }
        let overhang = DNAoverhang {
            forward_5: self.overhang.forward_5.clone(),
            reverse_3: self.overhang.reverse_3.clone(),
            forward_3: other.overhang.forward_3.clone(),
            reverse_5: other.overhang.reverse_5.clone(),
        };
        let top = format!("{}{}", self.top_strand, other.top_strand);
        let bottom = format!("{}{}", other.bottom_strand, self.bottom_strand);
        Self::new(&top, &bottom, overhang)
    }

    /// Closes the fragment on itself when its two ends pair.
    pub fn circularize(&self, name: &str) -> EngineResult<DNAsequence> {
        if !self.ligates_to(self) {
            return Err(EngineError::incompatible_ends(format!(
                "Ends {:?} and {:?} of '{name}' do not pair",
                self.left_end(),
                self.right_end()
            )));
        }
        DNAsequence::new(Some(name), &self.top_strand, true)
    }

    pub fn to_sequence(&self, name: &str) -> EngineResult<DNAsequence> {
        DNAsequence::new(Some(name), &self.top_strand, false)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Digestion {
    pub sites: Vec<RestrictionSites>,
    /// Sorted by leftmost cut
    pub cuts: Vec<CutSite>,
    pub fragments: Vec<DigestedFragment>,
}

impl Digestion {
    pub fn is_no_cutter(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn site_count(&self) -> usize {
        self.sites.iter().map(|s| s.count()).sum()
    }

    /// Top strands as linear sequences named `{name}_1`, `{name}_2`...;
    /// a no-cutter gives back `seq` itself.
    pub fn to_sequences(&self, seq: &DNAsequence) -> EngineResult<Vec<DNAsequence>> {
        if self.is_no_cutter() {
            return Ok(vec![seq.clone()]);
        }
        let name = seq.display_name();
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, fragment)| fragment.to_sequence(&format!("{name}_{}", i + 1)))
            .collect()
    }
}

/// Raw fragment sequence with the single-stranded ends on either side, all
/// read on the top strand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypeIIsFragment {
    pub sequence: String,
    pub five_prime: String,
    pub three_prime: String,
}

pub fn digest(seq: &DNAsequence, enzymes: &[RestrictionEnzyme]) -> EngineResult<Vec<DNAsequence>> {
    digest_detailed(seq, enzymes, &EngineParameters::default())?.to_sequences(seq)
}

pub fn digest_to_fragments(
    seq: &DNAsequence,
    enzymes: &[RestrictionEnzyme],
) -> EngineResult<Vec<DigestedFragment>> {
    Ok(digest_detailed(seq, enzymes, &EngineParameters::default())?.fragments)
}

pub fn type_iis_digest(
    seq: &DNAsequence,
    enzymes: &[RestrictionEnzyme],
) -> EngineResult<Vec<TypeIIsFragment>> {
    if let Some(re) = enzymes.iter().find(|re| !re.is_type_iis()) {
        return Err(EngineError::invalid_input(format!(
            "{} is a {} enzyme, not TypeIIs",
            re.name, re.class
        )));
    }
    Ok(digest_to_fragments(seq, enzymes)?
        .iter()
        .map(|fragment| TypeIIsFragment {
            sequence: fragment.core().to_string(),
            five_prime: fragment.left_end().map(|e| e.bases).unwrap_or_default(),
            three_prime: fragment.right_end().map(|e| e.bases).unwrap_or_default(),
        })
        .collect())
}

/// Cuts `seq` with every enzyme at once. A sequence none of the enzymes cut
/// comes back as a single blunt fragment.
pub fn digest_detailed(
    seq: &DNAsequence,
    enzymes: &[RestrictionEnzyme],
    params: &EngineParameters,
) -> EngineResult<Digestion> {
    if enzymes.is_empty() {
        return Err(EngineError::invalid_input(format!(
            "No enzymes given to digest '{}'",
            seq.display_name()
        )));
    }
    if seq.is_empty() {
        return Err(EngineError::invalid_input(format!(
            "Sequence '{}' is empty",
            seq.display_name()
        )));
    }
    let sites = find_restriction_sites(seq, enzymes, params.max_wobble_expansions)?;
    let mut cuts = vec![];
    for found in &sites {
        for site in found.all() {
            cuts.push(cut_positions(seq, site, &found.enzyme)?);
        }
    }
    cuts.sort_by_key(|cut| (cut.lo(), cut.hi()));
    cuts.dedup_by(|later, kept| later.top == kept.top && later.bottom == kept.bottom);

    let expected = match seq.is_circular() {
        true => cuts.len(),
        false => cuts.len() + 1,
    };
    if expected > params.max_fragments_per_digest {
        return Err(EngineError::invalid_input(format!(
            "Digest of '{}' produced more than max_fragments_per_digest={}",
            seq.display_name(),
            params.max_fragments_per_digest
        )));
    }
    check_overlaps(seq, &cuts)?;

    let fragments = if cuts.is_empty() {
        vec![DigestedFragment::from_core(
            &seq.get_forward_string(),
            DNAoverhang::default(),
        )?]
    } else if seq.is_circular() {
        circular_fragments(seq, &cuts)?
    } else {
        linear_fragments(seq, &cuts)?
    };
    debug!(
        "Digested '{}' with {}: {} cut(s), {} fragment(s)",
        seq.display_name(),
        enzymes.iter().map(|re| re.name.as_str()).collect::<Vec<_>>().join(","),
        cuts.len(),
        fragments.len()
    );
    Ok(Digestion {
        sites,
        cuts,
        fragments,
    })
}

fn check_overlaps(seq: &DNAsequence, cuts: &[CutSite]) -> EngineResult<()> {
    let overlap = |a: &CutSite, b: &CutSite| {
        EngineError::geometry(format!(
            "{} cut {}..{} overlaps {} cut {}..{} in '{}'",
            a.enzyme,
            a.lo(),
            a.hi(),
            b.enzyme,
            b.lo(),
            b.hi(),
            seq.display_name()
        ))
    };
    for pair in cuts.windows(2) {
        if pair[0].hi() > pair[1].lo() {
            return Err(overlap(&pair[0], &pair[1]));
        }
    }
    if seq.is_circular() && cuts.len() > 1 {
        let (first, last) = (&cuts[0], &cuts[cuts.len() - 1]);
        if last.hi() > first.lo() + seq.len() as isize {
            return Err(overlap(last, first));
        }
    }
    Ok(())
}

/// Fragment `i` runs from cut `i` to cut `i + 1`; the last one closes the
/// gap across the origin.
fn circular_fragments(seq: &DNAsequence, cuts: &[CutSite]) -> EngineResult<Vec<DigestedFragment>> {
    let len = seq.len() as isize;
    let mut ret = vec![];
    for (i, left) in cuts.iter().enumerate() {
        let (right, end) = match cuts.get(i + 1) {
            Some(right) => (right, right.lo()),
            None => (&cuts[0], cuts[0].lo() + len),
        };
        if let Some(fragment) = fragment_between(seq, Some(left), Some(right), left.hi(), end)? {
            ret.push(fragment);
        }
    }
    Ok(ret)
}

fn linear_fragments(seq: &DNAsequence, cuts: &[CutSite]) -> EngineResult<Vec<DigestedFragment>> {
    let len = seq.len() as isize;
    let mut ret = vec![];
    for i in 0..=cuts.len() {
        let left = i.checked_sub(1).map(|j| &cuts[j]);
        let right = cuts.get(i);
        let start = left.map(|c| c.hi()).unwrap_or(0);
        let end = right.map(|c| c.lo()).unwrap_or(len);
        if let Some(fragment) = fragment_between(seq, left, right, start, end)? {
            ret.push(fragment);
        }
    }
    Ok(ret)
}

fn fragment_between(
    seq: &DNAsequence,
    left: Option<&CutSite>,
    right: Option<&CutSite>,
    start: isize,
    end: isize,
) -> EngineResult<Option<DigestedFragment>> {
    let core = seq.slice_wrapped(start, end)?;
    let mut overhang = DNAoverhang::default();
    if let Some(cut) = left {
        match cut.kind() {
            OverhangKind::FivePrime => overhang.forward_5 = cut.window.clone(),
            OverhangKind::ThreePrime => overhang.reverse_3 = reverse_complement(&cut.window),
            OverhangKind::Blunt => {}
        }
    }
    if let Some(cut) = right {
        match cut.kind() {
            OverhangKind::FivePrime => overhang.reverse_5 = reverse_complement(&cut.window),
            OverhangKind::ThreePrime => overhang.forward_3 = cut.window.clone(),
            OverhangKind::Blunt => {}
        }
    }
    let fragment = DigestedFragment::from_core(&core, overhang)?;
    // Single-stranded leftovers at the very end of a linear molecule
    if fragment.top_strand().is_empty() || fragment.bottom_strand().is_empty() {
        return Ok(None);
    }
    Ok(Some(fragment))
}
