use crate::{
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult},
    fragment::{DigestedFragment, Digestion},
    restriction_enzyme::RestrictionEnzyme,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Which recognition site of the vector becomes the new origin
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationAnchor {
    #[default]
    Forward,
    Reverse,
}

/// Rotates a circular vector so that its single forward (or, on request,
/// reverse) recognition site starts at position 0.
pub fn rotate_vector(
    vector: &DNAsequence,
    enzyme: &RestrictionEnzyme,
    anchor: RotationAnchor,
    max_expansions: usize,
) -> EngineResult<DNAsequence> {
    if !vector.is_circular() {
        return Err(EngineError::invalid_input(format!(
            "Vector '{}' is linear; only circular vectors can be rotated",
            vector.display_name()
        )));
    }
    let sites = enzyme.get_sites(vector, max_expansions)?;
    let forward = sites.forward();
    let reverse = sites.reverse();
    for (strand, found) in [("forward", &forward), ("reverse", &reverse)] {
        if found.len() > 1 {
            return Err(EngineError::ambiguous(format!(
                "Vector '{}' has {} {strand} {} sites, expected at most one",
                vector.display_name(),
                found.len(),
                enzyme.name
            )));
        }
    }
    let site = match anchor {
        RotationAnchor::Forward => forward.first().or(reverse.first()),
        RotationAnchor::Reverse => reverse.first(),
    };
    let site = site.ok_or_else(|| {
        EngineError::invalid_input(format!(
            "Vector '{}' has no usable {} site for {anchor:?} rotation",
            vector.display_name(),
            enzyme.name
        ))
    })?;
    let origin = site.leftmost();
    info!(
        "Rotating vector '{}' to {} site at {}",
        vector.display_name(),
        enzyme.name,
        origin + 1
    );
    Ok(vector.rotated(origin))
}

/// Tries each enzyme in turn and returns the first one that rotates the
/// vector, together with the rotated vector.
pub fn rotate_vector_with_any<'a>(
    vector: &DNAsequence,
    enzymes: &'a [RestrictionEnzyme],
    anchor: RotationAnchor,
    max_expansions: usize,
) -> EngineResult<(&'a RestrictionEnzyme, DNAsequence)> {
    let mut errors: Vec<EngineError> = vec![];
    for enzyme in enzymes {
        match rotate_vector(vector, enzyme, anchor, max_expansions) {
            Ok(rotated) => return Ok((enzyme, rotated)),
            Err(e) => {
                debug!("{e}");
                errors.push(e);
            }
        }
    }
    let Some(first) = errors.first() else {
        return Err(EngineError::invalid_input(format!(
            "No enzymes given to rotate vector '{}'",
            vector.display_name()
        )));
    };
    Err(EngineError::new(
        first.code,
        format!(
            "Could not rotate vector '{}': {}",
            vector.display_name(),
            errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        ),
    ))
}

/// Picks the vector fragment that will receive the insert: sticky at both
/// ends and free of the enzyme's own site. Falls back to the largest sticky
/// fragment when all of them still carry a site.
pub fn select_backbone(
    vector: &DNAsequence,
    digestion: &Digestion,
    enzymes: &[RestrictionEnzyme],
    max_expansions: usize,
) -> EngineResult<DigestedFragment> {
    let sticky: Vec<&DigestedFragment> =
        digestion.fragments.iter().filter(|f| f.is_sticky()).collect();
    let mut site_free = vec![];
    for fragment in &sticky {
        if !carries_site(fragment, enzymes, max_expansions)? {
            site_free.push(*fragment);
        }
    }
    let candidates = if site_free.is_empty() {
        warn!(
            "Every fragment of vector '{}' carries a site; using the largest",
            vector.display_name()
        );
        sticky
    } else {
        site_free
    };
    candidates
        .into_iter()
        .max_by_key(|f| f.len())
        .cloned()
        .ok_or_else(|| {
            EngineError::invalid_input(format!(
                "Vector '{}' yields no fragment with two sticky ends",
                vector.display_name()
            ))
        })
}

pub(crate) fn carries_site(
    fragment: &DigestedFragment,
    enzymes: &[RestrictionEnzyme],
    max_expansions: usize,
) -> EngineResult<bool> {
    let dna = DNAsequence::new(None, fragment.top_strand(), false)?;
    for enzyme in enzymes {
        if enzyme.get_sites(&dna, max_expansions)?.count() > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}
