use crate::{
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult},
    fragment::DigestedFragment,
};
use log::debug;
use serde::Serialize;
use std::collections::HashSet;

/// Which input contributed the left half of a linear join
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum JoinOrder {
    UpstreamFirst,
    DownstreamFirst,
}

#[derive(Clone, Debug, Serialize)]
pub struct LinearJoin {
    pub fragment: DigestedFragment,
    pub order: JoinOrder,
    pub upstream_index: usize,
    pub downstream_index: usize,
    /// The downstream fragment was used reverse-complemented
    pub downstream_flipped: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct LigationOutcome {
    pub joins: Vec<LinearJoin>,
    pub plasmids: Vec<DNAsequence>,
}

impl LigationOutcome {
    /// Linear products with the upstream fragment on the left
    pub fn upstream_first(&self) -> Vec<DigestedFragment> {
        self.joins
            .iter()
            .filter(|j| j.order == JoinOrder::UpstreamFirst)
            .map(|j| j.fragment.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.plasmids.is_empty()
    }
}

pub fn ends_compatible(upstream: &DigestedFragment, downstream: &DigestedFragment) -> bool {
    upstream.ligates_to(downstream)
}

/// Tries every upstream fragment against every downstream fragment in both
/// orientations. A pair whose ends match on both sides closes into a
/// plasmid and is not reported as a linear join.
pub fn ligate(
    upstream: &[DigestedFragment],
    downstream: &[DigestedFragment],
    upstream_name: &str,
    downstream_name: &str,
) -> EngineResult<LigationOutcome> {
    let mut ret = LigationOutcome::default();
    let mut seen_joins: HashSet<DigestedFragment> = HashSet::new();
    let mut seen_plasmids: HashSet<String> = HashSet::new();
    let plasmid_name = format!("{upstream_name}+{downstream_name}");

    for (upstream_index, a) in upstream.iter().enumerate() {
        for (downstream_index, b) in downstream.iter().enumerate() {
            let flipped = b.flipped();
            let orientations = match flipped == *b {
                true => vec![(b.clone(), false)],
                false => vec![(b.clone(), false), (flipped, true)],
            };
            for (b, downstream_flipped) in orientations {
                let forward = ends_compatible(a, &b);
                let backward = ends_compatible(&b, a);
                let (fragment, order) = match (forward, backward) {
                    (true, true) => {
                        let plasmid = a.join(&b)?.circularize(&plasmid_name)?;
                        if seen_plasmids.insert(plasmid.canonical_key()) {
                            ret.plasmids.push(plasmid);
                        }
                        continue;
                    }
                    (true, false) => (a.join(&b)?, JoinOrder::UpstreamFirst),
                    (false, true) => (b.join(a)?, JoinOrder::DownstreamFirst),
                    (false, false) => continue,
                };
                if seen_joins.insert(fragment.clone()) {
                    ret.joins.push(LinearJoin {
                        fragment,
                        order,
                        upstream_index,
                        downstream_index,
                        downstream_flipped,
                    });
                }
            }
        }
    }

    if ret.is_empty() {
        return Err(EngineError::incompatible_ends(format!(
            "No compatible sticky ends between '{upstream_name}' ({} fragment(s)) and '{downstream_name}' ({} fragment(s))",
            upstream.len(),
            downstream.len()
        )));
    }
    debug!(
        "Ligated '{upstream_name}' with '{downstream_name}': {} linear, {} circular",
        ret.joins.len(),
        ret.plasmids.len()
    );
    Ok(ret)
}
