use crate::{
    common_features::{PlasmidOracle, Plausibility, assess},
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult, ErrorCode},
    fragment::{DigestedFragment, digest_detailed},
    ligation::ligate,
    parameters::EngineParameters,
    restriction_enzyme::{RestrictionEnzyme, find_restriction_sites},
    vector::{carries_site, rotate_vector_with_any, select_backbone},
    ENZYMES,
};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssemblyParameters {
    pub name: String,
    /// One enzyme name, or several separated by commas
    pub enzyme_name: String,
    pub vector: DNAsequence,
    pub parts_in_order: Vec<DNAsequence>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSpec {
    pub name: String,
    pub sequence: String,
    #[serde(default)]
    pub circular: Option<bool>,
}

impl SequenceSpec {
    pub fn to_sequence(&self, default_circular: bool) -> EngineResult<DNAsequence> {
        DNAsequence::new(
            Some(&self.name),
            &self.sequence,
            self.circular.unwrap_or(default_circular),
        )
    }
}

/// Assembly design as written by hand; the vector defaults to circular and
/// parts to linear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyDesign {
    pub name: String,
    pub enzyme_name: String,
    pub vector: SequenceSpec,
    pub parts: Vec<SequenceSpec>,
}

impl AssemblyDesign {
    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load_from_path(path: &str) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError {
            code: ErrorCode::Io,
            message: format!("Could not read assembly design '{path}': {e}"),
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_parameters(&self) -> EngineResult<AssemblyParameters> {
        Ok(AssemblyParameters {
            name: self.name.clone(),
            enzyme_name: self.enzyme_name.clone(),
            vector: self.vector.to_sequence(true)?,
            parts_in_order: self
                .parts
                .iter()
                .map(|part| part.to_sequence(false))
                .collect::<EngineResult<Vec<_>>>()?,
        })
    }
}

/// Caller-side limits on the ordering search, checked between permutations.
#[derive(Clone, Debug, Default)]
pub struct SearchBudget {
    pub max_permutations: Option<usize>,
    pub time_budget: Option<Duration>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchBudget {
    pub fn from_parameters(params: &EngineParameters) -> Self {
        Self {
            max_permutations: params.max_permutations,
            time_budget: params.time_budget(),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check(&self, tried: usize, started: &Instant) -> Option<StopReason> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Some(StopReason::Cancelled);
        }
        if self.max_permutations.is_some_and(|max| tried >= max) {
            return Some(StopReason::PermutationBudget);
        }
        if self.time_budget.is_some_and(|max| started.elapsed() >= max) {
            return Some(StopReason::TimeBudget);
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Completed,
    EarlyExit,
    Cancelled,
    PermutationBudget,
    TimeBudget,
}

/// Result of joining the parts in one fixed order
#[derive(Clone, Debug, Default, Serialize)]
pub struct JoinOutcome {
    pub order: Vec<String>,
    /// Linear inserts after the last part was added
    pub inserts: Vec<DigestedFragment>,
    pub plasmids: Vec<DNAsequence>,
    pub partial_fragments: Vec<DigestedFragment>,
    /// Circular products that failed validation, with the reason
    pub rejected: Vec<String>,
    pub last_compatible_pair: Option<(String, String)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssemblyProduct {
    pub sequence: DNAsequence,
    pub order: Vec<String>,
    pub plausibility: Plausibility,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchOutcome {
    pub products: Vec<AssemblyProduct>,
    pub partial_fragments: Vec<DigestedFragment>,
    pub exhaustive: bool,
    /// `None` when the count overflows
    pub total_permutations: Option<usize>,
    pub permutations_tried: usize,
    pub stop: StopReason,
    pub failures: Vec<String>,
    pub last_compatible_pair: Option<(String, String)>,
}

impl SearchOutcome {
    pub fn plasmids(&self) -> Vec<&DNAsequence> {
        self.products.iter().map(|p| &p.sequence).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum AssemblyStatus {
    NoAssembly,
    Success,
    Ambiguous { count: usize },
    PartialOnly { last_compatible_pair: Option<(String, String)> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SiteCount {
    pub sequence: String,
    pub enzyme: String,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssemblyReport {
    pub name: String,
    pub enzymes: Vec<String>,
    pub status: AssemblyStatus,
    pub summary: String,
    pub success_count: usize,
    pub sites_found: Vec<SiteCount>,
    pub products: Vec<AssemblyProduct>,
    pub partial_fragment_count: usize,
    pub permutations_tried: usize,
    pub stop: Option<StopReason>,
}

struct PreparedPart {
    name: String,
    fragments: Vec<DigestedFragment>,
}

/// Vector and parts digested once, so each ordering only ligates.
struct PreparedAssembly<'a> {
    enzymes: &'a [RestrictionEnzyme],
    vector: DNAsequence,
    backbone: DigestedFragment,
    parts: Vec<PreparedPart>,
    max_expansions: usize,
}

impl<'a> PreparedAssembly<'a> {
    fn new(
        vector: &DNAsequence,
        parts: &[DNAsequence],
        enzymes: &'a [RestrictionEnzyme],
        params: &EngineParameters,
    ) -> EngineResult<Self> {
        if parts.is_empty() {
            return Err(EngineError::invalid_input(format!(
                "No parts given for vector '{}'",
                vector.display_name()
            )));
        }
        let max_expansions = params.max_wobble_expansions;
        let (_, rotated) =
            rotate_vector_with_any(vector, enzymes, params.rotation_anchor, max_expansions)?;
        let digestion = digest_detailed(&rotated, enzymes, params)?;
        if digestion.is_no_cutter() {
            return Err(EngineError::invalid_input(format!(
                "{} does not cut vector '{}'",
                Self::enzyme_names(enzymes),
                vector.display_name()
            )));
        }
        let backbone = select_backbone(&rotated, &digestion, enzymes, max_expansions)?;

        let mut prepared_parts = vec![];
        for part in parts {
            prepared_parts.push(Self::prepare_part(part, enzymes, params)?);
        }
        Ok(Self {
            enzymes,
            vector: rotated,
            backbone,
            parts: prepared_parts,
            max_expansions,
        })
    }

    fn prepare_part(
        part: &DNAsequence,
        enzymes: &[RestrictionEnzyme],
        params: &EngineParameters,
    ) -> EngineResult<PreparedPart> {
        let name = part.display_name();
        if part.is_empty() {
            return Err(EngineError::invalid_input(format!("Part '{name}' is empty")));
        }
        let digestion = digest_detailed(part, enzymes, params)?;
        if digestion.is_no_cutter() {
            return Err(EngineError::invalid_input(format!(
                "{} does not cut part '{name}'",
                Self::enzyme_names(enzymes)
            )));
        }
        let sticky: Vec<DigestedFragment> = digestion
            .fragments
            .into_iter()
            .filter(|f| f.is_sticky())
            .collect();
        let mut site_free = vec![];
        for fragment in &sticky {
            if !carries_site(fragment, enzymes, params.max_wobble_expansions)? {
                site_free.push(fragment.clone());
            }
        }
        let fragments = if site_free.is_empty() { sticky } else { site_free };
        if fragments.is_empty() {
            return Err(EngineError::invalid_input(format!(
                "Part '{name}' yields no fragment with two sticky ends"
            )));
        }
        Ok(PreparedPart { name, fragments })
    }

    fn enzyme_names(enzymes: &[RestrictionEnzyme]) -> String {
        enzymes.iter().map(|re| re.name.as_str()).join(",")
    }

    fn part_names(&self, order: &[usize]) -> Vec<String> {
        order.iter().map(|i| self.parts[*i].name.clone()).collect()
    }

    /// Ligates the parts in `order`, then closes the insert into the vector.
    /// A pair of adjacent parts that does not join is an error.
    fn join(&self, order: &[usize]) -> EngineResult<JoinOutcome> {
        let names = self.part_names(order);
        let vector_name = self.vector.display_name();
        let Some((first, rest)) = order.split_first() else {
            return Err(EngineError::invalid_input("Empty part order"));
        };
        let mut inserts = self.parts[*first].fragments.clone();
        let mut previous = &self.parts[*first].name;
        let mut last_compatible_pair = None;
        for index in rest {
            let part = &self.parts[*index];
            let outcome = ligate(&inserts, &part.fragments, previous, &part.name).map_err(|e| {
                EngineError::incompatible_ends(format!(
                    "Parts '{previous}' and '{}' do not join: {}",
                    part.name, e.message
                ))
            })?;
            let joined = outcome.upstream_first();
            if joined.is_empty() {
                return Err(EngineError::incompatible_ends(format!(
                    "Parts '{previous}' and '{}' only join in the opposite order",
                    part.name
                )));
            }
            inserts = joined;
            last_compatible_pair = Some((previous.clone(), part.name.clone()));
            previous = &part.name;
        }

        let mut ret = JoinOutcome {
            order: names.clone(),
            last_compatible_pair,
            ..Default::default()
        };
        let closing = match ligate(
            &inserts,
            std::slice::from_ref(&self.backbone),
            "insert",
            &vector_name,
        ) {
            Ok(closing) => closing,
            Err(e) if e.code == ErrorCode::IncompatibleEnds => {
                debug!("Insert {} does not fit vector: {}", names.join("+"), e.message);
                if order.len() > 1 {
                    ret.partial_fragments = inserts.clone();
                }
                ret.inserts = inserts;
                return Ok(ret);
            }
            Err(e) => return Err(e),
        };
        if !closing.joins.is_empty() {
            ret.last_compatible_pair = Some((previous.clone(), vector_name.clone()));
        }
        ret.partial_fragments = closing.joins.into_iter().map(|j| j.fragment).collect();

        let product_name = format!("{vector_name}+{}", names.join("+"));
        for mut plasmid in closing.plasmids {
            plasmid.set_name(&product_name);
            match self.rejection(&plasmid, &inserts)? {
                Some(reason) => {
                    warn!("Rejected product {product_name}: {reason}");
                    ret.rejected.push(reason);
                }
                None => ret.plasmids.push(plasmid),
            }
        }
        ret.inserts = inserts;
        Ok(ret)
    }

    /// Why a circular product is not a valid assembly, if it is not
    fn rejection(
        &self,
        plasmid: &DNAsequence,
        inserts: &[DigestedFragment],
    ) -> EngineResult<Option<String>> {
        if !inserts
            .iter()
            .any(|insert| plasmid.contains_either_strand(insert.core()))
        {
            return Ok(Some(format!(
                "'{}' does not contain the insert",
                plasmid.display_name()
            )));
        }
        for enzyme in self.enzymes {
            let count = enzyme.get_sites(plasmid, self.max_expansions)?.count();
            if count > 0 {
                return Ok(Some(format!(
                    "'{}' still carries {count} {} site(s)",
                    plasmid.display_name(),
                    enzyme.name
                )));
            }
        }
        Ok(None)
    }
}

/// Joins the parts in the given order and closes them into the vector.
/// Fails unless at least one valid circular product forms.
pub fn join_parts(
    vector: &DNAsequence,
    parts_in_order: &[DNAsequence],
    enzymes: &[RestrictionEnzyme],
    params: &EngineParameters,
) -> EngineResult<JoinOutcome> {
    let prepared = PreparedAssembly::new(vector, parts_in_order, enzymes, params)?;
    let order: Vec<usize> = (0..prepared.parts.len()).collect();
    let ret = prepared.join(&order)?;
    if ret.plasmids.is_empty() {
        let detail = match (&ret.last_compatible_pair, ret.rejected.is_empty()) {
            (_, false) => ret.rejected.join("; "),
            (Some((a, b)), true) => format!("last compatible pair was '{a}' and '{b}'"),
            (None, true) => "no adjacent parts joined".to_string(),
        };
        return Err(EngineError::incompatible_ends(format!(
            "No circular product from {} in vector '{}': {detail}",
            ret.order.join("+"),
            vector.display_name()
        )));
    }
    Ok(ret)
}

/// Tries every ordering of the parts (or only the given one above
/// `max_exhaustive_parts`) and collects the distinct circular products.
pub fn find_all_assembly_products(
    vector: &DNAsequence,
    parts: &[DNAsequence],
    enzymes: &[RestrictionEnzyme],
    params: &EngineParameters,
    oracle: Option<&dyn PlasmidOracle>,
    budget: &SearchBudget,
) -> EngineResult<SearchOutcome> {
    let prepared = PreparedAssembly::new(vector, parts, enzymes, params)?;
    let n = prepared.parts.len();
    let exhaustive = n <= params.max_exhaustive_parts;
    let total_permutations = match exhaustive {
        true => factorial(n),
        false => Some(1),
    };
    let early_exit = oracle.is_some()
        && total_permutations.is_none_or(|total| total > params.early_exit_after_permutations);
    let orders: Box<dyn Iterator<Item = Vec<usize>>> = match exhaustive {
        true => Box::new((0..n).permutations(n)),
        false => Box::new(std::iter::once((0..n).collect())),
    };
    info!(
        "Searching {} ordering(s) of {n} part(s) in vector '{}'{}",
        total_permutations.map_or("too many".to_string(), |t| t.to_string()),
        vector.display_name(),
        if early_exit { " with early exit" } else { "" }
    );

    let started = Instant::now();
    let mut ret = SearchOutcome {
        products: vec![],
        partial_fragments: vec![],
        exhaustive,
        total_permutations,
        permutations_tried: 0,
        stop: StopReason::Completed,
        failures: vec![],
        last_compatible_pair: None,
    };
    let mut seen_products: HashSet<String> = HashSet::new();
    let mut seen_partials: HashSet<DigestedFragment> = HashSet::new();
    for order in orders {
        if let Some(stop) = budget.check(ret.permutations_tried, &started) {
            info!("Ordering search stopped after {} permutation(s): {stop:?}", ret.permutations_tried);
            ret.stop = stop;
            break;
        }
        ret.permutations_tried += 1;
        let outcome = match prepared.join(&order) {
            Ok(outcome) => outcome,
            Err(e) if e.code == ErrorCode::IncompatibleEnds => {
                debug!("Order {:?}: {}", prepared.part_names(&order), e.message);
                ret.failures.push(e.message);
                continue;
            }
            Err(e) => return Err(e),
        };
        if outcome.last_compatible_pair.is_some() {
            ret.last_compatible_pair = outcome.last_compatible_pair.clone();
        }
        ret.failures.extend(outcome.rejected.iter().cloned());
        for fragment in outcome.partial_fragments {
            if seen_partials.insert(fragment.clone()) {
                ret.partial_fragments.push(fragment);
            }
        }
        let mut found_plausible = false;
        for plasmid in outcome.plasmids {
            if !seen_products.insert(plasmid.canonical_key()) {
                continue;
            }
            let plausibility = assess(oracle, &prepared.vector, &plasmid);
            found_plausible |= plausibility.is_plausible();
            ret.products.push(AssemblyProduct {
                sequence: plasmid,
                order: outcome.order.clone(),
                plausibility,
            });
        }
        if early_exit && found_plausible {
            info!(
                "Plausible product after {} of {} permutation(s), stopping",
                ret.permutations_tried,
                total_permutations.map_or("many".to_string(), |t| t.to_string())
            );
            ret.stop = StopReason::EarlyExit;
            break;
        }
    }

    if ret.products.is_empty() && ret.partial_fragments.is_empty() && !ret.failures.is_empty() {
        let failures = ret.failures.iter().unique().take(5).join("; ");
        return Err(EngineError::incompatible_ends(format!(
            "No ordering of {n} part(s) assembled into vector '{}' ({} tried): {failures}",
            vector.display_name(),
            ret.permutations_tried
        )));
    }
    Ok(ret)
}

/// `n!`, or `None` when it does not fit
fn factorial(n: usize) -> Option<usize> {
    (1..=n).try_fold(1usize, |acc, k| acc.checked_mul(k))
}

/// Resolves the design's enzymes from the built-in table, runs the
/// ordering search and classifies the outcome.
pub fn assembly_simulate(
    design: &AssemblyParameters,
    params: &EngineParameters,
    oracle: Option<&dyn PlasmidOracle>,
    budget: &SearchBudget,
) -> EngineResult<AssemblyReport> {
    let enzymes = ENZYMES.restriction_enzymes_from_list(&design.enzyme_name)?;
    assembly_simulate_with(design, &enzymes, params, oracle, budget)
}

pub fn assembly_simulate_with(
    design: &AssemblyParameters,
    enzymes: &[RestrictionEnzyme],
    params: &EngineParameters,
    oracle: Option<&dyn PlasmidOracle>,
    budget: &SearchBudget,
) -> EngineResult<AssemblyReport> {
    let mut sites_found = vec![];
    for seq in std::iter::once(&design.vector).chain(design.parts_in_order.iter()) {
        for sites in find_restriction_sites(seq, enzymes, params.max_wobble_expansions)? {
            sites_found.push(SiteCount {
                sequence: seq.display_name(),
                enzyme: sites.enzyme.name.clone(),
                count: sites.count(),
            });
        }
    }
    let mut ret = AssemblyReport {
        name: design.name.clone(),
        enzymes: enzymes.iter().map(|re| re.name.clone()).collect(),
        status: AssemblyStatus::NoAssembly,
        summary: String::new(),
        success_count: 0,
        sites_found,
        products: vec![],
        partial_fragment_count: 0,
        permutations_tried: 0,
        stop: None,
    };

    let outcome = match find_all_assembly_products(
        &design.vector,
        &design.parts_in_order,
        enzymes,
        params,
        oracle,
        budget,
    ) {
        Ok(outcome) => outcome,
        Err(e) if e.code == ErrorCode::IncompatibleEnds => {
            ret.summary = format!("{}: no assembly possible; {}", design.name, e.message);
            return Ok(ret);
        }
        Err(e) => return Err(e),
    };

    ret.success_count = outcome.products.len();
    ret.partial_fragment_count = outcome.partial_fragments.len();
    ret.permutations_tried = outcome.permutations_tried;
    ret.stop = Some(outcome.stop);
    ret.status = match (outcome.products.len(), outcome.partial_fragments.len()) {
        (0, 0) => AssemblyStatus::NoAssembly,
        (0, _) => AssemblyStatus::PartialOnly {
            last_compatible_pair: outcome.last_compatible_pair.clone(),
        },
        (1, _) => AssemblyStatus::Success,
        (count, _) => AssemblyStatus::Ambiguous { count },
    };
    ret.summary = match &ret.status {
        AssemblyStatus::NoAssembly => format!("{}: no assembly possible", design.name),
        AssemblyStatus::Success => format!(
            "{}: one product, {} bp",
            design.name,
            outcome.products[0].sequence.len()
        ),
        AssemblyStatus::Ambiguous { count } => {
            format!("{}: ambiguous assembly, {count} possible products", design.name)
        }
        AssemblyStatus::PartialOnly {
            last_compatible_pair: Some((a, b)),
        } => format!(
            "{}: partial assembly only, last compatible pair '{a}' and '{b}'",
            design.name
        ),
        AssemblyStatus::PartialOnly {
            last_compatible_pair: None,
        } => format!("{}: partial assembly only", design.name),
    };
    ret.products = outcome.products;
    info!("{}", ret.summary);
    Ok(ret)
}
