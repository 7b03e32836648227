use crate::{
    assembly::{
        AssemblyParameters, SearchBudget, assembly_simulate_with, find_all_assembly_products,
        join_parts,
    },
    common_features::{CommonFeatures, PlasmidOracle},
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult, ErrorCode},
    fragment::digest_detailed,
    parameters::EngineParameters,
    restriction_enzyme::{RestrictionEnzyme, find_restriction_sites},
    vector::rotate_vector,
    ENZYMES,
};
use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, atomic::AtomicBool},
};

pub type SeqId = String;
pub type OpId = String;
pub type RunId = String;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectState {
    pub sequences: BTreeMap<SeqId, DNAsequence>,
    #[serde(default)]
    pub parameters: EngineParameters,
    /// Origins and markers used to judge assembled plasmids
    #[serde(default)]
    pub common_features: CommonFeatures,
}

impl ProjectState {
    pub fn load_from_path(path: &str) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError {
            code: ErrorCode::Io,
            message: format!("Could not read state file '{path}': {e}"),
        })?;
        let ret: Self = serde_json::from_str(&text).map_err(|e| EngineError {
            code: ErrorCode::InvalidInput,
            message: format!("Could not parse state JSON '{path}': {e}"),
        })?;
        ret.parameters.validate()?;
        Ok(ret)
    }

    pub fn save_to_path(&self, path: &str) -> EngineResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|e| EngineError {
            code: ErrorCode::Internal,
            message: format!("Could not serialize state: {e}"),
        })?;
        std::fs::write(path, text).map_err(|e| EngineError {
            code: ErrorCode::Io,
            message: format!("Could not write state file '{path}': {e}"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    /// FASTA or GenBank, chosen by file extension
    LoadFile {
        path: String,
        as_id: Option<SeqId>,
        circular: Option<bool>,
    },
    AddSequence {
        id: SeqId,
        sequence: String,
        #[serde(default)]
        circular: bool,
    },
    FindSites {
        input: SeqId,
        enzymes: Vec<String>,
    },
    Digest {
        input: SeqId,
        enzymes: Vec<String>,
        output_prefix: Option<String>,
    },
    RotateVector {
        input: SeqId,
        enzyme: String,
        output_id: Option<SeqId>,
    },
    JoinParts {
        vector: SeqId,
        parts: Vec<SeqId>,
        enzymes: Vec<String>,
        output_prefix: Option<String>,
    },
    FindAllAssemblyProducts {
        vector: SeqId,
        parts: Vec<SeqId>,
        enzymes: Vec<String>,
        output_prefix: Option<String>,
    },
    Simulate {
        name: String,
        vector: SeqId,
        parts: Vec<SeqId>,
        enzymes: Vec<String>,
    },
    LoadCommonFeatures {
        path: String,
    },
    SetParameter {
        name: String,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub run_id: RunId,
    pub ops: Vec<Operation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResult {
    pub op_id: OpId,
    pub created_seq_ids: Vec<SeqId>,
    pub warnings: Vec<String>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub run_id: RunId,
    pub op: Operation,
    pub result: OpResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    pub protocol_version: String,
    pub supported_operations: Vec<String>,
    pub enzyme_count: usize,
}

pub trait Engine {
    fn apply(&mut self, op: Operation) -> EngineResult<OpResult>;
    fn apply_workflow(&mut self, wf: Workflow) -> EngineResult<Vec<OpResult>>;
    fn snapshot(&self) -> &ProjectState;
}

#[derive(Debug, Clone, Default)]
pub struct CloningEngine {
    state: ProjectState,
    journal: Vec<OperationRecord>,
    op_counter: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl CloningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ProjectState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &ProjectState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ProjectState {
        &mut self.state
    }

    /// Flag checked between permutations of the assembly search
    pub fn set_cancel_flag(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = Some(cancel);
    }

    pub fn capabilities() -> Capabilities {
        Capabilities {
            protocol_version: "v1".to_string(),
            supported_operations: [
                "LoadFile",
                "AddSequence",
                "FindSites",
                "Digest",
                "RotateVector",
                "JoinParts",
                "FindAllAssemblyProducts",
                "Simulate",
                "LoadCommonFeatures",
                "SetParameter",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enzyme_count: ENZYMES.restriction_enzymes().len(),
        }
    }

    pub fn operation_log(&self) -> &[OperationRecord] {
        &self.journal
    }

    fn next_op_id(&mut self) -> OpId {
        self.op_counter += 1;
        format!("op-{}", self.op_counter)
    }

    fn derive_seq_id(path: &str) -> SeqId {
        Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "sequence".to_string())
    }

    fn unique_seq_id(&self, base: &str) -> SeqId {
        if !self.state.sequences.contains_key(base) {
            return base.to_string();
        }
        (2usize..)
            .map(|i| format!("{base}_{i}"))
            .find(|candidate| !self.state.sequences.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn sequence(&self, seq_id: &str) -> EngineResult<DNAsequence> {
        self.state
            .sequences
            .get(seq_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("Sequence '{seq_id}' not found")))
    }

    fn sequences(&self, seq_ids: &[SeqId]) -> EngineResult<Vec<DNAsequence>> {
        seq_ids.iter().map(|id| self.sequence(id)).collect()
    }

    fn enzymes(names: &[String]) -> EngineResult<Vec<RestrictionEnzyme>> {
        if names.is_empty() {
            return Err(EngineError::invalid_input("At least one enzyme is required"));
        }
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        ENZYMES.restriction_enzymes_by_name(&names)
    }

    fn oracle(&self) -> Option<&dyn PlasmidOracle> {
        match self.state.common_features.is_empty() {
            true => None,
            false => Some(&self.state.common_features),
        }
    }

    fn budget(&self) -> SearchBudget {
        let ret = SearchBudget::from_parameters(&self.state.parameters);
        match &self.cancel {
            Some(cancel) => ret.with_cancel(cancel.clone()),
            None => ret,
        }
    }

    fn load_file(path: &str) -> EngineResult<Vec<DNAsequence>> {
        let extension = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let loaded = match extension.as_str() {
            "gb" | "gbk" | "genbank" => DNAsequence::from_genbank_file(path),
            _ => DNAsequence::from_fasta_file(path),
        };
        let ret = loaded.map_err(|e| EngineError {
            code: ErrorCode::InvalidInput,
            message: format!("Could not load sequence file '{path}': {e}"),
        })?;
        if ret.is_empty() {
            return Err(EngineError::invalid_input(format!(
                "No sequences in '{path}'"
            )));
        }
        Ok(ret)
    }

    fn store_products(
        &mut self,
        products: Vec<DNAsequence>,
        prefix: &str,
        result: &mut OpResult,
    ) {
        for (i, dna) in products.into_iter().enumerate() {
            let seq_id = self.unique_seq_id(&format!("{prefix}_{}", i + 1));
            self.state.sequences.insert(seq_id.clone(), dna);
            result.created_seq_ids.push(seq_id);
        }
    }

    fn apply_internal(&mut self, op: Operation) -> EngineResult<OpResult> {
        let op_id = self.next_op_id();
        let mut result = OpResult {
            op_id,
            created_seq_ids: vec![],
            warnings: vec![],
            messages: vec![],
        };

        match op {
            Operation::LoadFile {
                path,
                as_id,
                circular,
            } => {
                let base = as_id.unwrap_or_else(|| Self::derive_seq_id(&path));
                for mut dna in Self::load_file(&path)? {
                    if let Some(circular) = circular {
                        dna.set_circular(circular);
                    }
                    let seq_id = self.unique_seq_id(&base);
                    self.state.sequences.insert(seq_id.clone(), dna);
                    result.created_seq_ids.push(seq_id);
                }
                result.messages.push(format!(
                    "Loaded '{path}' as {}",
                    result.created_seq_ids.iter().map(|id| format!("'{id}'")).join(", ")
                ));
            }
            Operation::AddSequence {
                id,
                sequence,
                circular,
            } => {
                let dna = DNAsequence::new(Some(&id), &sequence, circular)?;
                let seq_id = self.unique_seq_id(&id);
                result
                    .messages
                    .push(format!("Added '{seq_id}' ({} bp)", dna.len()));
                self.state.sequences.insert(seq_id.clone(), dna);
                result.created_seq_ids.push(seq_id);
            }
            Operation::FindSites { input, enzymes } => {
                let dna = self.sequence(&input)?;
                let enzymes = Self::enzymes(&enzymes)?;
                let max = self.state.parameters.max_wobble_expansions;
                for sites in find_restriction_sites(&dna, &enzymes, max)? {
                    let positions = sites
                        .all()
                        .iter()
                        .map(|p| {
                            let (start, end) = p.human_friendly(false);
                            format!("{start}..{end}")
                        })
                        .join(", ");
                    result.messages.push(format!(
                        "{}: {} site(s) in '{input}'{}{positions}",
                        sites.enzyme.name,
                        sites.count(),
                        if positions.is_empty() { "" } else { " at " }
                    ));
                }
            }
            Operation::Digest {
                input,
                enzymes,
                output_prefix,
            } => {
                let dna = self.sequence(&input)?;
                let enzymes = Self::enzymes(&enzymes)?;
                let digestion = digest_detailed(&dna, &enzymes, &self.state.parameters)?;
                if digestion.is_no_cutter() {
                    result
                        .warnings
                        .push(format!("No enzyme cut '{input}'"));
                }
                let fragments = digestion.to_sequences(&dna)?;
                let prefix = output_prefix.unwrap_or_else(|| format!("{input}_digest"));
                result
                    .messages
                    .push(format!("Digest of '{input}' gave {} fragment(s)", fragments.len()));
                self.store_products(fragments, &prefix, &mut result);
            }
            Operation::RotateVector {
                input,
                enzyme,
                output_id,
            } => {
                let dna = self.sequence(&input)?;
                let enzyme = Self::enzymes(&[enzyme])?.remove(0);
                let params = &self.state.parameters;
                let rotated = rotate_vector(
                    &dna,
                    &enzyme,
                    params.rotation_anchor,
                    params.max_wobble_expansions,
                )?;
                let seq_id = self.unique_seq_id(&output_id.unwrap_or_else(|| format!("{input}_rotated")));
                result.messages.push(format!(
                    "Rotated '{input}' to its {} site as '{seq_id}'",
                    enzyme.name
                ));
                self.state.sequences.insert(seq_id.clone(), rotated);
                result.created_seq_ids.push(seq_id);
            }
            Operation::JoinParts {
                vector,
                parts,
                enzymes,
                output_prefix,
            } => {
                let dna = self.sequence(&vector)?;
                let part_seqs = self.sequences(&parts)?;
                let enzymes = Self::enzymes(&enzymes)?;
                let outcome = join_parts(&dna, &part_seqs, &enzymes, &self.state.parameters)?;
                result.warnings.extend(outcome.rejected.iter().cloned());
                result.messages.push(format!(
                    "Joined {} into '{vector}': {} circular product(s)",
                    outcome.order.join("+"),
                    outcome.plasmids.len()
                ));
                let prefix = output_prefix.unwrap_or_else(|| format!("{vector}_assembly"));
                self.store_products(outcome.plasmids, &prefix, &mut result);
            }
            Operation::FindAllAssemblyProducts {
                vector,
                parts,
                enzymes,
                output_prefix,
            } => {
                let dna = self.sequence(&vector)?;
                let part_seqs = self.sequences(&parts)?;
                let enzymes = Self::enzymes(&enzymes)?;
                let outcome = find_all_assembly_products(
                    &dna,
                    &part_seqs,
                    &enzymes,
                    &self.state.parameters,
                    self.oracle(),
                    &self.budget(),
                )?;
                if !outcome.exhaustive {
                    result.warnings.push(format!(
                        "{} parts exceed max_exhaustive_parts={}; only the given order was tried",
                        parts.len(),
                        self.state.parameters.max_exhaustive_parts
                    ));
                }
                result.messages.push(format!(
                    "{} product(s) from {} permutation(s), {:?}",
                    outcome.products.len(),
                    outcome.permutations_tried,
                    outcome.stop
                ));
                let prefix = output_prefix.unwrap_or_else(|| format!("{vector}_assembly"));
                let products = outcome.products.into_iter().map(|p| p.sequence).collect();
                self.store_products(products, &prefix, &mut result);
            }
            Operation::Simulate {
                name,
                vector,
                parts,
                enzymes,
            } => {
                let design = AssemblyParameters {
                    name: name.clone(),
                    enzyme_name: enzymes.join(","),
                    vector: self.sequence(&vector)?,
                    parts_in_order: self.sequences(&parts)?,
                };
                let enzymes = Self::enzymes(&enzymes)?;
                let report = assembly_simulate_with(
                    &design,
                    &enzymes,
                    &self.state.parameters,
                    self.oracle(),
                    &self.budget(),
                )?;
                for site in report.sites_found.iter().filter(|s| s.count == 0) {
                    result.warnings.push(format!(
                        "{} has no {} site",
                        site.sequence, site.enzyme
                    ));
                }
                result.messages.push(report.summary.clone());
                let products = report.products.into_iter().map(|p| p.sequence).collect();
                self.store_products(products, &name, &mut result);
            }
            Operation::LoadCommonFeatures { path } => {
                let features = CommonFeatures::load_from_path(&path)?;
                result.messages.push(format!(
                    "Loaded {} common feature(s) from '{path}'",
                    features.features.len()
                ));
                self.state.common_features = features;
            }
            Operation::SetParameter { name, value } => {
                self.state.parameters.set(&name, value.clone())?;
                result
                    .messages
                    .push(format!("Set parameter '{name}' to {value}"));
            }
        }

        info!("{}: {}", result.op_id, result.messages.join("; "));
        Ok(result)
    }
}

impl Engine for CloningEngine {
    fn apply(&mut self, op: Operation) -> EngineResult<OpResult> {
        let run_id = "interactive".to_string();
        let result = self.apply_internal(op.clone())?;
        self.journal.push(OperationRecord {
            run_id,
            op,
            result: result.clone(),
        });
        Ok(result)
    }

    fn apply_workflow(&mut self, wf: Workflow) -> EngineResult<Vec<OpResult>> {
        let mut results = Vec::new();
        for op in &wf.ops {
            let result = self.apply_internal(op.clone())?;
            self.journal.push(OperationRecord {
                run_id: wf.run_id.clone(),
                op: op.clone(),
                result: result.clone(),
            });
            results.push(result);
        }
        Ok(results)
    }

    fn snapshot(&self) -> &ProjectState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BACKBONE: &str = "TTTTACGTACGTAAAATTTTCCCCGGGG";
    const BODIES: [&str; 3] = ["ATGACCATGATTACG", "TTACCGGTAACCGGT", "CCGGAATTCCGGAAT"];
    const ENDS: [&str; 4] = ["AAC", "TGT", "GGA", "CAT"];

    fn part(left: &str, body: &str, right: &str) -> String {
        format!("GCTCTTCA{left}{body}{right}AGAAGAGC")
    }

    fn engine_with_design() -> CloningEngine {
        let mut engine = CloningEngine::new();
        engine
            .apply(Operation::AddSequence {
                id: "vector".to_string(),
                sequence: format!("ACACACACACGCTCTTCA{}{BACKBONE}{}AGAAGAGC", ENDS[3], ENDS[0]),
                circular: true,
            })
            .unwrap();
        for i in 0..3 {
            engine
                .apply(Operation::AddSequence {
                    id: format!("p{}", i + 1),
                    sequence: part(ENDS[i], BODIES[i], ENDS[i + 1]),
                    circular: false,
                })
                .unwrap();
        }
        engine
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_sequence_unique_ids() {
        let mut engine = CloningEngine::new();
        let op = Operation::AddSequence {
            id: "x".to_string(),
            sequence: "acgt".to_string(),
            circular: false,
        };
        engine.apply(op.clone()).unwrap();
        let res = engine.apply(op).unwrap();
        assert_eq!(res.created_seq_ids, vec!["x_2".to_string()]);
        assert_eq!(
            engine.state().sequences["x"].get_forward_string(),
            "ACGT"
        );
        assert_eq!(engine.operation_log().len(), 2);
    }

    #[test]
    fn test_add_sequence_rejects_bad_bases() {
        let mut engine = CloningEngine::new();
        let err = engine
            .apply(Operation::AddSequence {
                id: "bad".to_string(),
                sequence: "ACGTX".to_string(),
                circular: false,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(engine.operation_log().is_empty());
    }

    #[test]
    fn test_find_sites_and_digest() {
        let mut engine = CloningEngine::new();
        engine
            .apply(Operation::AddSequence {
                id: "x".to_string(),
                sequence: "AAAGAATTCAAAAAGAATTCAAA".to_string(),
                circular: false,
            })
            .unwrap();
        let res = engine
            .apply(Operation::FindSites {
                input: "x".to_string(),
                enzymes: ids(&["EcoRI"]),
            })
            .unwrap();
        assert!(res.messages[0].starts_with("EcoRI: 2 site(s)"));

        let res = engine
            .apply(Operation::Digest {
                input: "x".to_string(),
                enzymes: ids(&["EcoRI"]),
                output_prefix: Some("frag".to_string()),
            })
            .unwrap();
        assert_eq!(res.created_seq_ids, ids(&["frag_1", "frag_2", "frag_3"]));
        assert_eq!(
            engine.state().sequences["frag_1"].get_forward_string(),
            "AAAG"
        );
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn test_digest_single_cut_circular() {
        let mut engine = CloningEngine::new();
        engine
            .apply(Operation::AddSequence {
                id: "ring".to_string(),
                sequence: "AAGAATTCAA".to_string(),
                circular: true,
            })
            .unwrap();
        let res = engine
            .apply(Operation::Digest {
                input: "ring".to_string(),
                enzymes: ids(&["EcoRI"]),
                output_prefix: None,
            })
            .unwrap();
        assert!(res.warnings.is_empty());
        assert_eq!(res.created_seq_ids, ids(&["ring_digest_1"]));
        let opened = &engine.state().sequences["ring_digest_1"];
        assert_eq!(opened.get_forward_string(), "AATTCAAAAG");
        assert!(!opened.is_circular());

        let res = engine
            .apply(Operation::Digest {
                input: "ring".to_string(),
                enzymes: ids(&["BamHI"]),
                output_prefix: Some("uncut".to_string()),
            })
            .unwrap();
        assert_eq!(res.warnings, vec!["No enzyme cut 'ring'".to_string()]);
        assert_eq!(res.created_seq_ids, ids(&["uncut_1"]));
    }

    #[test]
    fn test_digest_uses_state_parameters() {
        let mut engine = CloningEngine::new();
        engine
            .apply(Operation::AddSequence {
                id: "x".to_string(),
                sequence: "AAAGAATTCAAAAAGAATTCAAA".to_string(),
                circular: false,
            })
            .unwrap();
        engine
            .apply(Operation::SetParameter {
                name: "max_fragments_per_digest".to_string(),
                value: serde_json::json!(2),
            })
            .unwrap();
        let err = engine
            .apply(Operation::Digest {
                input: "x".to_string(),
                enzymes: ids(&["EcoRI"]),
                output_prefix: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("max_fragments_per_digest=2"));
    }

    #[test]
    fn test_digest_unknown_enzyme_and_sequence() {
        let mut engine = engine_with_design();
        let err = engine
            .apply(Operation::Digest {
                input: "p1".to_string(),
                enzymes: ids(&["NoSuchI"]),
                output_prefix: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("NoSuchI"));

        let err = engine
            .apply(Operation::Digest {
                input: "missing".to_string(),
                enzymes: ids(&["SapI"]),
                output_prefix: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_rotate_vector() {
        let mut engine = CloningEngine::new();
        engine
            .apply(Operation::AddSequence {
                id: "v".to_string(),
                sequence: "TTTTTGCTCTTCA".to_string(),
                circular: true,
            })
            .unwrap();
        let res = engine
            .apply(Operation::RotateVector {
                input: "v".to_string(),
                enzyme: "SapI".to_string(),
                output_id: None,
            })
            .unwrap();
        assert_eq!(res.created_seq_ids, ids(&["v_rotated"]));
        assert_eq!(
            engine.state().sequences["v_rotated"].get_forward_string(),
            "GCTCTTCATTTTT"
        );
    }

    #[test]
    fn test_join_parts_and_search() {
        let mut engine = engine_with_design();
        let res = engine
            .apply(Operation::JoinParts {
                vector: "vector".to_string(),
                parts: ids(&["p1", "p2", "p3"]),
                enzymes: ids(&["SapI"]),
                output_prefix: Some("joined".to_string()),
            })
            .unwrap();
        assert_eq!(res.created_seq_ids, ids(&["joined_1"]));
        let joined = engine.state().sequences["joined_1"].clone();
        assert!(joined.is_circular());
        assert!(joined.contains_either_strand(BACKBONE));

        let res = engine
            .apply(Operation::FindAllAssemblyProducts {
                vector: "vector".to_string(),
                parts: ids(&["p3", "p1", "p2"]),
                enzymes: ids(&["SapI"]),
                output_prefix: Some("found".to_string()),
            })
            .unwrap();
        assert_eq!(res.created_seq_ids.len(), 1);
        assert!(res.messages[0].contains("6 permutation(s)"));
        assert_eq!(
            engine.state().sequences["found_1"].canonical_key(),
            joined.canonical_key()
        );
    }

    #[test]
    fn test_join_parts_wrong_order_fails() {
        let mut engine = engine_with_design();
        let err = engine
            .apply(Operation::JoinParts {
                vector: "vector".to_string(),
                parts: ids(&["p1", "p3", "p2"]),
                enzymes: ids(&["SapI"]),
                output_prefix: None,
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompatibleEnds);
        assert!(err.message.contains("'p1' and 'p3'"));
    }

    #[test]
    fn test_simulate() {
        let mut engine = engine_with_design();
        let res = engine
            .apply(Operation::Simulate {
                name: "demo".to_string(),
                vector: "vector".to_string(),
                parts: ids(&["p1", "p2", "p3"]),
                enzymes: ids(&["SapI"]),
            })
            .unwrap();
        assert!(res.messages[0].starts_with("demo: one product"));
        assert_eq!(res.created_seq_ids, ids(&["demo_1"]));
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn test_set_parameter() {
        let mut engine = engine_with_design();
        let res = engine
            .apply(Operation::SetParameter {
                name: "max_exhaustive_parts".to_string(),
                value: serde_json::json!(2),
            })
            .unwrap();
        assert_eq!(res.messages, vec!["Set parameter 'max_exhaustive_parts' to 2".to_string()]);
        assert_eq!(engine.state().parameters.max_exhaustive_parts, 2);

        let res = engine
            .apply(Operation::FindAllAssemblyProducts {
                vector: "vector".to_string(),
                parts: ids(&["p1", "p2", "p3"]),
                enzymes: ids(&["SapI"]),
                output_prefix: None,
            })
            .unwrap();
        assert_eq!(res.warnings.len(), 1);
        assert!(res.messages[0].contains("1 permutation(s)"));

        let err = engine
            .apply(Operation::SetParameter {
                name: "no_such_parameter".to_string(),
                value: serde_json::json!(1),
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = engine
            .apply(Operation::SetParameter {
                name: "max_fragments_per_digest".to_string(),
                value: serde_json::json!(0),
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_workflow_from_json() {
        let json = r#"{
            "run_id": "wf-1",
            "ops": [
                {"AddSequence": {"id": "x", "sequence": "AAGGATCCAA"}},
                {"Digest": {"input": "x", "enzymes": ["BamHI"], "output_prefix": null}}
            ]
        }"#;
        let wf: Workflow = serde_json::from_str(json).unwrap();
        let mut engine = CloningEngine::new();
        let results = engine.apply_workflow(wf).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].created_seq_ids, ids(&["x_digest_1", "x_digest_2"]));
        assert!(engine.operation_log().iter().all(|r| r.run_id == "wf-1"));
    }

    #[test]
    fn test_load_fasta_file() {
        let mut file = tempfile::Builder::new().suffix(".fa").tempfile().unwrap();
        writeln!(file, ">first some description\nACGTACGT\n>second\nGGATCC").unwrap();
        let mut engine = CloningEngine::new();
        let res = engine
            .apply(Operation::LoadFile {
                path: file.path().to_str().unwrap().to_string(),
                as_id: Some("loaded".to_string()),
                circular: Some(true),
            })
            .unwrap();
        assert_eq!(res.created_seq_ids, ids(&["loaded", "loaded_2"]));
        let second = &engine.state().sequences["loaded_2"];
        assert_eq!(second.get_forward_string(), "GGATCC");
        assert!(second.is_circular());
    }

    #[test]
    fn test_state_round_trip() {
        let engine = engine_with_design();
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        engine.state().save_to_path(path).unwrap();
        let state = ProjectState::load_from_path(path).unwrap();
        assert_eq!(state.sequences.len(), 4);
        assert!(state.sequences["vector"].is_circular());
        assert_eq!(
            state.sequences["p2"].get_forward_string(),
            engine.state().sequences["p2"].get_forward_string()
        );
        assert!(ProjectState::load_from_path("/nonexistent/state.json").is_err());
    }

    #[test]
    fn test_state_load_rejects_invalid_bases() {
        let engine = engine_with_design();
        let mut value = serde_json::to_value(engine.state()).unwrap();
        value["sequences"]["p1"]["seq"]["seq"] = serde_json::json!(b"acgtzz".to_vec());
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        std::fs::write(path, value.to_string()).unwrap();
        let err = ProjectState::load_from_path(path).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("invalid nucleotide 'z'"));
    }

    #[test]
    fn test_load_common_features() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "backbone", "kind": "Origin", "sequence": "{BACKBONE}"}}]"#
        )
        .unwrap();
        let mut engine = engine_with_design();
        let res = engine
            .apply(Operation::LoadCommonFeatures {
                path: file.path().to_str().unwrap().to_string(),
            })
            .unwrap();
        assert!(res.messages[0].contains("1 common feature(s)"));
        assert!(engine.oracle().is_some());
        let res = engine
            .apply(Operation::Simulate {
                name: "checked".to_string(),
                vector: "vector".to_string(),
                parts: ids(&["p1", "p2", "p3"]),
                enzymes: ids(&["SapI"]),
            })
            .unwrap();
        assert!(res.messages[0].starts_with("checked: one product"));
    }
}
