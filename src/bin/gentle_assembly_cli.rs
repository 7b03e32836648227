use anyhow::{Result, anyhow};
use gentle_assembly::{
    ENZYMES,
    assembly::{AssemblyDesign, SearchBudget, assembly_simulate},
    common_features::{CommonFeatures, PlasmidOracle},
    dna_sequence::DNAsequence,
    engine::{CloningEngine, Engine, Operation, ProjectState, Workflow},
    fragment::{digest_to_fragments, type_iis_digest},
    parameters::EngineParameters,
    restriction_enzyme::{EnzymeClass, RestrictionEnzyme, find_restriction_sites},
};
use serde::Serialize;
use std::{env, fs, path::Path};

const DEFAULT_STATE_PATH: &str = ".gentle_assembly_state.json";

#[derive(Serialize)]
struct SequenceSummary {
    id: String,
    name: Option<String>,
    length: usize,
    circular: bool,
}

#[derive(Serialize)]
struct SitesSummary {
    sequence: String,
    enzyme: String,
    /// 1-based, start > end on the reverse strand
    positions: Vec<(usize, usize)>,
}

fn usage() {
    eprintln!(
        "Usage:\n  \
  gentle_assembly_cli enzymes [TypeII|TypeIIs]\n  \
  gentle_assembly_cli capabilities\n  \
  gentle_assembly_cli sites [--circular] FILE ENZYME...\n  \
  gentle_assembly_cli digest [--circular] FILE ENZYME...\n  \
  gentle_assembly_cli simulate DESIGN.json [--parameters PATH] [--features PATH]\n  \
  gentle_assembly_cli [--state PATH] op '<operation-json>'\n  \
  gentle_assembly_cli [--state PATH] workflow '<workflow-json>'\n  \
  gentle_assembly_cli [--state PATH] state-summary\n\n  \
  Tip: pass @file.json instead of inline JSON; RUST_LOG=info shows progress"
    );
}

fn load_json_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read JSON file '{path}': {e}")),
        None => Ok(value.to_string()),
    }
}

fn load_state(path: &str) -> Result<ProjectState> {
    match Path::new(path).exists() {
        true => Ok(ProjectState::load_from_path(path)?),
        false => Ok(ProjectState::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_global_state_arg(args: &[String]) -> (String, usize) {
    if args.len() >= 3 && args[1] == "--state" {
        return (args[2].clone(), 3);
    }
    (DEFAULT_STATE_PATH.to_string(), 1)
}

/// Value following `flag`, if present
fn option_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| anyhow!("Missing value for {flag}")),
        None => Ok(None),
    }
}

fn load_sequences(path: &str, circular: bool) -> Result<Vec<DNAsequence>> {
    let extension = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mut ret = match extension.as_str() {
        "gb" | "gbk" | "genbank" => DNAsequence::from_genbank_file(path)?,
        _ => DNAsequence::from_fasta_file(path)?,
    };
    if circular {
        ret.iter_mut().for_each(|dna| dna.set_circular(true));
    }
    Ok(ret)
}

/// `[--circular] FILE ENZYME...`
fn sequence_and_enzymes(args: &[String]) -> Result<(Vec<DNAsequence>, Vec<RestrictionEnzyme>)> {
    let circular = args.iter().any(|a| a == "--circular");
    let rest: Vec<&str> = args
        .iter()
        .filter(|a| *a != "--circular")
        .map(|a| a.as_str())
        .collect();
    let (path, names) = rest
        .split_first()
        .ok_or_else(|| anyhow!("Missing sequence file"))?;
    if names.is_empty() {
        return Err(anyhow!("Missing enzyme name(s)"));
    }
    let enzymes = ENZYMES.restriction_enzymes_by_name(names)?;
    Ok((load_sequences(path, circular)?, enzymes))
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let (state_path, cmd_idx) = parse_global_state_arg(&args);
    let Some(command) = args.get(cmd_idx) else {
        usage();
        return Err(anyhow!("Missing command"));
    };
    let rest = &args[cmd_idx + 1..];

    match command.as_str() {
        "enzymes" => match rest.first() {
            Some(name) => {
                let class = EnzymeClass::all()
                    .into_iter()
                    .find(|c| c.to_string().eq_ignore_ascii_case(name))
                    .ok_or_else(|| anyhow!("Unknown enzyme class '{name}'"))?;
                print_json(&ENZYMES.of_class(class))
            }
            None => print_json(ENZYMES.restriction_enzymes()),
        },
        "capabilities" => print_json(&CloningEngine::capabilities()),
        "sites" => {
            let (sequences, enzymes) = sequence_and_enzymes(rest)?;
            let params = EngineParameters::default();
            let mut ret = vec![];
            for dna in &sequences {
                for sites in find_restriction_sites(dna, &enzymes, params.max_wobble_expansions)? {
                    ret.push(SitesSummary {
                        sequence: dna.display_name(),
                        enzyme: sites.enzyme.name.clone(),
                        positions: sites.all().iter().map(|p| p.human_friendly(false)).collect(),
                    });
                }
            }
            print_json(&ret)
        }
        "digest" => {
            let (sequences, enzymes) = sequence_and_enzymes(rest)?;
            for dna in &sequences {
                match enzymes.iter().all(|re| re.is_type_iis()) {
                    true => print_json(&type_iis_digest(dna, &enzymes)?)?,
                    false => print_json(&digest_to_fragments(dna, &enzymes)?)?,
                }
            }
            Ok(())
        }
        "simulate" => {
            let path = rest.first().ok_or_else(|| anyhow!("Missing design file"))?;
            let design = AssemblyDesign::load_from_path(path)?.to_parameters()?;
            let params = match option_value(rest, "--parameters")? {
                Some(path) => EngineParameters::load_from_path(path)?,
                None => EngineParameters::default(),
            };
            let features = match option_value(rest, "--features")? {
                Some(path) => CommonFeatures::load_from_path(path)?,
                None => CommonFeatures::default(),
            };
            let oracle: Option<&dyn PlasmidOracle> = match features.is_empty() {
                true => None,
                false => Some(&features),
            };
            let report = assembly_simulate(
                &design,
                &params,
                oracle,
                &SearchBudget::from_parameters(&params),
            )?;
            eprintln!("{}", report.summary);
            print_json(&report)
        }
        "state-summary" => {
            let state = load_state(&state_path)?;
            let sequences: Vec<SequenceSummary> = state
                .sequences
                .iter()
                .map(|(id, dna)| SequenceSummary {
                    id: id.to_string(),
                    name: dna.name().clone(),
                    length: dna.len(),
                    circular: dna.is_circular(),
                })
                .collect();
            print_json(&sequences)
        }
        "op" => {
            let json = load_json_arg(rest.first().ok_or_else(|| anyhow!("Missing operation JSON"))?)?;
            let op: Operation =
                serde_json::from_str(&json).map_err(|e| anyhow!("Invalid operation JSON: {e}"))?;
            let mut engine = CloningEngine::from_state(load_state(&state_path)?);
            let result = engine.apply(op)?;
            engine.state().save_to_path(&state_path)?;
            print_json(&result)
        }
        "workflow" => {
            let json = load_json_arg(rest.first().ok_or_else(|| anyhow!("Missing workflow JSON"))?)?;
            let workflow: Workflow =
                serde_json::from_str(&json).map_err(|e| anyhow!("Invalid workflow JSON: {e}"))?;
            let mut engine = CloningEngine::from_state(load_state(&state_path)?);
            let results = engine.apply_workflow(workflow)?;
            engine.state().save_to_path(&state_path)?;
            print_json(&results)
        }
        _ => {
            usage();
            Err(anyhow!("Unknown command '{command}'"))
        }
    }
}
