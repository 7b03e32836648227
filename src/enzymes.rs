use crate::{
    error::{EngineError, EngineResult},
    restriction_enzyme::{EnzymeClass, RestrictionEnzyme},
};
use anyhow::{Result, anyhow};
use itertools::Itertools;
use log::{error, info};
use std::fs;

const RUNTIME_ENZYMES_PATH: &str = "data/resources/enzymes.json";
const BUILTIN_ENZYMES_JSON: &str = include_str!("../assets/enzymes.json");

#[derive(Clone, Debug)]
pub struct Enzymes {
    restriction_enzymes: Vec<RestrictionEnzyme>,
}

impl Enzymes {
    pub fn new(json_text: &str) -> Result<Self> {
        let res: serde_json::Value = serde_json::from_str(json_text)?;
        let arr = res
            .as_array()
            .ok_or(anyhow!("Enzymes file is not a JSON array"))?;
        let mut restriction_enzymes = vec![];
        for row in arr {
            match row.get("type").and_then(|t| t.as_str()) {
                Some("restriction") => {
                    let mut re: RestrictionEnzyme = serde_json::from_value(row.clone())
                        .map_err(|e| anyhow!("Bad restriction enzyme {row}: {e}"))?;
                    re.finalize().map_err(|e| anyhow!("{e}"))?;
                    restriction_enzymes.push(re);
                }
                Some(other) => return Err(anyhow!("Unknown enzyme type '{other}' in {row}")),
                None => return Err(anyhow!("Missing enzyme type for {row}")),
            }
        }
        if let Some(name) = restriction_enzymes
            .iter()
            .map(|re| &re.name)
            .duplicates()
            .next()
        {
            return Err(anyhow!("Enzyme '{name}' is listed more than once"));
        }
        Ok(Self {
            restriction_enzymes,
        })
    }

    pub fn from_path(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::new(&text)
    }

    pub fn restriction_enzymes(&self) -> &Vec<RestrictionEnzyme> {
        &self.restriction_enzymes
    }

    pub fn of_class(&self, class: EnzymeClass) -> Vec<&RestrictionEnzyme> {
        self.restriction_enzymes
            .iter()
            .filter(|re| re.class == class)
            .collect()
    }

    /// Looks up every name, in the order given. Names are matched without
    /// regard to case.
    pub fn restriction_enzymes_by_name(&self, names: &[&str]) -> EngineResult<Vec<RestrictionEnzyme>> {
        names
            .iter()
            .map(|name| {
                self.restriction_enzymes
                    .iter()
                    .find(|re| re.name.eq_ignore_ascii_case(name.trim()))
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::not_found(format!(
                            "Unknown restriction enzyme '{}'; available classes: {}",
                            name.trim(),
                            EnzymeClass::all().iter().join(", ")
                        ))
                    })
            })
            .collect()
    }

    /// Same as `restriction_enzymes_by_name`, for a comma-separated list
    pub fn restriction_enzymes_from_list(&self, list: &str) -> EngineResult<Vec<RestrictionEnzyme>> {
        let names: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Err(EngineError::invalid_input("No enzyme name given"));
        }
        self.restriction_enzymes_by_name(&names)
    }
}

impl Default for Enzymes {
    fn default() -> Self {
        if let Ok(text) = fs::read_to_string(RUNTIME_ENZYMES_PATH) {
            match Enzymes::new(&text) {
                Ok(custom) if !custom.restriction_enzymes.is_empty() => {
                    info!("Using enzyme table from {RUNTIME_ENZYMES_PATH}");
                    return custom;
                }
                Ok(_) => {}
                Err(e) => error!("Ignoring {RUNTIME_ENZYMES_PATH}: {e}"),
            }
        }
        Enzymes::new(BUILTIN_ENZYMES_JSON).unwrap_or_else(|e| {
            error!("Built-in enzyme table is broken: {e}");
            Enzymes {
                restriction_enzymes: vec![],
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, restriction_enzyme::DEFAULT_MAX_WOBBLE_EXPANSIONS};
    use std::io::Write;

    #[test]
    fn test_builtin_table() {
        let enzymes = Enzymes::new(BUILTIN_ENZYMES_JSON).unwrap();
        assert!(enzymes.restriction_enzymes().iter().any(|e| e.name == "EcoRI"));
        let sap_i = &enzymes.restriction_enzymes_by_name(&["sapi"]).unwrap()[0];
        assert_eq!(sap_i.name, "SapI");
        assert_eq!(sap_i.end_length, 3);
        assert!(!sap_i.is_palindromic());
        assert!(enzymes
            .of_class(EnzymeClass::TypeIIs)
            .iter()
            .all(|re| re.top_cut > 0));
    }

    #[test]
    fn test_builtin_bsa_i_geometry() {
        let enzymes = Enzymes::new(BUILTIN_ENZYMES_JSON).unwrap();
        let bsa_i = &enzymes.restriction_enzymes_by_name(&["BsaI"]).unwrap()[0];
        let seq = crate::dna_sequence::DNAsequence::from_sequence("GGTCTCAAATGCCCCC").unwrap();
        let site = bsa_i.get_sites(&seq, DEFAULT_MAX_WOBBLE_EXPANSIONS).unwrap().positions[0];
        let cut = crate::cut_site::cut_positions(&seq, &site, bsa_i).unwrap();
        assert_eq!(cut.window, "AATG");
    }

    #[test]
    fn test_unknown_enzyme() {
        let enzymes = Enzymes::new(BUILTIN_ENZYMES_JSON).unwrap();
        let err = enzymes.restriction_enzymes_from_list("SapI, NoSuchI").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(err.message.contains("NoSuchI"));
        assert!(err.message.contains("TypeII, TypeIIs"));
        let found = enzymes.restriction_enzymes_from_list("BsaI,SapI").unwrap();
        assert_eq!(found[0].name, "BsaI");
        assert_eq!(found[1].name, "SapI");
        assert!(enzymes.restriction_enzymes_from_list(" , ").is_err());
    }

    #[test]
    fn test_bad_tables_rejected() {
        assert!(Enzymes::new("{}").is_err());
        assert!(Enzymes::new(r#"[{"name": "X"}]"#).is_err());
        assert!(Enzymes::new(
            r#"[{"type": "restriction", "name": "Bad", "sequence": "GGXT", "top_cut": 1, "bottom_cut": 5, "class": "TypeIIs"}]"#
        )
        .is_err());
        let row = r#"{"type": "restriction", "name": "Twice", "sequence": "GGTCTC", "top_cut": 1, "bottom_cut": 5, "class": "TypeIIs"}"#;
        assert!(Enzymes::new(&format!("[{row},{row}]")).is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"type": "restriction", "name": "MyI", "sequence": "ACGGTA", "top_cut": 2, "bottom_cut": 6, "class": "TypeIIs", "note": "custom"}}]"#
        )
        .unwrap();
        let enzymes = Enzymes::from_path(file.path().to_str().unwrap()).unwrap();
        let my_i = &enzymes.restriction_enzymes()[0];
        assert_eq!(my_i.end_length, 4);
        assert_eq!(my_i.note.as_deref(), Some("custom"));
    }
}
