use crate::{
    dna_sequence::DNAsequence,
    error::{EngineError, EngineResult, ErrorCode},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureClass {
    Origin,
    Marker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonFeature {
    pub name: String,
    pub kind: FeatureClass,
    pub sequence: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plausibility {
    Plausible,
    Implausible(String),
    /// Nothing to compare against
    Unknown,
}

impl Plausibility {
    pub fn is_plausible(&self) -> bool {
        *self == Plausibility::Plausible
    }
}

/// Judges whether a circular product looks like a usable plasmid.
pub trait PlasmidOracle: Send + Sync {
    fn assess(&self, vector: &DNAsequence, product: &DNAsequence) -> Plausibility;
}

pub fn assess(
    oracle: Option<&dyn PlasmidOracle>,
    vector: &DNAsequence,
    product: &DNAsequence,
) -> Plausibility {
    match oracle {
        Some(oracle) => oracle.assess(vector, product),
        None => Plausibility::Unknown,
    }
}

/// Table of known origins and markers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonFeatures {
    pub features: Vec<CommonFeature>,
}

impl CommonFeatures {
    pub fn new(features: Vec<CommonFeature>) -> EngineResult<Self> {
        let features = features
            .into_iter()
            .map(|mut feature| {
                let bases =
                    DNAsequence::validate_dna_sequence(Some(&feature.name), feature.sequence.as_bytes())?;
                if bases.is_empty() {
                    return Err(EngineError::invalid_input(format!(
                        "Common feature '{}' has no sequence",
                        feature.name
                    )));
                }
                feature.sequence = String::from_utf8_lossy(&bases).to_string();
                Ok(feature)
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { features })
    }

    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let features: Vec<CommonFeature> = serde_json::from_str(text)?;
        Self::new(features)
    }

    pub fn load_from_path(path: &str) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError {
            code: ErrorCode::Io,
            message: format!("Could not read common features '{path}': {e}"),
        })?;
        Self::from_json_str(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features present exactly once in the vector
    pub fn expected_features(&self, vector: &DNAsequence) -> Vec<&CommonFeature> {
        self.features
            .iter()
            .filter(|f| vector.count_either_strand(&f.sequence) == 1)
            .collect()
    }
}

impl PlasmidOracle for CommonFeatures {
    fn assess(&self, vector: &DNAsequence, product: &DNAsequence) -> Plausibility {
        let expected = self.expected_features(vector);
        if expected.is_empty() {
            return Plausibility::Unknown;
        }
        for feature in &expected {
            let found = product.count_either_strand(&feature.sequence);
            if found != 1 {
                return Plausibility::Implausible(format!(
                    "{:?} '{}' found {found} times",
                    feature.kind, feature.name
                ));
            }
        }
        if let Some(feature) = self
            .features
            .iter()
            .find(|f| product.count_either_strand(&f.sequence) > 1)
        {
            return Plausibility::Implausible(format!(
                "{:?} '{}' is duplicated",
                feature.kind, feature.name
            ));
        }
        Plausibility::Plausible
    }
}
