use crate::{
    error::{EngineError, EngineResult, ErrorCode},
    restriction_enzyme::DEFAULT_MAX_WOBBLE_EXPANSIONS,
    vector::RotationAnchor,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunable bounds of the digest and assembly search. None of these are
/// biological constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParameters {
    pub max_fragments_per_digest: usize,
    pub max_wobble_expansions: usize,
    /// Above this many non-vector parts only the given order is tried
    pub max_exhaustive_parts: usize,
    /// With more permutations than this, the search stops at the first
    /// product the plasmid oracle accepts
    pub early_exit_after_permutations: usize,
    pub max_permutations: Option<usize>,
    pub time_budget_ms: Option<u64>,
    pub rotation_anchor: RotationAnchor,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            max_fragments_per_digest: 80_000,
            max_wobble_expansions: DEFAULT_MAX_WOBBLE_EXPANSIONS,
            max_exhaustive_parts: 5,
            early_exit_after_permutations: 24,
            max_permutations: None,
            time_budget_ms: None,
            rotation_anchor: RotationAnchor::Forward,
        }
    }
}

impl EngineParameters {
    pub fn load_from_path(path: &str) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError {
            code: ErrorCode::Io,
            message: format!("Could not read parameter file '{path}': {e}"),
        })?;
        let ret: Self = serde_json::from_str(&text).map_err(|e| {
            EngineError::invalid_input(format!("Could not parse parameter JSON '{path}': {e}"))
        })?;
        ret.validate()?;
        Ok(ret)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_fragments_per_digest == 0 {
            return Err(EngineError::invalid_input(
                "max_fragments_per_digest must be >= 1",
            ));
        }
        if self.max_wobble_expansions == 0 {
            return Err(EngineError::invalid_input("max_wobble_expansions must be >= 1"));
        }
        Ok(())
    }

    /// Sets one field by its serialized name.
    pub fn set(&mut self, name: &str, value: serde_json::Value) -> EngineResult<()> {
        let mut fields = serde_json::to_value(&*self)?;
        let slot = fields
            .as_object_mut()
            .and_then(|map| map.get_mut(name))
            .ok_or_else(|| EngineError::not_found(format!("Unknown parameter '{name}'")))?;
        *slot = value;
        let updated: Self = serde_json::from_value(fields).map_err(|e| {
            EngineError::invalid_input(format!("Invalid value for parameter '{name}': {e}"))
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}
