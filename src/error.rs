use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The caller's input was unusable (bad bases, blank part, missing site).
    InvalidInput,
    /// A named enzyme or sequence does not exist.
    NotFound,
    /// A cut or slice fell outside a linear sequence, or wrapped twice.
    Geometry,
    /// No sticky ends matched between two fragment sets.
    IncompatibleEnds,
    /// Several candidate sites where exactly one was required.
    Ambiguous,
    /// The engine's own invariant broke.
    Internal,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Geometry, message)
    }

    pub fn incompatible_ends(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IncompatibleEnds, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Ambiguous, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::invalid_input(format!("Could not parse JSON: {err}"))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
