use thiserror::Error;

pub type EpResult<T> = Result<T, EpError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EpError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown dimension: {dim}")]
    UnknownDim { dim: String },

    #[error("Duplicate dimension: {dim}")]
    DuplicateDim { dim: String },

    #[error("Key arity mismatch (expected={expected}, got={actual})")]
    KeyArity { expected: usize, actual: usize },

    #[error("Value width mismatch (expected={expected}, got={actual})")]
    ValueWidth { expected: usize, actual: usize },

    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("Dimension mismatch: {what}")]
    DimMismatch { what: String },
}
