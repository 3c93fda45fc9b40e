//! Domain-level error taxonomy for DtoM.

use crate::domain::schema::CharacterId;

/// Errors raised while loading or validating a character schema.
///
/// Always fatal: every column ordering of the run depends on the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema has no characters")]
    Empty,

    #[error("duplicate character id: {0}")]
    DuplicateCharacter(u32),

    #[error("invalid character id: {0:?}")]
    InvalidCharacterId(String),

    #[error("character {character} has {count} state(s); at least 2 are required")]
    TooFewStates { character: u32, count: usize },

    #[error("character {character} lists state {state} more than once")]
    DuplicateState { character: u32, state: u8 },

    #[error("character {character} has invalid state id {state:?}; state ids are single digits")]
    InvalidStateId { character: u32, state: String },

    #[error("schema is not valid JSON: {0}")]
    Decode(String),
}

/// Failures of the NL collaborator (unreachable, timed out, unusable reply).
///
/// Always recovered locally by the caller; never fatal for a whole run
/// except during schema proposal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator timed out after {0}s")]
    Timeout(u64),

    #[error("malformed collaborator reply: {0}")]
    MalformedReply(String),
}

/// A row that cannot be written without breaking column alignment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("row for {species:?} has {actual} cell(s), schema has {expected}")]
    RowLength {
        species: String,
        expected: usize,
        actual: usize,
    },

    #[error("no character {0} in schema")]
    UnknownCharacter(CharacterId),

    #[error("malformed matrix document: {0}")]
    Malformed(String),
}

/// DtoM domain errors.
#[derive(Debug, thiserror::Error)]
pub enum DtomError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("format error: {0}")]
    Format(#[from] FormatError),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for DtoM domain operations.
pub type Result<T> = std::result::Result<T, DtomError>;
