//! Domain models for DtoM.
//!
//! Canonical definitions for the core entities:
//! - `CharacterSchema`: immutable, ordered list of characters
//! - `StateToken`: one canonical matrix cell
//! - `MatrixRow` / `Matrix`: per-species rows and the assembled matrix
//! - `ValidationVerdict`: one audit judgement for one cell

pub mod error;
pub mod row;
pub mod schema;
pub mod token;
pub mod verdict;

// Re-export main types and errors
pub use error::{DtomError, FormatError, Result, SchemaError, ServiceError};
pub use row::{Matrix, MatrixEntry, MatrixRow, RowStatus};
pub use schema::{strip_code_fences, CharacterDefinition, CharacterId, CharacterSchema};
pub use token::{ParseError, StateId, StateSet, StateToken, MAX_STATE_ID};
pub use verdict::{ValidationVerdict, VerdictResult};
