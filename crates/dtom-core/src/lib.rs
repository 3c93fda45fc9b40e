//! DtoM Core Library
//!
//! Turns taxonomic species descriptions into an audited NEXUS character
//! matrix. The natural-language work sits behind [`MatrixCollaborator`]; this
//! crate owns the schema, the state grammar, the correction loop and the
//! document format.

pub mod assembler;
pub mod collaborator;
pub mod correction;
pub mod domain;
pub mod extractor;
pub mod fakes;
pub mod grammar;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod reporting;
pub mod segmenter;
pub mod serializer;
pub mod telemetry;
pub mod validator;

pub use domain::{
    strip_code_fences, CharacterDefinition, CharacterId, CharacterSchema, DtomError, FormatError,
    Matrix, MatrixEntry, MatrixRow, Result, RowStatus, SchemaError, ServiceError, StateId,
    StateSet, StateToken, ValidationVerdict, VerdictResult,
};

pub use assembler::MatrixAssembler;
pub use collaborator::{MatrixCollaborator, ServiceResult};
pub use correction::{
    AuditFailurePolicy, CellCorrection, CorrectionLog, CorrectionLoop, CorrectionPolicy,
    CorrectionResult,
};
pub use extractor::{ExtractionResults, SpeciesExtractor, MISSING_SENTINEL};
pub use grammar::{AbsenceMapping, StateTokenGrammar};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::{build_schema, into_matrix, PipelineConfig, PipelineContext, SpeciesOutcome};
pub use reporting::{read_run_report, write_run_report, RunReport, SpeciesReport};
pub use segmenter::{Segmenter, SpeciesDescription, DEFAULT_HEADING_PATTERN};
pub use serializer::{
    parse_matrix_block, read_dimensions, serialize, serialize_matrix, Dimensions, SerializedMatrix,
};
pub use telemetry::init_tracing;
pub use validator::{normalize_verdicts, ConsistencyValidator};

/// DtoM version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
