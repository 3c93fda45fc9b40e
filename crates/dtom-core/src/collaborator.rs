//! Contract for the natural-language collaborator.
//!
//! Schema proposal, state extraction and row auditing are black-box
//! request/response calls. The pipeline only relies on the structural
//! guarantees below, never on the collaborator being right.

use async_trait::async_trait;

use crate::domain::{CharacterDefinition, CharacterSchema, ServiceError, ValidationVerdict};

/// Result type for collaborator calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[async_trait]
pub trait MatrixCollaborator: Send + Sync {
    /// Propose a shared character schema for the whole corpus.
    async fn propose_schema(&self, corpus: &str) -> ServiceResult<CharacterSchema>;

    /// Return a free-text state assertion for one character of one species.
    async fn extract_state(
        &self,
        description: &str,
        character: &CharacterDefinition,
    ) -> ServiceResult<String>;

    /// Audit a formatted row against its source description.
    async fn audit_matrix(
        &self,
        description: &str,
        schema: &CharacterSchema,
        formatted_row: &str,
    ) -> ServiceResult<Vec<ValidationVerdict>>;
}
