//! Row audit against the source description.

use std::collections::HashMap;

use tracing::debug;

use crate::collaborator::{MatrixCollaborator, ServiceResult};
use crate::domain::{CharacterSchema, MatrixRow, ValidationVerdict, VerdictResult};

pub struct ConsistencyValidator<'a> {
    collaborator: &'a dyn MatrixCollaborator,
}

impl<'a> ConsistencyValidator<'a> {
    pub fn new(collaborator: &'a dyn MatrixCollaborator) -> Self {
        Self { collaborator }
    }

    /// Audit `row` and return exactly one verdict per character, in schema order.
    pub async fn validate(
        &self,
        description: &str,
        row: &MatrixRow,
        schema: &CharacterSchema,
    ) -> ServiceResult<Vec<ValidationVerdict>> {
        let reply = self
            .collaborator
            .audit_matrix(description, schema, &row.formatted())
            .await?;
        Ok(normalize_verdicts(schema, reply))
    }
}

/// Align a collaborator reply with the schema.
///
/// Verdicts for unknown characters are dropped, the first verdict per
/// character wins, and characters the reply skipped get `NotApplicable`.
pub fn normalize_verdicts(
    schema: &CharacterSchema,
    reply: Vec<ValidationVerdict>,
) -> Vec<ValidationVerdict> {
    let mut by_id = HashMap::with_capacity(reply.len());
    for verdict in reply {
        if !schema.contains(verdict.character_id) {
            debug!(character = verdict.character_id.get(), "dropping verdict outside schema");
            continue;
        }
        by_id.entry(verdict.character_id).or_insert(verdict);
    }

    schema
        .iter()
        .map(|c| {
            by_id.remove(&c.id).unwrap_or_else(|| {
                debug!(character = c.id.get(), "audit skipped character");
                ValidationVerdict::with_result(c.id.get(), VerdictResult::NotApplicable)
            })
        })
        .collect()
}
