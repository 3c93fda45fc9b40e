//! Scripted in-memory collaborator (testing only)
//!
//! [`ScriptedCollaborator`] answers from canned replies so the extraction,
//! correction and pipeline stages can be exercised without a language model.
//!
//! Audit replies are resolved in order: the scripted queue first, then a
//! reference row (cells that differ are reported as `Error` with the
//! reference state as the expected state), then all-`Correct`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::collaborator::{MatrixCollaborator, ServiceResult};
use crate::domain::{
    CharacterDefinition, CharacterSchema, MatrixRow, ServiceError, StateToken, ValidationVerdict,
};

type Reply = ServiceResult<String>;

/// Collaborator that replays scripted answers and records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedCollaborator {
    schema: Option<CharacterSchema>,
    extractions: HashMap<u32, Reply>,
    species_extractions: Vec<(String, u32, Reply)>,
    references: Vec<(String, MatrixRow)>,
    audits: Mutex<VecDeque<ServiceResult<Vec<ValidationVerdict>>>>,
    audited_rows: Mutex<Vec<String>>,
    extract_calls: AtomicUsize,
    audit_calls: AtomicUsize,
}

fn cells() -> &'static Regex {
    static CELLS: OnceLock<Regex> = OnceLock::new();
    CELLS.get_or_init(|| Regex::new(r"\([^)]*\)|\S+").expect("static pattern"))
}

impl ScriptedCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema returned by `propose_schema`. Without one the call fails.
    pub fn with_schema(mut self, schema: CharacterSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Extraction reply for a character, for every species.
    pub fn with_extraction(mut self, character: u32, reply: impl Into<String>) -> Self {
        self.extractions.insert(character, Ok(reply.into()));
        self
    }

    pub fn with_failed_extraction(mut self, character: u32, error: ServiceError) -> Self {
        self.extractions.insert(character, Err(error));
        self
    }

    /// Extraction reply used when the description contains `marker`.
    /// Takes precedence over [`with_extraction`](Self::with_extraction).
    pub fn with_species_extraction(
        mut self,
        marker: impl Into<String>,
        character: u32,
        reply: impl Into<String>,
    ) -> Self {
        self.species_extractions
            .push((marker.into(), character, Ok(reply.into())));
        self
    }

    /// Reference row audited against when the description contains `marker`.
    pub fn with_reference(mut self, marker: impl Into<String>, row: MatrixRow) -> Self {
        self.references.push((marker.into(), row));
        self
    }

    /// Queue one audit reply.
    pub fn push_audit(&self, verdicts: Vec<ValidationVerdict>) {
        self.audits.lock().unwrap().push_back(Ok(verdicts));
    }

    /// Queue one failed audit call.
    pub fn push_audit_failure(&self, error: ServiceError) {
        self.audits.lock().unwrap().push_back(Err(error));
    }

    /// Queue `count` consecutive failed audit calls.
    pub fn fail_audits(&self, count: usize) {
        let mut audits = self.audits.lock().unwrap();
        for _ in 0..count {
            audits.push_back(Err(ServiceError::Unavailable("scripted outage".to_string())));
        }
    }

    pub fn audit_calls(&self) -> usize {
        self.audit_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Formatted rows in the order they were audited.
    pub fn audited_rows(&self) -> Vec<String> {
        self.audited_rows.lock().unwrap().clone()
    }

    fn reference_verdicts(
        &self,
        description: &str,
        schema: &CharacterSchema,
        formatted_row: &str,
    ) -> Option<Vec<ValidationVerdict>> {
        let (_, reference) = self
            .references
            .iter()
            .find(|(marker, _)| description.contains(marker.as_str()))?;

        let cells: Vec<Option<StateToken>> = cells()
            .find_iter(formatted_row)
            .map(|m| m.as_str().parse().ok())
            .collect();

        let verdicts = schema
            .iter()
            .zip(reference.tokens())
            .enumerate()
            .map(|(i, (character, truth))| {
                let id = character.id.get();
                match cells.get(i) {
                    Some(Some(cell)) if cell == truth => ValidationVerdict::correct(id),
                    _ => ValidationVerdict::error(id, format!("state {truth}")),
                }
            })
            .collect();
        Some(verdicts)
    }
}

#[async_trait]
impl MatrixCollaborator for ScriptedCollaborator {
    async fn propose_schema(&self, _corpus: &str) -> ServiceResult<CharacterSchema> {
        self.schema
            .clone()
            .ok_or_else(|| ServiceError::Unavailable("no scripted schema".to_string()))
    }

    async fn extract_state(
        &self,
        description: &str,
        character: &CharacterDefinition,
    ) -> ServiceResult<String> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let id = character.id.get();

        let specific = self
            .species_extractions
            .iter()
            .find(|(marker, cid, _)| *cid == id && description.contains(marker.as_str()))
            .map(|(_, _, reply)| reply);

        specific
            .or_else(|| self.extractions.get(&id))
            .cloned()
            .unwrap_or_else(|| {
                Err(ServiceError::Unavailable(format!(
                    "no scripted extraction for character {id}"
                )))
            })
    }

    async fn audit_matrix(
        &self,
        description: &str,
        schema: &CharacterSchema,
        formatted_row: &str,
    ) -> ServiceResult<Vec<ValidationVerdict>> {
        self.audit_calls.fetch_add(1, Ordering::SeqCst);
        self.audited_rows
            .lock()
            .unwrap()
            .push(formatted_row.to_string());

        if let Some(reply) = self.audits.lock().unwrap().pop_front() {
            return reply;
        }
        if let Some(verdicts) = self.reference_verdicts(description, schema, formatted_row) {
            return Ok(verdicts);
        }
        Ok(schema
            .iter()
            .map(|c| ValidationVerdict::correct(c.id.get()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> CharacterSchema {
        CharacterSchema::new(vec![
            CharacterDefinition::new(1, "a", [(1, "x".into()), (2, "y".into())]),
            CharacterDefinition::new(2, "b", [(1, "x".into()), (2, "y".into())]),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_queue_then_default_all_correct() {
        let fake = ScriptedCollaborator::new();
        fake.push_audit(vec![ValidationVerdict::error(2, "1")]);

        let first = fake.audit_matrix("d", &schema(), "1 2").await.unwrap();
        let second = fake.audit_matrix("d", &schema(), "1 1").await.unwrap();

        assert!(first[0].is_error());
        assert!(second.iter().all(|v| !v.is_error()));
        assert_eq!(fake.audit_calls(), 2);
        assert_eq!(fake.audited_rows(), vec!["1 2", "1 1"]);
    }

    #[tokio::test]
    async fn test_reference_row_flags_differences() {
        let reference = MatrixRow::new(vec![StateToken::Single(2), StateToken::Single(1)]);
        let fake = ScriptedCollaborator::new().with_reference("Aus", reference);

        let verdicts = fake.audit_matrix("1 Aus bus", &schema(), "2 ?").await.unwrap();

        assert!(!verdicts[0].is_error());
        assert_eq!(verdicts[1].expected_state.as_deref(), Some("state 1"));
    }

    #[tokio::test]
    async fn test_species_extraction_overrides_default() {
        let fake = ScriptedCollaborator::new()
            .with_extraction(1, "state 1")
            .with_species_extraction("Aus cus", 1, "state 2");
        let character = CharacterDefinition::new(1, "a", [(1, "x".into()), (2, "y".into())]);

        assert_eq!(fake.extract_state("Aus bus", &character).await.unwrap(), "state 1");
        assert_eq!(fake.extract_state("Aus cus", &character).await.unwrap(), "state 2");
        assert_eq!(fake.extract_calls(), 2);
    }
}
