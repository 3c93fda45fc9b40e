//! Per-species state extraction.
//!
//! One collaborator request per character. Requests are independent and
//! fan out concurrently; results are keyed by character id, so completion
//! order does not matter. A failed request records the missing sentinel for
//! its slot and never aborts the remaining characters.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::collaborator::MatrixCollaborator;
use crate::domain::{CharacterId, CharacterSchema};
use crate::metrics::PipelineMetrics;

/// Raw text recorded for a character whose extraction failed.
pub const MISSING_SENTINEL: &str = "-";

/// Default number of in-flight extraction requests per species.
pub const DEFAULT_EXTRACTION_CONCURRENCY: usize = 4;

/// Raw collaborator assertions, keyed by character id.
pub type ExtractionResults = BTreeMap<CharacterId, String>;

pub struct SpeciesExtractor<'a> {
    collaborator: &'a dyn MatrixCollaborator,
    concurrency: usize,
    metrics: Option<&'a PipelineMetrics>,
}

impl<'a> SpeciesExtractor<'a> {
    pub fn new(collaborator: &'a dyn MatrixCollaborator) -> Self {
        Self {
            collaborator,
            concurrency: DEFAULT_EXTRACTION_CONCURRENCY,
            metrics: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: &'a PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Extract one raw assertion per schema character.
    ///
    /// The result always holds an entry for every character.
    pub async fn extract(
        &self,
        species: &str,
        description: &str,
        schema: &CharacterSchema,
    ) -> ExtractionResults {
        let results: ExtractionResults = stream::iter(schema.iter())
            .map(|character| async move {
                if let Some(metrics) = self.metrics {
                    metrics.inc_extraction_calls();
                }
                match self.collaborator.extract_state(description, character).await {
                    Ok(text) => {
                        debug!(
                            species = %species,
                            character = character.id.get(),
                            reply = %text,
                            "state extracted"
                        );
                        (character.id, text)
                    }
                    Err(err) => {
                        if let Some(metrics) = self.metrics {
                            metrics.inc_extraction_failures();
                        }
                        warn!(
                            species = %species,
                            character = character.id.get(),
                            error = %err,
                            "extraction failed; recording missing"
                        );
                        (character.id, MISSING_SENTINEL.to_string())
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results
    }
}
