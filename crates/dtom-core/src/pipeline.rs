//! End-to-end pipeline: schema → extraction → assembly → correction → matrix.
//!
//! [`PipelineContext`] owns everything shared by the species tasks: the
//! read-only schema, the collaborator, the configuration and the run
//! counters. Each species owns its row exclusively, so species are processed
//! concurrently without locks.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::assembler::MatrixAssembler;
use crate::collaborator::MatrixCollaborator;
use crate::correction::{CorrectionLog, CorrectionLoop, CorrectionPolicy};
use crate::domain::{CharacterSchema, DtomError, Matrix, MatrixEntry, MatrixRow, Result};
use crate::extractor::{SpeciesExtractor, DEFAULT_EXTRACTION_CONCURRENCY};
use crate::grammar::{AbsenceMapping, StateTokenGrammar};
use crate::metrics::PipelineMetrics;
use crate::obs;
use crate::segmenter::SpeciesDescription;

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Species processed at the same time.
    pub species_concurrency: usize,
    /// In-flight extraction requests per species.
    pub extraction_concurrency: usize,
    pub correction: CorrectionPolicy,
    /// Token for extraction replies that name no state.
    pub absence: AbsenceMapping,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            species_concurrency: 2,
            extraction_concurrency: DEFAULT_EXTRACTION_CONCURRENCY,
            correction: CorrectionPolicy::default(),
            absence: AbsenceMapping::default(),
        }
    }
}

/// Everything that happened to one species.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeciesOutcome {
    pub species: String,
    /// Row as assembled, before any correction.
    pub initial_row: MatrixRow,
    pub row: MatrixRow,
    pub log: CorrectionLog,
}

impl SpeciesOutcome {
    pub fn entry(&self) -> MatrixEntry {
        MatrixEntry {
            species: self.species.clone(),
            row: self.row.clone(),
            status: self.log.outcome,
        }
    }
}

/// Ask the collaborator for the run's schema. Any failure is fatal.
pub async fn build_schema(
    collaborator: &dyn MatrixCollaborator,
    corpus: &str,
) -> Result<CharacterSchema> {
    let schema = collaborator.propose_schema(corpus).await?;
    info!(characters = schema.len(), digest = %schema.digest(), "schema ready");
    Ok(schema)
}

pub struct PipelineContext {
    schema: Arc<CharacterSchema>,
    collaborator: Arc<dyn MatrixCollaborator>,
    config: PipelineConfig,
    metrics: PipelineMetrics,
}

impl PipelineContext {
    pub fn new(
        schema: CharacterSchema,
        collaborator: Arc<dyn MatrixCollaborator>,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.species_concurrency == 0 {
            return Err(DtomError::Config("species_concurrency must be at least 1".to_string()));
        }
        Ok(Self {
            schema: Arc::new(schema),
            collaborator,
            config,
            metrics: PipelineMetrics::new(),
        })
    }

    pub fn schema(&self) -> &CharacterSchema {
        &self.schema
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    fn grammar(&self) -> StateTokenGrammar {
        StateTokenGrammar::with_absence(self.config.absence)
    }

    /// Extract, assemble and correct one species' row.
    pub async fn process_species(&self, species: &SpeciesDescription) -> SpeciesOutcome {
        let schema = self.schema.as_ref();
        let collaborator = self.collaborator.as_ref();

        async move {
            obs::emit_species_started(&species.name, schema.len());

            let results = SpeciesExtractor::new(collaborator)
                .with_concurrency(self.config.extraction_concurrency)
                .with_metrics(&self.metrics)
                .extract(&species.name, &species.description, schema)
                .await;

            let initial_row = MatrixAssembler::new(schema, self.grammar()).assemble(&results);

            let corrected = CorrectionLoop::new(collaborator, self.config.correction.clone())
                .with_grammar(self.grammar())
                .with_metrics(&self.metrics)
                .run(&species.name, &species.description, schema, initial_row.clone())
                .await;

            SpeciesOutcome {
                species: species.name.clone(),
                initial_row,
                row: corrected.row,
                log: corrected.log,
            }
        }
        .instrument(obs::species_span(&species.name))
        .await
    }

    /// Process every species, returning outcomes in input order.
    pub async fn run(&self, species: &[SpeciesDescription]) -> Vec<SpeciesOutcome> {
        info!(species = species.len(), characters = self.schema.len(), "pipeline started");

        let outcomes: Vec<SpeciesOutcome> = stream::iter(species)
            .map(|s| self.process_species(s))
            .buffered(self.config.species_concurrency)
            .collect()
            .await;

        self.metrics.flush();
        outcomes
    }
}

/// Assemble finalized outcomes into a matrix, preserving order.
pub fn into_matrix(outcomes: &[SpeciesOutcome]) -> Matrix {
    outcomes.iter().map(SpeciesOutcome::entry).collect()
}
