//! Run report artifact.
//!
//! `<dir>/<run_id>/report.json` holds the pretty-printed report and
//! `<dir>/<run_id>/report.digest` its SHA-256 hex digest. Reading verifies
//! the digest before decoding.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::correction::CellCorrection;
use crate::domain::{CharacterSchema, DtomError, FormatError, Result, RowStatus};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::SpeciesOutcome;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// One species as it finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesReport {
    pub species: String,
    pub status: RowStatus,
    pub initial_row: String,
    pub row: String,
    pub rounds_used: u32,
    pub audit_calls: u32,
    pub service_failures: u32,
    pub corrections: Vec<CellCorrection>,
}

impl From<&SpeciesOutcome> for SpeciesReport {
    fn from(outcome: &SpeciesOutcome) -> Self {
        Self {
            species: outcome.species.clone(),
            status: outcome.log.outcome,
            initial_row: outcome.initial_row.formatted(),
            row: outcome.row.formatted(),
            rounds_used: outcome.log.rounds_used,
            audit_calls: outcome.log.audit_calls,
            service_failures: outcome.log.service_failures,
            corrections: outcome.log.corrections.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub schema_digest: String,
    pub characters: usize,
    pub species: Vec<SpeciesReport>,
    /// Rows left out of the matrix document.
    pub excluded: Vec<String>,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn new(
        schema: &CharacterSchema,
        outcomes: &[SpeciesOutcome],
        excluded: &[FormatError],
        metrics: MetricsSnapshot,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            schema_digest: schema.digest(),
            characters: schema.len(),
            species: outcomes.iter().map(SpeciesReport::from).collect(),
            excluded: excluded.iter().map(ToString::to_string).collect(),
            metrics,
        }
    }

    pub fn exhausted(&self) -> impl Iterator<Item = &SpeciesReport> {
        self.species
            .iter()
            .filter(|s| s.status == RowStatus::Exhausted)
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist the report and its digest; returns the report path.
pub fn write_run_report(report: &RunReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(report.run_id.to_string());
    std::fs::create_dir_all(&run_dir)?;

    let report_path = run_dir.join("report.json");
    let digest_path = run_dir.join("report.digest");
    let json = serde_json::to_vec_pretty(report)?;

    std::fs::write(&report_path, &json)?;
    std::fs::write(&digest_path, digest_hex(&json).as_bytes())?;

    Ok(report_path)
}

/// Read `<dir>/<run_id>/report.json`, rejecting it if the digest disagrees.
pub fn read_run_report(run_id: &str, dir: &Path) -> Result<RunReport> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join("report.json"))?;
    let recorded = std::fs::read_to_string(run_dir.join("report.digest"))?;

    let actual = digest_hex(&json);
    if recorded.trim() != actual {
        return Err(DtomError::DigestMismatch {
            expected: recorded.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}
