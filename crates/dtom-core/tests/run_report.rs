use std::sync::Arc;

use dtom_core::fakes::ScriptedCollaborator;
use dtom_core::{
    into_matrix, read_run_report, serialize_matrix, write_run_report, CharacterDefinition,
    CharacterSchema, DtomError, MatrixCollaborator, PipelineConfig, PipelineContext, RowStatus,
    RunReport, SpeciesDescription, ValidationVerdict,
};
use tempfile::tempdir;

fn schema() -> CharacterSchema {
    CharacterSchema::new(vec![
        CharacterDefinition::new(1, "Antennae", [(1, "short".into()), (2, "long".into())]),
        CharacterDefinition::new(2, "Wings", [(1, "absent".into()), (2, "present".into())]),
    ])
    .unwrap()
}

async fn report() -> RunReport {
    let fake = ScriptedCollaborator::new()
        .with_extraction(1, "state 1")
        .with_extraction(2, "state 1");
    fake.push_audit(vec![ValidationVerdict::error(2, "2")]);
    let collaborator: Arc<dyn MatrixCollaborator> = Arc::new(fake);

    let config = PipelineConfig {
        species_concurrency: 1,
        ..PipelineConfig::default()
    };
    let ctx = PipelineContext::new(schema(), collaborator, config).unwrap();
    let outcomes = ctx
        .run(&[SpeciesDescription::new("Aus bus", "1 Aus bus\nWings present.")])
        .await;
    let doc = serialize_matrix(ctx.schema(), &into_matrix(&outcomes));

    RunReport::new(ctx.schema(), &outcomes, &doc.excluded, ctx.metrics().snapshot())
}

#[tokio::test]
async fn report_records_corrections_and_status() {
    let report = report().await;

    assert_eq!(report.characters, 2);
    assert_eq!(report.schema_digest, schema().digest());
    let species = &report.species[0];
    assert_eq!(species.status, RowStatus::Converged);
    assert_eq!(species.initial_row, "1 1");
    assert_eq!(species.row, "1 2");
    assert_eq!(species.corrections.len(), 1);
    assert_eq!(report.metrics.corrections_applied, 1);
    assert_eq!(report.exhausted().count(), 0);
}

#[tokio::test]
async fn report_round_trips_through_disk() {
    let report = report().await;
    let dir = tempdir().unwrap();

    let path = write_run_report(&report, dir.path()).unwrap();
    assert!(path.ends_with("report.json"));

    let back = read_run_report(&report.run_id.to_string(), dir.path()).unwrap();
    assert_eq!(back, report);
}

#[tokio::test]
async fn tampered_report_is_rejected() {
    let report = report().await;
    let dir = tempdir().unwrap();
    let path = write_run_report(&report, dir.path()).unwrap();

    let tampered = std::fs::read_to_string(&path)
        .unwrap()
        .replace("\"1 2\"", "\"2 2\"");
    std::fs::write(&path, tampered).unwrap();

    let err = read_run_report(&report.run_id.to_string(), dir.path()).unwrap_err();
    assert!(matches!(err, DtomError::DigestMismatch { .. }));
}

#[test]
fn missing_report_is_io_error() {
    let dir = tempdir().unwrap();
    let err = read_run_report("no-such-run", dir.path()).unwrap_err();
    assert!(matches!(err, DtomError::Io(_)));
}
