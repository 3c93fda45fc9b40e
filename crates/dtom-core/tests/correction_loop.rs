use dtom_core::fakes::ScriptedCollaborator;
use dtom_core::{
    AuditFailurePolicy, CharacterDefinition, CharacterSchema, CorrectionLoop, CorrectionPolicy,
    MatrixRow, RowStatus, StateToken, ValidationVerdict, VerdictResult,
};

fn schema() -> CharacterSchema {
    CharacterSchema::new(vec![
        CharacterDefinition::new(1, "Antennae", [(1, "short".into()), (2, "long".into())]),
        CharacterDefinition::new(
            2,
            "Pronotum",
            [(1, "smooth".into()), (2, "punctate".into()), (3, "rugose".into())],
        ),
        CharacterDefinition::new(3, "Wings", [(1, "absent".into()), (2, "present".into())]),
    ])
    .unwrap()
}

fn row(cells: &[StateToken]) -> MatrixRow {
    MatrixRow::new(cells.to_vec())
}

fn all_correct() -> Vec<ValidationVerdict> {
    (1..=3).map(ValidationVerdict::correct).collect()
}

#[tokio::test]
async fn all_correct_audits_converge_after_three_calls() {
    let collaborator = ScriptedCollaborator::new();
    let start = row(&[StateToken::Single(1), StateToken::Single(3), StateToken::Gap]);

    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "desc", &schema(), start.clone())
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.row, start);
    assert_eq!(result.log.audit_calls, 3);
    assert_eq!(result.log.rounds_used, 1);
    assert_eq!(collaborator.audit_calls(), 3);
}

#[tokio::test]
async fn error_verdict_is_applied_then_confirmed() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.push_audit(vec![ValidationVerdict::error(2, "State from Description: 3")]);
    let start = row(&[StateToken::Single(1), StateToken::Single(2), StateToken::Gap]);

    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "desc", &schema(), start)
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.row.formatted(), "1 3 ?");
    assert_eq!(result.log.corrections.len(), 1);
    assert_eq!(result.log.corrections[0].from, StateToken::Single(2));
    assert_eq!(result.log.corrections[0].to, StateToken::Single(3));
    // One dirty round, one clean round, two confirmations.
    assert_eq!(result.log.audit_calls, 4);
    assert_eq!(
        collaborator.audited_rows(),
        vec!["1 2 ?", "1 3 ?", "1 3 ?", "1 3 ?"]
    );
}

#[tokio::test]
async fn sustained_audit_failure_exhausts_under_fail_closed() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.fail_audits(10);
    let start = row(&[StateToken::Single(2), StateToken::Missing, StateToken::Gap]);

    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "desc", &schema(), start.clone())
        .await;

    assert_eq!(result.log.outcome, RowStatus::Exhausted);
    assert_eq!(result.row, start);
    assert_eq!(result.log.rounds_used, 10);
    assert_eq!(result.log.audit_calls, 10);
    assert_eq!(result.log.service_failures, 10);
    assert!(result.log.passes.iter().all(|p| p.service_failure));
}

#[tokio::test]
async fn sustained_audit_failure_converges_under_fail_open() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.fail_audits(10);
    let policy = CorrectionPolicy {
        failure_policy: AuditFailurePolicy::FailOpen,
        ..CorrectionPolicy::default()
    };

    let result = CorrectionLoop::new(&collaborator, policy)
        .run("Aus bus", "desc", &schema(), MatrixRow::new(vec![StateToken::Single(1); 3]))
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.log.audit_calls, 3);
}

#[tokio::test]
async fn persistent_disagreement_stops_at_round_budget() {
    let collaborator = ScriptedCollaborator::new();
    for _ in 0..20 {
        collaborator.push_audit(vec![ValidationVerdict::error(1, "2")]);
    }
    let policy = CorrectionPolicy {
        max_rounds: 4,
        ..CorrectionPolicy::default()
    };

    let result = CorrectionLoop::new(&collaborator, policy)
        .run("Aus bus", "desc", &schema(), MatrixRow::new(vec![StateToken::Single(1); 3]))
        .await;

    assert_eq!(result.log.outcome, RowStatus::Exhausted);
    assert_eq!(result.log.rounds_used, 4);
    assert_eq!(result.log.audit_calls, 4);
    assert_eq!(result.row.len(), 3);
    // Only the first round changes anything; later rounds repeat the same cell.
    assert_eq!(result.log.corrections.len(), 1);
}

#[tokio::test]
async fn failed_confirmation_returns_to_round_validation() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.push_audit(all_correct());
    collaborator.push_audit(vec![ValidationVerdict::error(1, "2")]);

    let start = MatrixRow::new(vec![StateToken::Single(1); 3]);
    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "desc", &schema(), start.clone())
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.log.rounds_used, 2);
    assert_eq!(result.log.audit_calls, 5);
    // Confirmation verdicts never edit the row.
    assert_eq!(result.row, start);
}

#[tokio::test]
async fn worst_case_audit_count_is_bounded() {
    let collaborator = ScriptedCollaborator::new();
    for _ in 0..10 {
        collaborator.push_audit(all_correct());
        collaborator.push_audit(all_correct());
        collaborator.push_audit(vec![ValidationVerdict::error(3, "1")]);
    }
    let policy = CorrectionPolicy::default();
    let bound = policy.max_rounds * (1 + policy.confirmation_passes);

    let result = CorrectionLoop::new(&collaborator, policy)
        .run("Aus bus", "desc", &schema(), MatrixRow::new(vec![StateToken::Gap; 3]))
        .await;

    assert_eq!(result.log.outcome, RowStatus::Exhausted);
    assert_eq!(result.log.audit_calls, bound);
}

#[tokio::test]
async fn error_without_expected_state_is_skipped() {
    let collaborator = ScriptedCollaborator::new();
    collaborator.push_audit(vec![ValidationVerdict::with_result(1, VerdictResult::Error)]);
    let start = row(&[StateToken::Single(2), StateToken::Single(1), StateToken::Single(1)]);

    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "desc", &schema(), start.clone())
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.row, start);
    assert!(result.log.corrections.is_empty());
}

#[tokio::test]
async fn reference_row_is_reached() {
    let truth = row(&[StateToken::Single(2), StateToken::Single(3), StateToken::Single(1)]);
    let collaborator = ScriptedCollaborator::new().with_reference("Aus bus", truth.clone());
    let start = row(&[StateToken::Single(1), StateToken::Single(3), StateToken::Missing]);

    let result = CorrectionLoop::new(&collaborator, CorrectionPolicy::default())
        .run("Aus bus", "1 Aus bus\nBody black.", &schema(), start)
        .await;

    assert_eq!(result.log.outcome, RowStatus::Converged);
    assert_eq!(result.row, truth);
    assert_eq!(result.log.corrections.len(), 2);
    assert_eq!(result.log.passes[0].errors.len(), 2);
}
