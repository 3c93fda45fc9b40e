//! Audit/repair convergence loop.
//!
//! States: `RoundValidate` → (`Correct` → `RoundValidate`)* → `ConfirmStable`
//! → `Converged`, or `Exhausted` once the round budget is spent. Each
//! `RoundValidate` entry consumes one round; confirmation passes do not.
//! The worst case is `max_rounds × (1 + confirmation_passes)` audit calls.
//!
//! Audit rounds are strictly sequential: each round audits the row the
//! previous round corrected.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborator::MatrixCollaborator;
use crate::domain::{
    CharacterId, CharacterSchema, MatrixRow, RowStatus, StateToken, ValidationVerdict,
};
use crate::grammar::StateTokenGrammar;
use crate::metrics::PipelineMetrics;
use crate::obs;
use crate::validator::ConsistencyValidator;

/// How a failed audit call is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditFailurePolicy {
    /// A failed pass counts as clean. Sustained failure converges falsely.
    FailOpen,
    /// A failed pass is inconclusive and never counts toward convergence.
    #[default]
    FailClosed,
}

/// Bounded correction policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPolicy {
    pub max_rounds: u32,
    pub confirmation_passes: u32,
    pub failure_policy: AuditFailurePolicy,
}

impl Default for CorrectionPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            confirmation_passes: 2,
            failure_policy: AuditFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    RoundValidate,
    Correct,
    ConfirmStable,
    Converged,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassPhase {
    Round,
    Confirm,
}

impl PassPhase {
    fn as_str(self) -> &'static str {
        match self {
            PassPhase::Round => "round",
            PassPhase::Confirm => "confirm",
        }
    }
}

/// One audit call in the loop timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub round: u32,
    pub phase: PassPhase,
    /// Characters flagged `Error`.
    pub errors: Vec<CharacterId>,
    /// The collaborator call failed.
    pub service_failure: bool,
}

/// One cell overwritten by the loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCorrection {
    pub round: u32,
    pub character_id: CharacterId,
    pub expected_state: String,
    pub from: StateToken,
    pub to: StateToken,
}

/// Full loop log for artifacts/audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionLog {
    pub species: String,
    pub policy: CorrectionPolicy,
    pub passes: Vec<PassRecord>,
    pub corrections: Vec<CellCorrection>,
    pub outcome: RowStatus,
    pub rounds_used: u32,
    pub audit_calls: u32,
    pub service_failures: u32,
}

/// Finalized row plus the log of how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionResult {
    pub row: MatrixRow,
    pub log: CorrectionLog,
}

enum Pass {
    Clean,
    Errors(Vec<ValidationVerdict>),
    Inconclusive,
}

fn alternative_separator() -> &'static Regex {
    static OR: OnceLock<Regex> = OnceLock::new();
    OR.get_or_init(|| Regex::new(r"(?i)\s+or\s+").expect("static pattern"))
}

fn numeric_run() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("static pattern"))
}

/// Token for an `Error` verdict's expected state.
///
/// Only the first ` or ` alternative is used. Its first numeric substring is
/// parsed when present, otherwise the alternative text verbatim.
pub fn token_from_expected(grammar: &StateTokenGrammar, expected: &str) -> StateToken {
    let first = alternative_separator()
        .split(expected)
        .next()
        .unwrap_or(expected);
    let candidate = numeric_run()
        .find(first)
        .map_or(first.trim(), |m| m.as_str());
    grammar.parse(candidate)
}

pub struct CorrectionLoop<'a> {
    validator: ConsistencyValidator<'a>,
    grammar: StateTokenGrammar,
    policy: CorrectionPolicy,
    metrics: Option<&'a PipelineMetrics>,
}

impl<'a> CorrectionLoop<'a> {
    pub fn new(collaborator: &'a dyn MatrixCollaborator, policy: CorrectionPolicy) -> Self {
        Self {
            validator: ConsistencyValidator::new(collaborator),
            grammar: StateTokenGrammar::new(),
            policy,
            metrics: None,
        }
    }

    pub fn with_grammar(mut self, grammar: StateTokenGrammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_metrics(mut self, metrics: &'a PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Drive `row` to a terminal state. Always returns a row of the input length.
    pub async fn run(
        &self,
        species: &str,
        description: &str,
        schema: &CharacterSchema,
        mut row: MatrixRow,
    ) -> CorrectionResult {
        let mut log = CorrectionLog {
            species: species.to_string(),
            policy: self.policy.clone(),
            passes: Vec::new(),
            corrections: Vec::new(),
            outcome: RowStatus::Exhausted,
            rounds_used: 0,
            audit_calls: 0,
            service_failures: 0,
        };

        let mut state = LoopState::RoundValidate;
        let mut pending: Vec<ValidationVerdict> = Vec::new();

        let outcome = loop {
            debug!(species = %species, state = ?state, round = log.rounds_used, "correction loop");
            state = match state {
                LoopState::RoundValidate => {
                    if log.rounds_used >= self.policy.max_rounds {
                        LoopState::Exhausted
                    } else {
                        log.rounds_used += 1;
                        match self
                            .audit(description, &row, schema, PassPhase::Round, &mut log)
                            .await
                        {
                            Pass::Errors(errors) => {
                                pending = errors;
                                LoopState::Correct
                            }
                            Pass::Clean => LoopState::ConfirmStable,
                            Pass::Inconclusive => LoopState::RoundValidate,
                        }
                    }
                }
                LoopState::Correct => {
                    let errors = std::mem::take(&mut pending);
                    self.apply_corrections(schema, &mut row, errors, &mut log);
                    LoopState::RoundValidate
                }
                LoopState::ConfirmStable => {
                    let mut next = LoopState::Converged;
                    for _ in 0..self.policy.confirmation_passes {
                        match self
                            .audit(description, &row, schema, PassPhase::Confirm, &mut log)
                            .await
                        {
                            Pass::Clean => {}
                            Pass::Errors(_) | Pass::Inconclusive => {
                                next = LoopState::RoundValidate;
                                break;
                            }
                        }
                    }
                    next
                }
                LoopState::Converged => break RowStatus::Converged,
                LoopState::Exhausted => break RowStatus::Exhausted,
            };
        };

        log.outcome = outcome;
        if let Some(metrics) = self.metrics {
            metrics.add_corrections(log.corrections.len() as u64);
            match outcome {
                RowStatus::Converged => metrics.inc_converged(),
                RowStatus::Exhausted => metrics.inc_exhausted(),
            }
        }
        obs::emit_species_finished(species, outcome, log.rounds_used, log.audit_calls);

        CorrectionResult { row, log }
    }

    async fn audit(
        &self,
        description: &str,
        row: &MatrixRow,
        schema: &CharacterSchema,
        phase: PassPhase,
        log: &mut CorrectionLog,
    ) -> Pass {
        log.audit_calls += 1;
        if let Some(metrics) = self.metrics {
            metrics.inc_audit_calls();
        }

        match self.validator.validate(description, row, schema).await {
            Ok(verdicts) => {
                let errors: Vec<ValidationVerdict> =
                    verdicts.into_iter().filter(|v| v.is_error()).collect();
                obs::emit_audit_pass(
                    &log.species,
                    log.rounds_used,
                    phase.as_str(),
                    Some(errors.len()),
                );
                log.passes.push(PassRecord {
                    round: log.rounds_used,
                    phase,
                    errors: errors.iter().map(|v| v.character_id).collect(),
                    service_failure: false,
                });
                if errors.is_empty() {
                    Pass::Clean
                } else {
                    Pass::Errors(errors)
                }
            }
            Err(err) => {
                warn!(
                    species = %log.species,
                    round = log.rounds_used,
                    error = %err,
                    "audit call failed"
                );
                if let Some(metrics) = self.metrics {
                    metrics.inc_audit_failures();
                }
                obs::emit_audit_pass(&log.species, log.rounds_used, phase.as_str(), None);
                log.service_failures += 1;
                log.passes.push(PassRecord {
                    round: log.rounds_used,
                    phase,
                    errors: Vec::new(),
                    service_failure: true,
                });
                match self.policy.failure_policy {
                    AuditFailurePolicy::FailOpen => Pass::Clean,
                    AuditFailurePolicy::FailClosed => Pass::Inconclusive,
                }
            }
        }
    }

    // Verdicts come from one audit and name distinct characters, so the
    // overwrites touch disjoint cells and their order is irrelevant.
    fn apply_corrections(
        &self,
        schema: &CharacterSchema,
        row: &mut MatrixRow,
        errors: Vec<ValidationVerdict>,
        log: &mut CorrectionLog,
    ) {
        for verdict in errors {
            let id = verdict.character_id;
            let Some(expected) = verdict.expected_state else {
                warn!(
                    species = %log.species,
                    character = id.get(),
                    "error verdict without expected state; skipping"
                );
                continue;
            };

            let token = token_from_expected(&self.grammar, &expected);
            if let Some(character) = schema.get(id) {
                let unknown = token
                    .states()
                    .into_iter()
                    .find(|s| character.state_description(*s).is_none());
                if let Some(state) = unknown {
                    warn!(
                        species = %log.species,
                        character = id.get(),
                        state = state,
                        "correction names a state outside the schema"
                    );
                }
            }

            match row.set(id, token.clone()) {
                Ok(previous) if previous == token => {
                    debug!(
                        species = %log.species,
                        character = id.get(),
                        "correction leaves cell unchanged"
                    );
                }
                Ok(previous) => {
                    obs::emit_cell_corrected(&log.species, id, &previous, &token);
                    log.corrections.push(CellCorrection {
                        round: log.rounds_used,
                        character_id: id,
                        expected_state: expected,
                        from: previous,
                        to: token,
                    });
                }
                Err(err) => {
                    warn!(species = %log.species, error = %err, "cannot apply correction");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_state_uses_first_alternative() {
        let grammar = StateTokenGrammar::new();
        assert_eq!(
            token_from_expected(&grammar, "State from Description: 3"),
            StateToken::Single(3)
        );
        assert_eq!(
            token_from_expected(&grammar, "state 2 (long) or state 1 (short)"),
            StateToken::Single(2)
        );
        assert_eq!(token_from_expected(&grammar, "2 OR 1"), StateToken::Single(2));
    }

    #[test]
    fn test_expected_state_without_digits_is_carried_verbatim() {
        let grammar = StateTokenGrammar::new();
        assert_eq!(token_from_expected(&grammar, "-"), StateToken::Missing);
        assert_eq!(token_from_expected(&grammar, "not described"), StateToken::Gap);
    }

    #[test]
    fn test_expected_state_ignores_non_ascii_digits() {
        let grammar = StateTokenGrammar::new();
        for expected in [
            "State from Description: \u{ff13}",
            "\u{0663}",
            "state \u{ff12} or 1",
            "12",
        ] {
            let token = token_from_expected(&grammar, expected);
            assert_eq!(token, StateToken::Gap, "{expected:?}");
            assert!(token.is_well_formed());
        }
        assert_eq!(
            token_from_expected(&grammar, "\u{ff13} then 3"),
            StateToken::Single(3)
        );
    }

    #[test]
    fn test_default_policy_bounds() {
        let policy = CorrectionPolicy::default();
        assert_eq!(policy.max_rounds, 10);
        assert_eq!(policy.confirmation_passes, 2);
        assert_eq!(policy.failure_policy, AuditFailurePolicy::FailClosed);
    }
}
