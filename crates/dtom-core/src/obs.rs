//! Structured observability hooks for per-species processing.
//!
//! This module provides:
//! - a species-scoped span, attached to async work with `tracing::Instrument`
//! - emission functions for lifecycle events: start, audit pass, cell correction, finish

use tracing::{info, warn};

use crate::domain::{CharacterId, RowStatus, StateToken};

/// The span every species' work is recorded under.
pub fn species_span(species: &str) -> tracing::Span {
    tracing::info_span!("dtom.species", species = %species)
}

pub fn emit_species_started(species: &str, characters: usize) {
    info!(event = "species.started", species = %species, characters = characters);
}

/// Emit event: one audit pass finished.
///
/// `phase` is `"round"` or `"confirm"`; `errors` is `None` when the
/// collaborator call failed.
pub fn emit_audit_pass(species: &str, round: u32, phase: &str, errors: Option<usize>) {
    match errors {
        Some(errors) => info!(
            event = "audit.pass",
            species = %species,
            round = round,
            phase = phase,
            errors = errors,
        ),
        None => warn!(
            event = "audit.pass",
            species = %species,
            round = round,
            phase = phase,
            inconclusive = true,
        ),
    }
}

pub fn emit_cell_corrected(
    species: &str,
    character: CharacterId,
    from: &StateToken,
    to: &StateToken,
) {
    info!(
        event = "cell.corrected",
        species = %species,
        character = character.get(),
        from = %from,
        to = %to,
    );
}

pub fn emit_species_finished(species: &str, status: RowStatus, rounds: u32, audit_calls: u32) {
    match status {
        RowStatus::Converged => info!(
            event = "species.finished",
            species = %species,
            status = "converged",
            rounds = rounds,
            audit_calls = audit_calls,
        ),
        RowStatus::Exhausted => warn!(
            event = "species.finished",
            species = %species,
            status = "exhausted",
            rounds = rounds,
            audit_calls = audit_calls,
        ),
    }
}
