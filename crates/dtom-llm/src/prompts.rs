//! Prompt text for the three collaborator requests.
//!
//! Each request is one system message (the task and reply format) and one
//! user message (the data). Reply formats are the ones `reply` decodes.

use dtom_core::{CharacterDefinition, CharacterSchema};

pub const SCHEMA_SYSTEM: &str = "\
You are a taxonomist building a morphological character list for phylogenetic analysis.
Read the species descriptions and propose discrete characters that vary between the species.
Number characters from 1. Number the states of each character from 1, using at most 9 states.
Reply with JSON only, in this shape:
{\"1\": {\"description\": \"<character>\", \"states\": {\"1\": \"<state>\", \"2\": \"<state>\"}}}";

pub const EXTRACTION_SYSTEM: &str = "\
You are a taxonomist scoring one character for one species from its description.
Use only the states listed for the character.
Reply with exactly one line:
character<ID>: state<X> (<state description>)
If several states apply, join them:
character<ID>: state<X> (<state description>) and state<Y> (<state description>)
If the description does not mention the character, reply:
character<ID>: Missing (?)";

pub const AUDIT_SYSTEM: &str = "\
You are a taxonomist checking a scored character matrix row against the species description.
Check every character in order. Mark a cell Correct when it matches the description,
Error when it disagrees, Missing when the description is silent, and Not Applicable when the
character cannot apply to the species. For Error, give the state number from the description
as the expected state.
Reply in this format, one block per character:
Species: <name>
- Character <ID>: <character description>
  Matrix State: <state in the row>
  Expected State: <state number from the description>
  Result: <Correct|Error|Missing|Not Applicable>";

pub fn schema_prompt(corpus: &str) -> String {
    format!("Species descriptions:\n{corpus}")
}

fn state_list(character: &CharacterDefinition) -> String {
    character
        .states
        .iter()
        .map(|(id, text)| format!("  state{id}: {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn extraction_prompt(description: &str, character: &CharacterDefinition) -> String {
    format!(
        "Character {id}: {desc}\nPossible states:\n{states}\n\nSpecies description:\n{description}",
        id = character.id,
        desc = character.description,
        states = state_list(character),
    )
}

pub fn audit_prompt(description: &str, schema: &CharacterSchema, formatted_row: &str) -> String {
    let characters = schema
        .iter()
        .map(|c| format!("Character {}: {}\n{}", c.id, c.description, state_list(c)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Species description:\n{description}\n\nCharacter list:\n{characters}\n\n\
Matrix row (one cell per character, in order; `?` gap, `-` missing, `(1 2)` multistate):\n{formatted_row}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_lists_states() {
        let character =
            CharacterDefinition::new(4, "Antennae", [(1, "short".into()), (2, "long".into())]);
        let prompt = extraction_prompt("Antennae long.", &character);
        assert!(prompt.starts_with("Character 4: Antennae\n"));
        assert!(prompt.contains("  state1: short\n  state2: long"));
        assert!(prompt.ends_with("Antennae long."));
    }
}
