//! Character schema: the fixed, ordered column set of a run.
//!
//! A schema is built once (normally from a collaborator proposal), checked,
//! and then shared read-only by every species. The JSON shape matches the
//! proposal format:
//!
//! ```json
//! { "1": { "description": "Antennae", "states": { "1": "short", "2": "long" } } }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::domain::error::SchemaError;
use crate::domain::token::{StateId, MAX_STATE_ID};

/// 1-based character id; also the column position in every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(u32);

impl CharacterId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Zero-based column index, `None` for the invalid id 0.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One discrete morphological character and its admissible states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterDefinition {
    pub id: CharacterId,
    pub description: String,
    /// State id → state description, ascending by id.
    pub states: BTreeMap<StateId, String>,
}

impl CharacterDefinition {
    pub fn new(
        id: u32,
        description: impl Into<String>,
        states: impl IntoIterator<Item = (StateId, String)>,
    ) -> Self {
        Self {
            id: CharacterId::new(id),
            description: description.into(),
            states: states.into_iter().collect(),
        }
    }

    pub fn state_description(&self, state: StateId) -> Option<&str> {
        self.states.get(&state).map(String::as_str)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawCharacter {
    description: String,
    states: Entries<String>,
}

/// JSON object kept as a list of pairs in document order; repeated keys survive.
#[derive(Debug)]
struct Entries<V>(Vec<(String, V)>);

impl<V: Serialize> Serialize for Entries<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(std::marker::PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, V>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(std::marker::PhantomData))
    }
}

/// Ordered, validated character list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSchema {
    characters: Vec<CharacterDefinition>,
}

impl CharacterSchema {
    /// Validate and normalize a list of characters.
    ///
    /// Duplicate ids are rejected. Unique ids that do not form `1..N` are
    /// renumbered in ascending order.
    pub fn new(mut characters: Vec<CharacterDefinition>) -> Result<Self, SchemaError> {
        if characters.is_empty() {
            return Err(SchemaError::Empty);
        }

        characters.sort_by_key(|c| c.id);

        let mut seen = HashSet::new();
        for character in &characters {
            if !seen.insert(character.id) {
                return Err(SchemaError::DuplicateCharacter(character.id.get()));
            }
            if character.states.len() < 2 {
                return Err(SchemaError::TooFewStates {
                    character: character.id.get(),
                    count: character.states.len(),
                });
            }
            if let Some(bad) = character.states.keys().find(|s| **s > MAX_STATE_ID) {
                return Err(SchemaError::InvalidStateId {
                    character: character.id.get(),
                    state: bad.to_string(),
                });
            }
        }

        for (position, character) in characters.iter_mut().enumerate() {
            let expected = CharacterId::new(position as u32 + 1);
            if character.id != expected {
                warn!(
                    from = character.id.get(),
                    to = expected.get(),
                    "renumbering character to keep ids contiguous"
                );
                character.id = expected;
            }
        }

        Ok(Self { characters })
    }

    /// Decode the proposal JSON shape, tolerating surrounding Markdown fences.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let cleaned = strip_code_fences(text);
        let Entries(raw): Entries<RawCharacter> =
            serde_json::from_str(&cleaned).map_err(|e| SchemaError::Decode(e.to_string()))?;

        let mut characters = Vec::with_capacity(raw.len());
        for (key, entry) in raw {
            let id: u32 = key
                .trim()
                .parse()
                .map_err(|_| SchemaError::InvalidCharacterId(key.clone()))?;

            let mut states = BTreeMap::new();
            for (state_key, description) in entry.states.0 {
                let state = parse_state_id(&state_key).ok_or_else(|| {
                    SchemaError::InvalidStateId {
                        character: id,
                        state: state_key.clone(),
                    }
                })?;
                if states.insert(state, description).is_some() {
                    return Err(SchemaError::DuplicateState { character: id, state });
                }
            }

            characters.push(CharacterDefinition {
                id: CharacterId::new(id),
                description: entry.description,
                states,
            });
        }

        Self::new(characters)
    }

    /// Encode back into the proposal JSON shape.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        let raw: BTreeMap<u32, RawCharacter> = self
            .characters
            .iter()
            .map(|c| {
                (
                    c.id.get(),
                    RawCharacter {
                        description: c.description.clone(),
                        states: Entries(
                            c.states
                                .iter()
                                .map(|(id, d)| (id.to_string(), d.clone()))
                                .collect(),
                        ),
                    },
                )
            })
            .collect();
        serde_json::to_string_pretty(&raw)
    }

    /// Number of characters, i.e. the length of every row.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Characters in column order.
    pub fn iter(&self) -> impl Iterator<Item = &CharacterDefinition> {
        self.characters.iter()
    }

    pub fn characters(&self) -> &[CharacterDefinition] {
        &self.characters
    }

    pub fn get(&self, id: CharacterId) -> Option<&CharacterDefinition> {
        id.index().and_then(|i| self.characters.get(i))
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.get(id).is_some()
    }

    /// Distinct state digits used anywhere in the schema, ascending.
    pub fn symbols(&self) -> String {
        let used: BTreeSet<StateId> = self
            .characters
            .iter()
            .flat_map(|c| c.states.keys().copied())
            .collect();
        used.iter().map(|s| s.to_string()).collect()
    }

    /// SHA-256 hex digest of the canonical JSON encoding.
    pub fn digest(&self) -> String {
        let json = self.to_json_string().unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn parse_state_id(text: &str) -> Option<StateId> {
    match text.trim().as_bytes() {
        [b] if b.is_ascii_digit() => Some(b - b'0'),
        _ => None,
    }
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?").expect("static pattern"))
}

/// Remove Markdown code fences (```` ``` ```` / ```` ```json ````) and trim.
pub fn strip_code_fences(text: &str) -> String {
    code_fence().replace_all(text, "").trim().to_string()
}
