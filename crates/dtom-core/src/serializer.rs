//! NEXUS matrix document writer and matrix-block reader.
//!
//! Layout:
//!
//! ```text
//! #NEXUS
//! BEGIN DATA;
//! DIMENSIONS NTAX=2 NCHAR=3;
//! FORMAT MISSING=- GAP=? SYMBOLS="123";
//! CHARLABELS
//! [1] 'Antennae'
//! ...
//! ;
//! STATELABELS
//! 1 'short' 'long',
//! ...
//! ;
//! MATRIX
//! 'Aus bus' 1 (2 3) ?
//! ;
//! END;
//! ```

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::domain::{CharacterSchema, FormatError, Matrix, MatrixRow, StateToken};
use crate::grammar::StateTokenGrammar;

/// A rendered document plus the rows that had to be left out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedMatrix {
    pub document: String,
    pub included: usize,
    pub excluded: Vec<FormatError>,
}

/// `NTAX`/`NCHAR` as declared in a document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub ntax: usize,
    pub nchar: usize,
}

/// NEXUS single-quoted label; embedded quotes are doubled.
///
/// Labels are single-line, so every whitespace run (newlines included) is
/// folded to one space. Reading a label back yields the folded form.
fn quote(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("'{}'", flat.replace('\'', "''"))
}

/// Render `schema` and `rows` into one document.
///
/// Rows whose length differs from the schema are excluded (and reported)
/// instead of shifting columns for everyone else.
pub fn serialize<'a, I>(schema: &CharacterSchema, rows: I) -> SerializedMatrix
where
    I: IntoIterator<Item = (&'a str, &'a MatrixRow)>,
{
    let mut excluded = Vec::new();
    let mut matrix_lines = Vec::new();

    for (species, row) in rows {
        if row.len() != schema.len() {
            let err = FormatError::RowLength {
                species: species.to_string(),
                expected: schema.len(),
                actual: row.len(),
            };
            warn!(error = %err, "excluding row from matrix document");
            excluded.push(err);
            continue;
        }
        matrix_lines.push(format!("{} {}", quote(species), row.formatted()));
    }

    let mut doc = String::new();
    doc.push_str("#NEXUS\nBEGIN DATA;\n");
    doc.push_str(&format!(
        "DIMENSIONS NTAX={} NCHAR={};\n",
        matrix_lines.len(),
        schema.len()
    ));
    doc.push_str(&format!(
        "FORMAT MISSING=- GAP=? SYMBOLS=\"{}\";\n",
        schema.symbols()
    ));

    doc.push_str("CHARLABELS\n");
    for character in schema.iter() {
        doc.push_str(&format!("[{}] {}\n", character.id, quote(&character.description)));
    }
    doc.push_str(";\n");

    doc.push_str("STATELABELS\n");
    let state_lines: Vec<String> = schema
        .iter()
        .map(|c| {
            let labels: Vec<String> = c.states.values().map(|s| quote(s)).collect();
            format!("{} {}", c.id, labels.join(" "))
        })
        .collect();
    doc.push_str(&state_lines.join(",\n"));
    doc.push_str("\n;\n");

    doc.push_str("MATRIX\n");
    for line in &matrix_lines {
        doc.push_str(line);
        doc.push('\n');
    }
    doc.push_str(";\nEND;\n");

    SerializedMatrix {
        document: doc,
        included: matrix_lines.len(),
        excluded,
    }
}

/// Convenience wrapper over [`serialize`] for an assembled matrix.
pub fn serialize_matrix(schema: &CharacterSchema, matrix: &Matrix) -> SerializedMatrix {
    serialize(
        schema,
        matrix.entries().iter().map(|e| (e.species.as_str(), &e.row)),
    )
}

fn dimensions_pattern() -> &'static Regex {
    static DIMS: OnceLock<Regex> = OnceLock::new();
    DIMS.get_or_init(|| {
        Regex::new(r"(?i)DIMENSIONS\s+NTAX\s*=\s*([0-9]+)\s+NCHAR\s*=\s*([0-9]+)")
            .expect("static pattern")
    })
}

fn cell_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"\([^)]*\)|\S+").expect("static pattern"))
}

pub fn read_dimensions(document: &str) -> Result<Dimensions, FormatError> {
    let caps = dimensions_pattern()
        .captures(document)
        .ok_or_else(|| FormatError::Malformed("missing DIMENSIONS".to_string()))?;
    let number = |i: usize| -> Result<usize, FormatError> {
        caps[i]
            .parse()
            .map_err(|_| FormatError::Malformed(format!("bad dimension {:?}", &caps[i])))
    };
    Ok(Dimensions {
        ntax: number(1)?,
        nchar: number(2)?,
    })
}

/// Split a leading quoted name off a matrix line.
fn split_quoted_name(line: &str) -> Option<(String, &str)> {
    let rest = line.strip_prefix('\'')?;
    let mut name = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                name.push('\'');
                chars.next();
            } else {
                return Some((name, &rest[i + 1..]));
            }
        } else {
            name.push(c);
        }
    }
    None
}

/// Read the `MATRIX` block back into names and token sequences.
///
/// Names come back as written, i.e. with whitespace already folded.
pub fn parse_matrix_block(
    document: &str,
    grammar: &StateTokenGrammar,
) -> Result<Vec<(String, Vec<StateToken>)>, FormatError> {
    let mut lines = document.lines().map(str::trim);
    if !lines.any(|l| l.eq_ignore_ascii_case("MATRIX")) {
        return Err(FormatError::Malformed("missing MATRIX block".to_string()));
    }

    let mut rows = Vec::new();
    for line in lines {
        if line == ";" {
            return Ok(rows);
        }
        if line.is_empty() {
            continue;
        }
        let (name, cells) = split_quoted_name(line)
            .ok_or_else(|| FormatError::Malformed(format!("unquoted taxon in {line:?}")))?;
        let tokens = cell_pattern()
            .find_iter(cells)
            .map(|m| grammar.parse(m.as_str()))
            .collect();
        rows.push((name, tokens));
    }

    Err(FormatError::Malformed("unterminated MATRIX block".to_string()))
}
