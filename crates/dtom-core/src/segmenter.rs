//! Corpus segmentation: one combined text → (species name, description) pairs.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::domain::{DtomError, Result};

/// A numbered binomial heading line, e.g. `3 Aus bus`.
pub const DEFAULT_HEADING_PATTERN: &str = r"^\d+ [A-Z][a-z]+ [A-Za-z][a-z]+";

/// Input for one species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesDescription {
    pub name: String,
    /// Heading line plus body text.
    pub description: String,
}

impl SpeciesDescription {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Splits a corpus at heading lines (the pattern is matched per line).
#[derive(Debug, Clone)]
pub struct Segmenter {
    heading: Regex,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(DEFAULT_HEADING_PATTERN).expect("default heading pattern compiles")
    }
}

impl Segmenter {
    pub fn new(pattern: &str) -> Result<Self> {
        let heading = RegexBuilder::new(pattern)
            .multi_line(true)
            .build()
            .map_err(|e| DtomError::Config(format!("invalid heading pattern: {e}")))?;
        Ok(Self { heading })
    }

    /// Text before the first heading is ignored.
    pub fn segment(&self, corpus: &str) -> Vec<SpeciesDescription> {
        let headings: Vec<_> = self.heading.find_iter(corpus).collect();

        headings
            .iter()
            .enumerate()
            .map(|(i, heading)| {
                let body_end = headings.get(i + 1).map_or(corpus.len(), |next| next.start());
                let title = heading.as_str().trim();
                let body = corpus[heading.end()..body_end].trim();
                let name = title
                    .trim_start_matches(|c: char| c.is_ascii_digit())
                    .trim()
                    .to_string();
                SpeciesDescription {
                    name,
                    description: format!("{title}\n{body}"),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "Key to the genus\n\
1 Aus bus Smith, 1901\n\
Body black. Antennae short.\n\
2 Aus cus\n\
Body pale; antennae long.\n";

    #[test]
    fn test_segments_numbered_headings() {
        let species = Segmenter::default().segment(CORPUS);

        assert_eq!(species.len(), 2);
        assert_eq!(species[0].name, "Aus bus");
        assert_eq!(
            species[0].description,
            "1 Aus bus\nSmith, 1901\nBody black. Antennae short."
        );
        assert_eq!(species[1].name, "Aus cus");
        assert!(species[1].description.ends_with("antennae long."));
    }

    #[test]
    fn test_no_headings_yields_nothing() {
        assert!(Segmenter::default().segment("just prose").is_empty());
    }

    #[test]
    fn test_custom_pattern_and_invalid_pattern() {
        let seg = Segmenter::new(r"^Species \d+").unwrap();
        let species = seg.segment("Species 1\nred\nSpecies 2\nblue");
        assert_eq!(species.len(), 2);
        assert_eq!(species[1].name, "Species 2");

        assert!(matches!(Segmenter::new("("), Err(DtomError::Config(_))));
    }
}
