//! Decoding of collaborator replies.
//!
//! Only the reply shapes live here. Cell text inside a reply is still raw
//! and is classified by `dtom_core::StateTokenGrammar`.

use std::sync::OnceLock;

use dtom_core::{CharacterSchema, SchemaError, ValidationVerdict, VerdictResult};
use regex::Regex;
use tracing::debug;

fn character_heading() -> &'static Regex {
    static HEADING: OnceLock<Regex> = OnceLock::new();
    HEADING.get_or_init(|| {
        Regex::new(r"(?i)^\s*[-*]?\s*\**\s*character\s*([0-9]+)\s*\**\s*:").expect("static pattern")
    })
}

/// Parse a proposed schema, tolerating a surrounding code fence.
pub fn parse_schema_reply(text: &str) -> Result<CharacterSchema, SchemaError> {
    CharacterSchema::from_json_str(text)
}

fn result_keyword() -> &'static Regex {
    static KEYWORD: OnceLock<Regex> = OnceLock::new();
    KEYWORD.get_or_init(|| {
        Regex::new(r"(?i)^[^a-z]*(not[\s_-]*applicable|n/?a|correct|error|missing)\b")
            .expect("static pattern")
    })
}

/// Result named by the leading keyword; trailing words such as
/// `(expected 3)` are ignored.
fn parse_result(text: &str) -> Option<VerdictResult> {
    let caps = result_keyword().captures(text)?;
    let key = caps[1].to_ascii_lowercase();
    match key.as_str() {
        "correct" => Some(VerdictResult::Correct),
        "error" => Some(VerdictResult::Error),
        "missing" => Some(VerdictResult::Missing),
        _ => Some(VerdictResult::NotApplicable),
    }
}

/// Value after `key:` on a report line, if the line carries that key.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case(key)
        .then(|| value.trim())
}

#[derive(Default)]
struct Block {
    id: Option<u32>,
    expected: Option<String>,
    result: Option<VerdictResult>,
}

impl Block {
    fn finish(self, out: &mut Vec<ValidationVerdict>) {
        let Some(id) = self.id else { return };
        let Some(result) = self.result else {
            debug!(character = id, "audit block without a usable result");
            return;
        };
        let mut verdict = ValidationVerdict::with_result(id, result);
        if result == VerdictResult::Error {
            verdict.expected_state = self.expected.filter(|e| !e.is_empty());
        }
        out.push(verdict);
    }
}

/// Decode a text audit report into verdicts, in report order.
///
/// Blocks start at `- Character N:` lines. `Expected State:` and `Result:`
/// lines fill the current block; a block whose result is unrecognized is
/// skipped.
pub fn parse_audit_report(text: &str) -> Vec<ValidationVerdict> {
    let mut verdicts = Vec::new();
    let mut current = Block::default();

    for raw in text.lines() {
        let line = raw.trim().trim_matches('*').trim();
        if let Some(caps) = character_heading().captures(raw) {
            std::mem::take(&mut current).finish(&mut verdicts);
            current.id = caps[1].parse().ok();
        } else if let Some(value) = field(line, "Expected State") {
            current.expected = Some(value.to_string());
        } else if let Some(value) = field(line, "Result") {
            current.result = parse_result(value);
        }
    }
    current.finish(&mut verdicts);

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
Species: Aus bus
Character Validation Report:
- Character 1: Antennae length
  Matrix State: 1
  Expected State: 1
  Result: Correct
- Character 2: Pronotum surface
  Matrix State: 2
  Expected State: State from Description: 3
  Result: Error
  Suggestion: change to 3
- Character 3: Wings
  Matrix State: ?
  Expected State: N/A
  Result: Not Applicable
- Character 4: Setae
  Matrix State: 1
  Result: Unsure
";

    #[test]
    fn test_parses_blocks_in_order() {
        let verdicts = parse_audit_report(REPORT);

        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0], ValidationVerdict::correct(1));
        assert_eq!(verdicts[1], ValidationVerdict::error(2, "State from Description: 3"));
        assert_eq!(verdicts[2].result, VerdictResult::NotApplicable);
        assert_eq!(verdicts[2].expected_state, None);
    }

    #[test]
    fn test_result_spellings() {
        assert_eq!(parse_result("[Error]"), Some(VerdictResult::Error));
        assert_eq!(parse_result("N/A"), Some(VerdictResult::NotApplicable));
        assert_eq!(parse_result("NotApplicable"), Some(VerdictResult::NotApplicable));
        assert_eq!(parse_result("**Missing**"), Some(VerdictResult::Missing));
        assert_eq!(parse_result("maybe"), None);
    }

    #[test]
    fn test_result_keyword_with_trailing_words() {
        assert_eq!(parse_result("Error (expected 3)"), Some(VerdictResult::Error));
        assert_eq!(parse_result("Correct - matches"), Some(VerdictResult::Correct));
        assert_eq!(parse_result("not applicable here"), Some(VerdictResult::NotApplicable));
        assert_eq!(parse_result("Incorrect"), None);
        assert_eq!(parse_result("Errors found"), None);

        let text = "- Character 2: Wings\n  Expected State: 3\n  Result: Error (expected 3)\n";
        assert_eq!(parse_audit_report(text), vec![ValidationVerdict::error(2, "3")]);
    }

    #[test]
    fn test_markdown_headings_are_recognized() {
        let text = "**Character 5:** Eyes\nResult: Correct\n";
        assert_eq!(parse_audit_report(text), vec![ValidationVerdict::correct(5)]);
    }

    #[test]
    fn test_fenced_schema_reply() {
        let text = "```json\n{\"1\": {\"description\": \"Eyes\", \"states\": {\"1\": \"small\", \"2\": \"large\"}}}\n```";
        assert_eq!(parse_schema_reply(text).unwrap().len(), 1);
    }
}
