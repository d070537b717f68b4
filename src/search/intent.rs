//! Rule-based query intent classification (§4.4).
//!
//! First match wins, checked in the declared order: Definition, Procedure,
//! Summary, Example, then General as the fallback.

use serde::{Deserialize, Serialize};

/// A query's inferred intent, used to tune fusion weights, chunk-type
/// boosts, stability bias, and MMR lambda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    General,
    Definition,
    Procedure,
    Summary,
    Example,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Intent::General => "general",
            Intent::Definition => "definition",
            Intent::Procedure => "procedure",
            Intent::Summary => "summary",
            Intent::Example => "example",
        };
        write!(f, "{s}")
    }
}

const DEFINITION_MARKERS: &[&str] = &[
    "what is",
    "define",
    "definition of",
    "meaning of",
    "theorem",
    "lemma",
];

const PROCEDURE_MARKERS: &[&str] = &["how to", "steps to", "procedure for", "process of"];

const SUMMARY_MARKERS: &[&str] = &["summary", "overview", "explain chapter", "summarize"];

const EXAMPLE_MARKERS: &[&str] = &["example", "illustration", "case study", "walkthrough"];

/// Classify a query string into an [`Intent`]. Case-insensitive.
pub fn classify_intent(query: &str) -> Intent {
    let lower = query.to_lowercase();

    if DEFINITION_MARKERS.iter().any(|m| lower.contains(m)) {
        return Intent::Definition;
    }
    if PROCEDURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Intent::Procedure;
    }
    if SUMMARY_MARKERS.iter().any(|m| lower.contains(m)) {
        return Intent::Summary;
    }
    if EXAMPLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Intent::Example;
    }
    Intent::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_definition() {
        assert_eq!(classify_intent("What is a cache?"), Intent::Definition);
        assert_eq!(classify_intent("Define entropy"), Intent::Definition);
        assert_eq!(classify_intent("State the Pythagorean theorem"), Intent::Definition);
    }

    #[test]
    fn detects_procedure() {
        assert_eq!(classify_intent("How to configure WAL mode"), Intent::Procedure);
        assert_eq!(classify_intent("Steps to reproduce the bug"), Intent::Procedure);
    }

    #[test]
    fn detects_summary() {
        assert_eq!(classify_intent("Give me a summary of chapter 3"), Intent::Summary);
        assert_eq!(classify_intent("overview of the system"), Intent::Summary);
    }

    #[test]
    fn detects_example() {
        assert_eq!(classify_intent("Show an example of RRF"), Intent::Example);
        assert_eq!(classify_intent("walkthrough of the pipeline"), Intent::Example);
    }

    #[test]
    fn falls_back_to_general() {
        assert_eq!(classify_intent("cache eviction policy"), Intent::General);
    }

    #[test]
    fn first_match_wins_in_declared_order() {
        // Contains both a definition marker ("what is") and a summary
        // marker ("overview") — definition must win since it's checked first.
        assert_eq!(
            classify_intent("what is an overview of caching?"),
            Intent::Definition
        );
    }
}
