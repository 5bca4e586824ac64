//! Free-text answer checking: amounts compare by value, terms tolerate typos

use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_damerau_levenshtein};

/// Default similarity needed for a free-text answer to count as correct
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// Below this a misspelt term gets no spelling hint
const NEAR_MISS: f64 = 0.6;

/// Result of comparing a typed answer with the expected one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub is_correct: bool,
    pub similarity_score: f64,
    pub feedback: String,
}

impl MatchResult {
    fn right(similarity_score: f64, feedback: String) -> Self {
        MatchResult { is_correct: true, similarity_score, feedback }
    }

    fn wrong(similarity_score: f64, feedback: String) -> Self {
        MatchResult { is_correct: false, similarity_score, feedback }
    }
}

/// How an expected answer is compared
#[derive(Debug, Clone, Copy, PartialEq)]
enum AnswerKind {
    /// "$1,200", "7%", "0.5": equal value required, spelling does not matter
    Amount(f64),
    /// A word or phrase such as "compound interest"
    Term,
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', '!', '?'])
        .to_lowercase()
}

/// Numeric value of a money or rate answer, ignoring currency signs,
/// thousands separators and a trailing percent sign
fn amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches(['.', '%'])
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | ' '))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    cleaned.parse().ok()
}

fn kind_of(expected: &str) -> AnswerKind {
    amount(expected).map_or(AnswerKind::Term, AnswerKind::Amount)
}

/// Check a typed answer against the expected text.
///
/// Amounts must match in value ("$1,000" equals "1000"). Terms ignore case,
/// spacing and trailing punctuation, and close spellings ("amortisation"
/// for "amortization") pass once the similarity reaches `threshold`.
pub fn check_match(user_input: &str, expected: &str, threshold: f64) -> MatchResult {
    let input = normalize(user_input);
    if input.is_empty() {
        return MatchResult::wrong(0.0, format!("No answer given. The answer is '{}'", expected));
    }

    match kind_of(expected) {
        AnswerKind::Amount(target) => match amount(&input) {
            Some(given) if (given - target).abs() < 0.005 => {
                MatchResult::right(1.0, "Correct!".to_string())
            }
            Some(_) => MatchResult::wrong(0.0, format!("Wrong figure. The answer is {}", expected)),
            None => MatchResult::wrong(0.0, format!("Expected a number here: {}", expected)),
        },
        AnswerKind::Term => {
            let target = normalize(expected);
            if input == target {
                return MatchResult::right(1.0, "Correct!".to_string());
            }

            // Damerau counts a swapped pair of letters as one edit
            let similarity = (normalized_damerau_levenshtein(&input, &target) + jaro_winkler(&input, &target)) / 2.0;
            if similarity >= threshold {
                MatchResult::right(similarity, format!("Accepted, the usual spelling is '{}'", expected))
            } else if similarity >= NEAR_MISS {
                MatchResult::wrong(similarity, format!("Close. Check the spelling of '{}'", expected))
            } else {
                MatchResult::wrong(similarity, format!("Not quite. The term is '{}'", expected))
            }
        }
    }
}
