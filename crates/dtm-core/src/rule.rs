use serde::{Deserialize, Serialize};

use crate::error::{DtmError, DtmResult};

/// Minimum number of listed keywords a free-text answer must mention.
pub const MIN_KEYWORD_MATCHES: usize = 1;

/// A free-text answer must be strictly longer than this (after trimming).
pub const MIN_ANSWER_CHARS: usize = 10;

/// How a subproblem decides whether an answer is right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerRule {
    /// Multiple choice; the answer must equal `answer` exactly.
    ExactChoice { choices: Vec<String>, answer: String },
    /// Whitespace is stripped, then the answer must be one of `accepted`.
    AcceptedForms { accepted: Vec<String> },
    /// Loose free-text check: mention a keyword and write more than a few words.
    KeywordThreshold { keywords: Vec<String> },
    /// Whole-number answer compared for equality.
    Integer { expected: i64 },
}

impl AnswerRule {
    /// `Ok(false)` is an ordinary wrong answer; `Err(InvalidInput)` means the
    /// text could not be read as an answer at all.
    pub fn check(&self, answer: &str) -> DtmResult<bool> {
        match self {
            Self::ExactChoice { answer: key, .. } => Ok(answer == key),
            Self::AcceptedForms { accepted } => {
                let compact: String = answer.chars().filter(|c| !c.is_whitespace()).collect();
                Ok(accepted.iter().any(|a| *a == compact))
            }
            Self::KeywordThreshold { keywords } => Ok(keyword_threshold(answer, keywords)),
            Self::Integer { expected } => {
                let value: i64 = answer.trim().parse().map_err(|_| {
                    DtmError::InvalidInput(format!("please enter a whole number, got {answer:?}"))
                })?;
                Ok(value == *expected)
            }
        }
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self {
            Self::ExactChoice { choices, .. } => Some(choices),
            _ => None,
        }
    }

    /// Resolves a 1-based option number to the option text; anything else is
    /// passed through unchanged.
    pub fn resolve_choice<'a>(&'a self, input: &'a str) -> &'a str {
        let Some(choices) = self.choices() else {
            return input;
        };
        match input.trim().parse::<usize>() {
            Ok(n) if n >= 1 && n <= choices.len() => &choices[n - 1],
            _ => input,
        }
    }
}

/// Counts keyword hits in the lower-cased answer; passes with at least
/// [`MIN_KEYWORD_MATCHES`] hits and more than [`MIN_ANSWER_CHARS`] characters.
pub fn keyword_threshold(answer: &str, keywords: &[String]) -> bool {
    let lowered = answer.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|k| lowered.contains(&k.to_lowercase()))
        .count();
    hits >= MIN_KEYWORD_MATCHES && answer.trim().chars().count() > MIN_ANSWER_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> AnswerRule {
        AnswerRule::KeywordThreshold {
            keywords: words.iter().map(|w| w.to_string()).collect(),
        }
    }

    #[test]
    fn test_exact_choice() {
        let rule = AnswerRule::ExactChoice {
            choices: vec!["1/x".into(), "x²".into()],
            answer: "1/x".into(),
        };
        assert!(rule.check("1/x").unwrap());
        assert!(!rule.check("x²").unwrap());
        assert!(!rule.check(" 1/x").unwrap());
    }

    #[test]
    fn test_resolve_choice() {
        let rule = AnswerRule::ExactChoice {
            choices: vec!["0".into(), "1".into(), "x".into()],
            answer: "1".into(),
        };
        assert_eq!(rule.resolve_choice("2"), "1");
        assert_eq!(rule.resolve_choice("3"), "x");
        assert_eq!(rule.resolve_choice("9"), "9");
        assert_eq!(rule.resolve_choice("x"), "x");

        let free = keywords(&["odd"]);
        assert_eq!(free.resolve_choice("1"), "1");
    }

    #[test]
    fn test_accepted_forms_ignore_whitespace() {
        let rule = AnswerRule::AcceptedForms {
            accepted: vec!["3/2".into(), "1.5".into(), "1+1/2".into()],
        };
        assert!(rule.check("3 / 2").unwrap());
        assert!(rule.check("1 + 1/2").unwrap());
        assert!(rule.check("1.5").unwrap());
        assert!(!rule.check("2/3").unwrap());
    }

    #[test]
    fn test_keyword_threshold_boundary() {
        let rule = keywords(&["odd"]);
        // 11 characters with a keyword: accepted
        assert!(rule.check("odd numbers").unwrap());
        // 10 characters with a keyword: rejected
        assert!(!rule.check("odd number").unwrap());
        // Surrounding whitespace does not count
        assert!(!rule.check("   odd number   ").unwrap());
    }

    #[test]
    fn test_keyword_threshold_needs_keyword() {
        let rule = keywords(&["parity", "even"]);
        assert!(!rule.check("a long answer without the words").unwrap());
        assert!(rule.check("It is about PARITY of the flips").unwrap());
    }

    #[test]
    fn test_integer() {
        let rule = AnswerRule::Integer { expected: 89 };
        assert!(rule.check(" 89 ").unwrap());
        assert!(!rule.check("88").unwrap());
        assert!(matches!(rule.check("eighty"), Err(DtmError::InvalidInput(_))));
    }

    #[test]
    fn test_rule_from_toml() {
        let rule: AnswerRule = toml::from_str(
            r#"
kind = "keyword_threshold"
keywords = ["converse", "swap"]
"#,
        )
        .unwrap();
        assert_eq!(rule, keywords(&["converse", "swap"]));
    }
}
