use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DtmResult;

/// Spreadsheet header row, one column per event field.
pub const HEADER: [&str; 6] = [
    "Timestamp",
    "Student",
    "Section",
    "Interaction Type",
    "Details",
    "Correctness",
];

/// Section used for login events.
pub const LOGIN_SECTION: &str = "Login";

/// One logged action. Events are never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub participant: String,
    pub section: String,
    pub kind: EventKind,
    pub details: String,
    pub correctness: Correctness,

    /// Per-question identifier, also embedded in `details`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl InteractionEvent {
    pub fn new(
        participant: impl Into<String>,
        section: impl Into<String>,
        kind: EventKind,
        details: impl Into<String>,
        correctness: Correctness,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: Utc::now(),
            participant: participant.into(),
            section: section.into(),
            kind,
            details: details.into(),
            correctness,
            question: None,
        }
    }

    pub fn login(participant: &str) -> Self {
        Self::new(
            participant,
            LOGIN_SECTION,
            EventKind::Login,
            format!("{participant} logged in"),
            Correctness::NotApplicable,
        )
    }

    pub fn section_change(participant: &str, section: &str) -> Self {
        Self::new(
            participant,
            section,
            EventKind::SectionChange,
            format!("Navigated to {section}"),
            Correctness::NotApplicable,
        )
    }

    /// A quiz answer; `details` reads `"<key> Answer: <answer>"`.
    pub fn quiz_answer(
        participant: &str,
        section: &str,
        key: &str,
        answer: &str,
        correct: bool,
    ) -> Self {
        let mut event = Self::new(
            participant,
            section,
            EventKind::QuizAnswer,
            format!("{key} Answer: {answer}"),
            Correctness::from(Some(correct)),
        );
        event.question = Some(key.to_string());
        event
    }

    pub fn fibonacci_challenge(participant: &str, section: &str, correct_count: usize) -> Self {
        Self::new(
            participant,
            section,
            EventKind::FibonacciChallenge,
            format!("Listed {correct_count} correct Fibonacci numbers"),
            Correctness::Correct,
        )
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The six spreadsheet columns, timestamp in local time.
    pub fn to_row(&self) -> [String; 6] {
        [
            self.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            self.participant.clone(),
            self.section.clone(),
            self.kind.to_string(),
            self.details.clone(),
            self.correctness.to_string(),
        ]
    }

    pub fn to_json(&self) -> DtmResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[serde(rename = "student_login", alias = "login")]
    Login,
    SectionChange,
    QuizAnswer,
    FibonacciChallenge,
    FreeText,
    Other(String),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "student_login"),
            Self::SectionChange => write!(f, "section_change"),
            Self::QuizAnswer => write!(f, "quiz_answer"),
            Self::FibonacciChallenge => write!(f, "fibonacci_challenge"),
            Self::FreeText => write!(f, "free_text"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty interaction type".into());
        }
        Ok(match s {
            "student_login" | "login" => Self::Login,
            "section_change" => Self::SectionChange,
            "quiz_answer" => Self::QuizAnswer,
            "fibonacci_challenge" => Self::FibonacciChallenge,
            "free_text" => Self::FreeText,
            other => Self::Other(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Correct,
    Incorrect,
    NotApplicable,
}

impl From<Option<bool>> for Correctness {
    fn from(val: Option<bool>) -> Self {
        match val {
            Some(true) => Self::Correct,
            Some(false) => Self::Incorrect,
            None => Self::NotApplicable,
        }
    }
}

impl fmt::Display for Correctness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct => write!(f, "Correct"),
            Self::Incorrect => write!(f, "Incorrect"),
            Self::NotApplicable => write!(f, "N/A"),
        }
    }
}

impl std::str::FromStr for Correctness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Ok(Self::Correct),
            "incorrect" => Ok(Self::Incorrect),
            "n/a" | "" | "not_applicable" => Ok(Self::NotApplicable),
            _ => Err(format!("invalid correctness: {s}")),
        }
    }
}
