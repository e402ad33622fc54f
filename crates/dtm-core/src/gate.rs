//! Completion gating: has each of the two students logged a correct answer
//! for a given (section, question key)?
//!
//! Status is always re-derived by scanning the whole log. Only the existence
//! of a qualifying row matters, so the scan does not depend on the order in
//! which concurrent sessions appended.

use serde::{Deserialize, Serialize};

use crate::error::{DtmError, DtmResult};
use crate::event::{Correctness, EventKind, InteractionEvent};
use crate::log::{read_or_empty, InteractionLog};

/// The two students sharing a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub first: String,
    pub second: String,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            first: "Soren".into(),
            second: "Ayushi".into(),
        }
    }
}

impl Roster {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> DtmResult<Self> {
        let (first, second) = (first.into(), second.into());
        if first.trim().is_empty() || second.trim().is_empty() {
            return Err(DtmError::Config("participant names must not be empty".into()));
        }
        if first == second {
            return Err(DtmError::Config(format!(
                "participants must be distinct, got {first} twice"
            )));
        }
        Ok(Self { first, second })
    }

    pub fn from_names(names: &[String]) -> DtmResult<Self> {
        match names {
            [first, second] => Self::new(first.clone(), second.clone()),
            _ => Err(DtmError::Config(format!(
                "expected exactly two participants, got {}",
                names.len()
            ))),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.first == name || self.second == name
    }

    pub fn names(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }

    /// The other student, if `name` is on the roster.
    pub fn partner_of(&self, name: &str) -> Option<&str> {
        if name == self.first {
            Some(&self.second)
        } else if name == self.second {
            Some(&self.first)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStatus {
    pub first_completed: bool,
    pub second_completed: bool,
    pub both_completed: bool,
}

impl CompletionStatus {
    fn new(first_completed: bool, second_completed: bool) -> Self {
        Self {
            first_completed,
            second_completed,
            both_completed: first_completed && second_completed,
        }
    }

    pub fn completed_by(&self, roster: &Roster, name: &str) -> bool {
        if name == roster.first {
            self.first_completed
        } else if name == roster.second {
            self.second_completed
        } else {
            false
        }
    }
}

/// Does `event` record a correct answer to `question_key` in `section`?
pub fn is_qualifying(event: &InteractionEvent, section: &str, question_key: &str) -> bool {
    event.section == section
        && event.kind == EventKind::QuizAnswer
        && event.details.contains(question_key)
        && event.correctness == Correctness::Correct
}

pub fn completion_from_events(
    events: &[InteractionEvent],
    roster: &Roster,
    section: &str,
    question_key: &str,
) -> CompletionStatus {
    let mut first = false;
    let mut second = false;
    for event in events {
        if !is_qualifying(event, section, question_key) {
            continue;
        }
        if event.participant == roster.first {
            first = true;
        } else if event.participant == roster.second {
            second = true;
        }
        if first && second {
            break;
        }
    }
    CompletionStatus::new(first, second)
}

/// Re-derives the status from the log. An unreachable log reports nothing completed.
pub fn check_completion(
    log: &dyn InteractionLog,
    roster: &Roster,
    section: &str,
    question_key: &str,
) -> CompletionStatus {
    completion_from_events(&read_or_empty(log), roster, section, question_key)
}

// ---------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Scoreboard {
    pub first_best: usize,
    pub second_best: usize,
}

/// Pulls `N` out of `"Listed N correct Fibonacci numbers"`.
pub fn parse_listed_count(details: &str) -> Option<usize> {
    let (_, rest) = details.split_once("Listed ")?;
    rest.split(' ').next()?.parse().ok()
}

/// Best Fibonacci-listing count per student in `section`; unparsable rows are skipped.
pub fn fibonacci_scoreboard(
    events: &[InteractionEvent],
    roster: &Roster,
    section: &str,
) -> Scoreboard {
    let mut board = Scoreboard::default();
    for event in events {
        if event.section != section || event.kind != EventKind::FibonacciChallenge {
            continue;
        }
        let Some(count) = parse_listed_count(&event.details) else {
            continue;
        };
        if event.participant == roster.first {
            board.first_best = board.first_best.max(count);
        } else if event.participant == roster.second {
            board.second_best = board.second_best.max(count);
        }
    }
    board
}
