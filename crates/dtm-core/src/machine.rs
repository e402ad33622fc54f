//! Quiz/progress state machine.
//!
//! A session's position and completion records live in a [`ProgressState`]
//! owned by the caller and passed into every transition. The machine itself
//! only borrows the catalog and roster, so it holds no session state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, Checkpoint, Reward, Subproblem};
use crate::error::{DtmError, DtmResult};
use crate::event::InteractionEvent;
use crate::gate::{completion_from_events, CompletionStatus, Roster};
use crate::log::{record, InteractionLog};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub module_index: usize,
    pub subproblem_index: usize,
    /// Completed `(module, subproblem)` positions.
    pub completed: BTreeSet<(usize, usize)>,
    pub completed_modules: BTreeSet<usize>,
    /// Set once the last subproblem of the last module is answered.
    pub finished: bool,
}

impl ProgressState {
    pub fn position(&self) -> (usize, usize) {
        (self.module_index, self.subproblem_index)
    }

    pub fn is_completed(&self, module: usize, sub: usize) -> bool {
        self.completed.contains(&(module, sub))
    }

    pub fn is_module_completed(&self, module: usize) -> bool {
        self.completed_modules.contains(&module)
    }

    fn move_to(&mut self, module: usize, sub: usize) {
        self.module_index = module;
        self.subproblem_index = sub;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted {
        message: String,
        /// Whether the answer reached the interaction log.
        logged: bool,
        module_completed: bool,
        finished: bool,
    },
    Rejected {
        hint: String,
        logged: bool,
    },
    /// The input could not be read as an answer (e.g. text where a number was expected).
    Malformed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved { module: usize, subproblem: usize },
    /// The current subproblem has not been answered yet.
    Blocked,
    AtStart,
    AtEnd,
}

/// Progress of one named checkpoint, as shown in the overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointProgress<'a> {
    pub checkpoint: &'a Checkpoint,
    pub status: CompletionStatus,
}

pub struct QuizMachine<'a> {
    catalog: &'a Catalog,
    roster: &'a Roster,
    participant: String,
    log_incorrect: bool,
}

impl<'a> QuizMachine<'a> {
    pub fn new(catalog: &'a Catalog, roster: &'a Roster, participant: &str) -> DtmResult<Self> {
        if !roster.contains(participant) {
            return Err(DtmError::InvalidInput(format!(
                "{participant:?} is not one of {:?}",
                roster.names()
            )));
        }
        Ok(Self {
            catalog,
            roster,
            participant: participant.to_string(),
            log_incorrect: false,
        })
    }

    /// Also log wrong answers, marked `Incorrect`.
    pub fn log_incorrect(mut self, enabled: bool) -> Self {
        self.log_incorrect = enabled;
        self
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn partner(&self) -> Option<&'a str> {
        self.roster.partner_of(&self.participant)
    }

    /// Logs the session start.
    pub fn start(&self, log: &dyn InteractionLog) -> bool {
        record(log, &InteractionEvent::login(&self.participant))
    }

    pub fn current(&self, state: &ProgressState) -> DtmResult<&'a Subproblem> {
        let (m, s) = state.position();
        self.catalog
            .subproblem(m, s)
            .ok_or_else(|| DtmError::OutOfRange(format!("no subproblem at ({m}, {s})")))
    }

    pub fn submit(
        &self,
        state: &mut ProgressState,
        log: &dyn InteractionLog,
        answer: &str,
    ) -> DtmResult<SubmitOutcome> {
        let sub = self.current(state)?;
        let (m, s) = state.position();
        let section = self.section_name(m)?;
        let answer = sub.rule.resolve_choice(answer);

        let correct = match sub.rule.check(answer) {
            Ok(correct) => correct,
            Err(DtmError::InvalidInput(message)) => return Ok(SubmitOutcome::Malformed { message }),
            Err(e) => return Err(e),
        };

        if !correct {
            let logged = self.log_incorrect
                && record(
                    log,
                    &InteractionEvent::quiz_answer(
                        &self.participant,
                        section,
                        &sub.key,
                        answer,
                        false,
                    ),
                );
            return Ok(SubmitOutcome::Rejected {
                hint: sub.hint.clone(),
                logged,
            });
        }

        let logged = record(
            log,
            &InteractionEvent::quiz_answer(&self.participant, section, &sub.key, answer, true),
        );
        state.completed.insert((m, s));
        let module_completed =
            (0..self.catalog.subproblem_count(m)).all(|i| state.is_completed(m, i));
        if module_completed {
            state.completed_modules.insert(m);
        }

        if s + 1 < self.catalog.subproblem_count(m) {
            state.move_to(m, s + 1);
        } else if m + 1 < self.catalog.module_count() {
            self.enter_module(state, log, m + 1, 0)?;
        } else {
            state.finished = true;
        }
        debug!(module = m, subproblem = s, finished = state.finished, "answer accepted");

        Ok(SubmitOutcome::Accepted {
            message: sub.success.clone().unwrap_or_else(|| "Correct!".to_string()),
            logged,
            module_completed,
            finished: state.finished,
        })
    }

    pub fn go_next(
        &self,
        state: &mut ProgressState,
        log: &dyn InteractionLog,
    ) -> DtmResult<Navigation> {
        let (m, s) = state.position();
        if (m, s) == self.catalog.last_position() {
            return Ok(Navigation::AtEnd);
        }
        if !state.is_completed(m, s) {
            return Ok(Navigation::Blocked);
        }
        if s + 1 < self.catalog.subproblem_count(m) {
            state.move_to(m, s + 1);
        } else {
            self.enter_module(state, log, m + 1, 0)?;
        }
        Ok(self.moved(state))
    }

    pub fn go_previous(
        &self,
        state: &mut ProgressState,
        log: &dyn InteractionLog,
    ) -> DtmResult<Navigation> {
        match state.position() {
            (0, 0) => Ok(Navigation::AtStart),
            (m, 0) => {
                let last = self.catalog.subproblem_count(m - 1).saturating_sub(1);
                self.enter_module(state, log, m - 1, last)?;
                Ok(self.moved(state))
            }
            (m, s) => {
                state.move_to(m, s - 1);
                Ok(self.moved(state))
            }
        }
    }

    /// Random access for review. Completion records are left alone.
    pub fn jump_to(
        &self,
        state: &mut ProgressState,
        log: &dyn InteractionLog,
        module: usize,
        sub: usize,
    ) -> DtmResult<Navigation> {
        if self.catalog.subproblem(module, sub).is_none() {
            return Err(DtmError::OutOfRange(format!(
                "no subproblem at ({module}, {sub}); catalog has {} modules",
                self.catalog.module_count()
            )));
        }
        if module == state.module_index {
            state.move_to(module, sub);
        } else {
            self.enter_module(state, log, module, sub)?;
        }
        Ok(self.moved(state))
    }

    /// Back to the initial state. The interaction log is not touched.
    pub fn reset(&self, state: &mut ProgressState) {
        *state = ProgressState::default();
    }

    // -----------------------------------------------------------------------
    // Gating
    // -----------------------------------------------------------------------

    /// Required checkpoints of a subproblem that both students have not yet passed.
    pub fn missing_checkpoints(
        &self,
        events: &[InteractionEvent],
        module: usize,
        sub: usize,
    ) -> Vec<&'a str> {
        let Some(subproblem) = self.catalog.subproblem(module, sub) else {
            return Vec::new();
        };
        self.unmet(events, &subproblem.requires)
    }

    pub fn is_unlocked(&self, events: &[InteractionEvent], module: usize, sub: usize) -> bool {
        self.missing_checkpoints(events, module, sub).is_empty()
    }

    /// The module's reward, once every checkpoint it names is passed by both students.
    pub fn unlocked_reward(
        &self,
        events: &[InteractionEvent],
        module: usize,
    ) -> Option<&'a Reward> {
        let reward = self.catalog.module(module)?.reward.as_ref()?;
        self.unmet(events, &reward.requires)
            .is_empty()
            .then_some(reward)
    }

    /// Checkpoints still standing between both students and the module's reward.
    /// Empty when the module has no reward.
    pub fn missing_for_reward(&self, events: &[InteractionEvent], module: usize) -> Vec<&'a str> {
        match self.catalog.module(module).and_then(|m| m.reward.as_ref()) {
            Some(reward) => self.unmet(events, &reward.requires),
            None => Vec::new(),
        }
    }

    pub fn progress_overview(&self, events: &[InteractionEvent]) -> Vec<CheckpointProgress<'a>> {
        checkpoint_overview(self.catalog, self.roster, events)
    }

    fn unmet(&self, events: &[InteractionEvent], required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| {
                self.catalog.checkpoint(name).map_or(true, |c| {
                    !completion_from_events(events, self.roster, &c.section, &c.key).both_completed
                })
            })
            .map(String::as_str)
            .collect()
    }

    // -----------------------------------------------------------------------

    fn section(&self, module: usize) -> Option<&'a str> {
        self.catalog.module(module).map(|m| m.section.as_str())
    }

    fn section_name(&self, module: usize) -> DtmResult<&'a str> {
        self.section(module)
            .ok_or_else(|| DtmError::OutOfRange(format!("no module {module}")))
    }

    fn enter_module(
        &self,
        state: &mut ProgressState,
        log: &dyn InteractionLog,
        module: usize,
        sub: usize,
    ) -> DtmResult<()> {
        let section = self.section_name(module)?;
        state.move_to(module, sub);
        record(log, &InteractionEvent::section_change(&self.participant, section));
        Ok(())
    }

    fn moved(&self, state: &ProgressState) -> Navigation {
        Navigation::Moved {
            module: state.module_index,
            subproblem: state.subproblem_index,
        }
    }
}

/// Completion status of every checkpoint in catalog order.
pub fn checkpoint_overview<'a>(
    catalog: &'a Catalog,
    roster: &Roster,
    events: &[InteractionEvent],
) -> Vec<CheckpointProgress<'a>> {
    catalog
        .checkpoints
        .iter()
        .map(|checkpoint| CheckpointProgress {
            checkpoint,
            status: completion_from_events(events, roster, &checkpoint.section, &checkpoint.key),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Correctness, EventKind};
    use crate::lessons;
    use crate::log::{MemoryLog, UnavailableLog};

    const TWO_MODULES: &str = r#"
name = "test"
title = "Test lesson"

[[modules]]
section = "Part A"

[[modules.subproblems]]
key = "A1"
prompt = "Pick 1/x"
hint = "Subtract 1."
rule = { kind = "exact_choice", choices = ["1/x", "x + 1"], answer = "1/x" }

[[modules.subproblems]]
key = "A2"
prompt = "Why?"
hint = "Think about odd and even."
rule = { kind = "keyword_threshold", keywords = ["odd"] }

[[modules]]
section = "Part B"

[[modules.subproblems]]
key = "B1"
prompt = "How many?"
hint = "Count again."
rule = { kind = "integer", expected = 89 }
success = "Yes, 89."
"#;

    fn catalog() -> Catalog {
        Catalog::from_toml_str(TWO_MODULES).unwrap()
    }

    fn kinds(log: &MemoryLog) -> Vec<EventKind> {
        log.read_all().unwrap().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_initial_state() {
        let state = ProgressState::default();
        assert_eq!(state.position(), (0, 0));
        assert!(state.completed.is_empty());
        assert!(!state.finished);
    }

    #[test]
    fn test_unknown_participant_rejected() {
        let (catalog, roster) = (catalog(), Roster::default());
        assert!(matches!(
            QuizMachine::new(&catalog, &roster, "Mallory"),
            Err(DtmError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_correct_answer_logs_and_advances() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        let outcome = machine.submit(&mut state, &log, "1/x").unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                message: "Correct!".into(),
                logged: true,
                module_completed: false,
                finished: false,
            }
        );
        assert_eq!(state.position(), (0, 1));
        assert!(state.is_completed(0, 0));

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, "A1 Answer: 1/x");
        assert_eq!(events[0].section, "Part A");
        assert_eq!(events[0].correctness, Correctness::Correct);
    }

    #[test]
    fn test_numbered_choice_resolves() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Ayushi").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        let outcome = machine.submit(&mut state, &log, "1").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        assert_eq!(log.read_all().unwrap()[0].details, "A1 Answer: 1/x");
    }

    #[test]
    fn test_keyword_boundary_through_submit() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.jump_to(&mut state, &log, 0, 1).unwrap();
        let before = (state.clone(), log.count().unwrap());

        // 10 characters: rejected, nothing changes
        let outcome = machine.submit(&mut state, &log, "odd number").unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                hint: "Think about odd and even.".into(),
                logged: false,
            }
        );
        assert_eq!((state.clone(), log.count().unwrap()), before);

        // 11 characters: accepted, module done, moves into Part B
        let outcome = machine.submit(&mut state, &log, "odd numbers").unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Accepted {
                module_completed: false,
                ..
            }
        ));
        assert_eq!(state.position(), (1, 0));
        assert_eq!(
            kinds(&log),
            vec![EventKind::QuizAnswer, EventKind::SectionChange]
        );
    }

    #[test]
    fn test_module_completion_and_section_change() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        machine.submit(&mut state, &log, "1/x").unwrap();
        let outcome = machine.submit(&mut state, &log, "because odd plus odd").unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Accepted {
                module_completed: true,
                ..
            }
        ));
        assert!(state.is_module_completed(0));

        let events = log.read_all().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.kind, EventKind::SectionChange);
        assert_eq!(last.details, "Navigated to Part B");
    }

    #[test]
    fn test_finishing_is_terminal() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.jump_to(&mut state, &log, 1, 0).unwrap();

        let outcome = machine.submit(&mut state, &log, "89").unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                message: "Yes, 89.".into(),
                logged: true,
                module_completed: true,
                finished: true,
            }
        );
        assert_eq!(state.position(), (1, 0));

        let snapshot = state.clone();
        let logged = log.count().unwrap();
        for _ in 0..3 {
            assert_eq!(machine.go_next(&mut state, &log).unwrap(), Navigation::AtEnd);
        }
        assert_eq!(state, snapshot);
        assert_eq!(log.count().unwrap(), logged);
    }

    #[test]
    fn test_malformed_input_does_not_mutate() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren")
            .unwrap()
            .log_incorrect(true);
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.jump_to(&mut state, &log, 1, 0).unwrap();
        let before = (state.clone(), log.count().unwrap());

        let outcome = machine.submit(&mut state, &log, "eighty-nine").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Malformed { .. }));
        assert_eq!((state, log.count().unwrap()), before);
    }

    #[test]
    fn test_incorrect_answers_logged_when_enabled() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Ayushi")
            .unwrap()
            .log_incorrect(true);
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        let outcome = machine.submit(&mut state, &log, "x + 1").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected { logged: true, .. }));
        assert_eq!(state, ProgressState::default());

        let events = log.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correctness, Correctness::Incorrect);
    }

    #[test]
    fn test_unavailable_log_does_not_block_progress() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let mut state = ProgressState::default();

        assert!(!machine.start(&UnavailableLog));
        let outcome = machine.submit(&mut state, &UnavailableLog, "1/x").unwrap();
        assert!(matches!(outcome, SubmitOutcome::Accepted { logged: false, .. }));
        assert_eq!(state.position(), (0, 1));
    }

    #[test]
    fn test_go_next_requires_completion() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        assert_eq!(machine.go_next(&mut state, &log).unwrap(), Navigation::Blocked);
        machine.submit(&mut state, &log, "1/x").unwrap();
        machine.go_previous(&mut state, &log).unwrap();
        assert_eq!(state.position(), (0, 0));
        assert_eq!(
            machine.go_next(&mut state, &log).unwrap(),
            Navigation::Moved {
                module: 0,
                subproblem: 1
            }
        );
    }

    #[test]
    fn test_go_previous() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();

        assert_eq!(machine.go_previous(&mut state, &log).unwrap(), Navigation::AtStart);
        assert_eq!(state, ProgressState::default());
        assert_eq!(log.count().unwrap(), 0);

        machine.jump_to(&mut state, &log, 1, 0).unwrap();
        assert_eq!(
            machine.go_previous(&mut state, &log).unwrap(),
            Navigation::Moved {
                module: 0,
                subproblem: 1
            }
        );
        assert_eq!(log.read_all().unwrap().last().unwrap().section, "Part A");
    }

    #[test]
    fn test_jump_to() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.submit(&mut state, &log, "1/x").unwrap();
        let completed = state.completed.clone();

        machine.jump_to(&mut state, &log, 1, 0).unwrap();
        assert_eq!(state.position(), (1, 0));
        assert_eq!(state.completed, completed);

        assert!(matches!(
            machine.jump_to(&mut state, &log, 1, 1),
            Err(DtmError::OutOfRange(_))
        ));
        assert!(machine.jump_to(&mut state, &log, 5, 0).is_err());
        assert_eq!(state.position(), (1, 0));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (catalog, roster) = (catalog(), Roster::default());
        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.submit(&mut state, &log, "1/x").unwrap();
        let logged = log.read_all().unwrap();

        machine.reset(&mut state);
        let once = state.clone();
        machine.reset(&mut state);
        assert_eq!(state, once);
        assert_eq!(state, ProgressState::default());
        assert_eq!(log.read_all().unwrap(), logged);
    }

    #[test]
    fn test_gated_puzzle_unlocks_when_both_pass() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let soren = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let ayushi = QuizMachine::new(&catalog, &roster, "Ayushi").unwrap();
        let log = MemoryLog::new();

        // Puzzle 2 needs puzzle-1 from both students
        let events = log.read_all().unwrap();
        assert_eq!(soren.missing_checkpoints(&events, 1, 2), vec!["puzzle-1"]);
        assert!(soren.is_unlocked(&events, 1, 0));

        let mut s = ProgressState::default();
        soren.jump_to(&mut s, &log, 1, 0).unwrap();
        soren.submit(&mut s, &log, "3 / 2").unwrap();
        assert!(!soren.is_unlocked(&log.read_all().unwrap(), 1, 2));

        let mut a = ProgressState::default();
        ayushi.jump_to(&mut a, &log, 1, 0).unwrap();
        ayushi.submit(&mut a, &log, "1.5").unwrap();
        let events = log.read_all().unwrap();
        assert!(soren.is_unlocked(&events, 1, 2));
        assert!(ayushi.unlocked_reward(&events, 1).is_none());
        assert_eq!(ayushi.missing_for_reward(&events, 1), vec!["puzzle-2"]);
        assert_eq!(ayushi.partner(), Some("Soren"));
    }

    #[test]
    fn test_reward_and_overview() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let log = MemoryLog::new();

        for name in roster.names() {
            let machine = QuizMachine::new(&catalog, &roster, name).unwrap();
            let mut state = ProgressState::default();
            for answer in ["1", "2", "2"] {
                machine.submit(&mut state, &log, answer).unwrap();
            }
            assert!(state.is_module_completed(0));
        }

        let machine = QuizMachine::new(&catalog, &roster, "Soren").unwrap();
        let events = log.read_all().unwrap();
        let reward = machine.unlocked_reward(&events, 0).unwrap();
        assert_eq!(reward.title, "Takeaway");

        let overview = machine.progress_overview(&events);
        assert_eq!(overview.len(), 3);
        assert_eq!(overview[0].checkpoint.name, "part-a");
        assert!(overview[0].status.both_completed);
        assert!(!overview[1].status.first_completed);
    }

    #[test]
    fn test_bus_problem_answer() {
        let catalog = lessons::golden_ratio();
        let roster = Roster::default();
        let machine = QuizMachine::new(&catalog, &roster, "Ayushi").unwrap();
        let log = MemoryLog::new();
        let mut state = ProgressState::default();
        machine.jump_to(&mut state, &log, 2, 0).unwrap();

        assert!(matches!(
            machine.submit(&mut state, &log, "88").unwrap(),
            SubmitOutcome::Rejected { .. }
        ));
        assert!(matches!(
            machine.submit(&mut state, &log, "89").unwrap(),
            SubmitOutcome::Accepted { finished: true, .. }
        ));
    }
}
