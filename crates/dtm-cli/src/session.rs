//! Interactive lesson session over any line-based input and output.

use std::io::{BufRead, Write};

use anyhow::Result;

use dtm_core::log::read_or_empty;
use dtm_core::{DtmError, InteractionLog, Navigation, ProgressState, QuizMachine, SubmitOutcome};

const HELP: &str = "Commands: :next  :prev  :jump <module> <question>  :reset  :status  :refresh  \
                    :hint  :quit";

pub struct Session<'a, R, W> {
    machine: QuizMachine<'a>,
    log: &'a dyn InteractionLog,
    state: ProgressState,
    input: R,
    output: W,
    /// Module whose intro was printed last.
    shown_module: Option<usize>,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(machine: QuizMachine<'a>, log: &'a dyn InteractionLog, input: R, output: W) -> Self {
        Self {
            machine,
            log,
            state: ProgressState::default(),
            input,
            output,
            shown_module: None,
        }
    }

    /// Runs until `:quit` or end of input and returns the final progress.
    pub fn run(mut self) -> Result<ProgressState> {
        if !self.machine.start(self.log) {
            writeln!(self.output, "(interaction log unavailable, answers will not be saved)")?;
        }
        let catalog = self.machine.catalog();
        writeln!(self.output, "{}", catalog.title)?;
        writeln!(self.output, "Hello, {}! {HELP}", self.machine.participant())?;
        self.show_current()?;

        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                break;
            }
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if let Some(command) = input.strip_prefix(':') {
                if !self.command(command)? {
                    break;
                }
            } else {
                self.answer(input)?;
            }
        }

        writeln!(self.output, "Goodbye, {}.", self.machine.participant())?;
        Ok(self.state)
    }

    /// Returns false when the session should end.
    fn command(&mut self, command: &str) -> Result<bool> {
        let mut parts = command.split_whitespace();
        match parts.next().unwrap_or_default() {
            "quit" | "q" => return Ok(false),
            "next" | "n" => match self.machine.go_next(&mut self.state, self.log)? {
                Navigation::Blocked => writeln!(self.output, "Answer this question first.")?,
                Navigation::AtEnd => writeln!(self.output, "This is the last question.")?,
                _ => self.show_current()?,
            },
            "prev" | "p" => match self.machine.go_previous(&mut self.state, self.log)? {
                Navigation::AtStart => writeln!(self.output, "This is the first question.")?,
                _ => self.show_current()?,
            },
            "jump" | "j" => {
                let target: Option<(usize, usize)> = match (parts.next(), parts.next()) {
                    (Some(m), Some(s)) => m.parse().ok().zip(s.parse().ok()),
                    _ => None,
                };
                let Some((m, s)) = target.filter(|(m, s)| *m >= 1 && *s >= 1) else {
                    writeln!(self.output, "Usage: :jump <module> <question>, counting from 1")?;
                    return Ok(true);
                };
                match self.machine.jump_to(&mut self.state, self.log, m - 1, s - 1) {
                    Ok(_) => self.show_current()?,
                    Err(DtmError::OutOfRange(msg)) => {
                        writeln!(self.output, "Cannot jump there: {msg}")?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            "reset" => {
                self.machine.reset(&mut self.state);
                self.shown_module = None;
                writeln!(self.output, "Progress reset.")?;
                self.show_current()?;
            }
            "status" => self.status()?,
            "refresh" | "r" => self.refresh()?,
            "hint" => {
                let sub = self.machine.current(&self.state)?;
                writeln!(self.output, "{}", sub.hint)?;
            }
            _ => writeln!(self.output, "{HELP}")?,
        }
        Ok(true)
    }

    fn answer(&mut self, answer: &str) -> Result<()> {
        let (m, s) = self.state.position();
        let missing = self
            .machine
            .missing_checkpoints(&read_or_empty(self.log), m, s);
        if !missing.is_empty() {
            writeln!(
                self.output,
                "Locked until both students finish: {}",
                missing.join(", ")
            )?;
            return Ok(());
        }

        match self.machine.submit(&mut self.state, self.log, answer)? {
            SubmitOutcome::Accepted {
                message,
                logged,
                module_completed,
                finished,
            } => {
                writeln!(self.output, "{message}")?;
                if !logged {
                    writeln!(self.output, "(not saved to the interaction log)")?;
                }
                if module_completed {
                    self.reward(m)?;
                }
                if finished {
                    writeln!(
                        self.output,
                        "You finished every question! Use :jump to review or :quit to leave."
                    )?;
                } else {
                    self.show_current()?;
                }
            }
            SubmitOutcome::Rejected { hint, .. } => writeln!(self.output, "{hint}")?,
            SubmitOutcome::Malformed { message } => writeln!(self.output, "{message}")?,
        }
        Ok(())
    }

    fn show_current(&mut self) -> Result<()> {
        let catalog = self.machine.catalog();
        let (m, s) = self.state.position();
        let Some(module) = catalog.module(m) else {
            return Err(DtmError::OutOfRange(format!("no module {m}")).into());
        };
        let sub = self.machine.current(&self.state)?;

        if self.shown_module != Some(m) {
            writeln!(self.output)?;
            writeln!(self.output, "== {} ==", module.section)?;
            if !module.intro.is_empty() {
                writeln!(self.output, "{}", module.intro)?;
            }
            self.shown_module = Some(m);
        }

        writeln!(self.output)?;
        let done = if self.state.is_completed(m, s) { " (answered)" } else { "" };
        writeln!(
            self.output,
            "[{}/{}] {}{done}",
            s + 1,
            module.subproblems.len(),
            sub.prompt
        )?;
        if let Some(choices) = sub.rule.choices() {
            for (i, choice) in choices.iter().enumerate() {
                writeln!(self.output, "  {}. {choice}", i + 1)?;
            }
        }

        let missing = self
            .machine
            .missing_checkpoints(&read_or_empty(self.log), m, s);
        if !missing.is_empty() {
            writeln!(
                self.output,
                "Locked until both students finish: {}",
                missing.join(", ")
            )?;
        }
        Ok(())
    }

    fn reward(&mut self, module: usize) -> Result<()> {
        if let Some(reward) = self
            .machine
            .unlocked_reward(&read_or_empty(self.log), module)
        {
            writeln!(self.output, "*** {} ***", reward.title)?;
            writeln!(self.output, "{}", reward.text)?;
        } else if self.machine.catalog().module(module).and_then(|m| m.reward.as_ref()).is_some() {
            let partner = self.machine.partner().unwrap_or("your partner");
            writeln!(
                self.output,
                "Waiting for {partner} to unlock the next part. Type :refresh to check again."
            )?;
        }
        Ok(())
    }

    /// Re-reads the log: shows every reward both students have unlocked and
    /// whether the current question is still locked.
    fn refresh(&mut self) -> Result<()> {
        let events = read_or_empty(self.log);
        let catalog = self.machine.catalog();
        let mut waiting = false;
        for (m, module) in catalog.modules.iter().enumerate() {
            if module.reward.is_none() {
                continue;
            }
            if let Some(reward) = self.machine.unlocked_reward(&events, m) {
                writeln!(self.output, "*** {} ***", reward.title)?;
                writeln!(self.output, "{}", reward.text)?;
            } else if self.state.is_module_completed(m) {
                waiting = true;
            }
        }
        if waiting {
            let partner = self.machine.partner().unwrap_or("your partner");
            writeln!(self.output, "Still waiting for {partner}.")?;
        }

        let (m, s) = self.state.position();
        let missing = self.machine.missing_checkpoints(&events, m, s);
        if !missing.is_empty() {
            writeln!(
                self.output,
                "Locked until both students finish: {}",
                missing.join(", ")
            )?;
        }
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let catalog = self.machine.catalog();
        writeln!(
            self.output,
            "Answered {}/{} questions; at module {} question {}.",
            self.state.completed.len(),
            catalog.total_subproblems(),
            self.state.module_index + 1,
            self.state.subproblem_index + 1
        )?;
        for progress in self.machine.progress_overview(&read_or_empty(self.log)) {
            let mark = if progress.status.both_completed { "done" } else { "open" };
            writeln!(self.output, "  {:<12} {mark}", progress.checkpoint.name)?;
        }
        Ok(())
    }
}
