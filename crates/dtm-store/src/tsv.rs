//! Local append-only fallback log.
//!
//! One line per event: `timestamp \t participant \t problem id \t details`.
//! The problem id is the question key when the event has one, the section
//! otherwise. The last column is the full details text, so an answer is
//! stored as `<key> Answer: <answer>` rather than the bare answer, matching
//! what the shared log keeps. Kind and correctness are not kept, so events
//! read back from this file never satisfy the completion gate.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use dtm_core::{Correctness, DtmResult, EventKind, InteractionEvent, InteractionLog};

pub struct TsvLog {
    path: PathBuf,
}

impl TsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Tabs and newlines would break the line format.
fn clean(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}

pub fn format_line(event: &InteractionEvent) -> String {
    let problem_id = event.question.as_deref().unwrap_or(&event.section);
    format!(
        "{}\t{}\t{}\t{}\n",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        clean(&event.participant),
        clean(problem_id),
        clean(&event.details),
    )
}

fn parse_line(line: &str) -> Option<InteractionEvent> {
    let mut fields = line.splitn(4, '\t');
    let timestamp = DateTime::parse_from_rfc3339(fields.next()?).ok()?;
    let participant = fields.next()?;
    let problem_id = fields.next()?;
    let details = fields.next()?;

    Some(
        InteractionEvent::new(
            participant,
            problem_id,
            EventKind::FreeText,
            details,
            Correctness::NotApplicable,
        )
        .with_timestamp(timestamp.with_timezone(&Utc)),
    )
}

impl InteractionLog for TsvLog {
    fn append(&self, event: &InteractionEvent) -> DtmResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // Single write so concurrent appenders never interleave within a line
        file.write_all(format_line(event).as_bytes())?;
        Ok(())
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(event) => events.push(event),
                None => warn!(
                    path = %self.path.display(),
                    line = n + 1,
                    "skipping malformed log line"
                ),
            }
        }
        Ok(events)
    }
}
