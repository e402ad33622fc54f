use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{DtmError, DtmResult};
use crate::event::InteractionEvent;

/// Append-only, insertion-ordered record of interactions.
///
/// Backends may be shared by several sessions; each `append` must either
/// store the whole event or nothing.
pub trait InteractionLog {
    fn append(&self, event: &InteractionEvent) -> DtmResult<()>;
    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>>;

    fn count(&self) -> DtmResult<usize> {
        Ok(self.read_all()?.len())
    }

    fn stats(&self) -> DtmResult<LogStats> {
        Ok(LogStats::from_events(&self.read_all()?))
    }

    /// The `limit` most recent events, oldest first.
    fn recent(&self, limit: usize) -> DtmResult<Vec<InteractionEvent>> {
        let mut events = self.read_all()?;
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
        Ok(events)
    }
}

impl<L: InteractionLog + ?Sized> InteractionLog for Box<L> {
    fn append(&self, event: &InteractionEvent) -> DtmResult<()> {
        (**self).append(event)
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        (**self).read_all()
    }

    fn count(&self) -> DtmResult<usize> {
        (**self).count()
    }

    fn stats(&self) -> DtmResult<LogStats> {
        (**self).stats()
    }

    fn recent(&self, limit: usize) -> DtmResult<Vec<InteractionEvent>> {
        (**self).recent(limit)
    }
}

/// Appends `event`, swallowing any failure. Returns whether it was stored.
pub fn record(log: &dyn InteractionLog, event: &InteractionEvent) -> bool {
    match log.append(event) {
        Ok(()) => {
            debug!(kind = %event.kind, section = %event.section, "logged interaction");
            true
        }
        Err(e) => {
            warn!("interaction logging failed: {e}");
            false
        }
    }
}

/// Reads the whole log, treating an unavailable backend as empty.
pub fn read_or_empty(log: &dyn InteractionLog) -> Vec<InteractionEvent> {
    log.read_all().unwrap_or_else(|e| {
        warn!("interaction log unavailable: {e}");
        Vec::new()
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogStats {
    pub total_events: usize,
    pub total_participants: usize,
    pub oldest_event: Option<DateTime<Utc>>,
    pub newest_event: Option<DateTime<Utc>>,
}

impl LogStats {
    pub fn from_events(events: &[InteractionEvent]) -> Self {
        let mut participants: Vec<&str> = events.iter().map(|e| e.participant.as_str()).collect();
        participants.sort_unstable();
        participants.dedup();
        Self {
            total_events: events.len(),
            total_participants: participants.len(),
            oldest_event: events.iter().map(|e| e.timestamp).min(),
            newest_event: events.iter().map(|e| e.timestamp).max(),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory log
// ---------------------------------------------------------------------------

/// Process-local log, used when no persistent backend is configured.
#[derive(Debug, Default)]
pub struct MemoryLog {
    events: Mutex<Vec<InteractionEvent>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionLog for MemoryLog {
    fn append(&self, event: &InteractionEvent) -> DtmResult<()> {
        self.events
            .lock()
            .map_err(|e| DtmError::Database(format!("log lock poisoned: {e}")))?
            .push(event.clone());
        Ok(())
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        Ok(self
            .events
            .lock()
            .map_err(|e| DtmError::Database(format!("log lock poisoned: {e}")))?
            .clone())
    }
}

/// A backend that is never reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLog;

impl InteractionLog for UnavailableLog {
    fn append(&self, _event: &InteractionEvent) -> DtmResult<()> {
        Err(DtmError::Database("interaction log unavailable".into()))
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        Err(DtmError::Database("interaction log unavailable".into()))
    }
}
