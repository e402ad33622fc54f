use tracing::warn;

use dtm_core::{DtmResult, InteractionEvent, InteractionLog, LogStats};

use crate::tsv::TsvLog;

/// Writes every event to the local file and, best effort, to the shared log.
///
/// Reads come from the shared log while it answers and fall back to the
/// local file when it does not.
pub struct MirroredLog {
    local: TsvLog,
    remote: Box<dyn InteractionLog>,
}

impl MirroredLog {
    pub fn new(local: TsvLog, remote: Box<dyn InteractionLog>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &TsvLog {
        &self.local
    }
}

impl InteractionLog for MirroredLog {
    fn append(&self, event: &InteractionEvent) -> DtmResult<()> {
        let local = self.local.append(event);
        let remote = self.remote.append(event);

        match (local, remote) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                warn!("shared log append failed, kept locally: {e}");
                Ok(())
            }
            (Err(e), Ok(())) => {
                warn!(path = %self.local.path().display(), "local log append failed: {e}");
                Ok(())
            }
            (Err(local_err), Err(remote_err)) => {
                warn!("shared log append failed: {remote_err}");
                Err(local_err)
            }
        }
    }

    fn read_all(&self) -> DtmResult<Vec<InteractionEvent>> {
        self.remote.read_all().or_else(|e| {
            warn!("shared log unavailable, reading local log: {e}");
            self.local.read_all()
        })
    }

    fn count(&self) -> DtmResult<usize> {
        self.remote.count().or_else(|_| self.local.count())
    }

    fn stats(&self) -> DtmResult<LogStats> {
        self.remote.stats().or_else(|_| self.local.stats())
    }

    fn recent(&self, limit: usize) -> DtmResult<Vec<InteractionEvent>> {
        self.remote.recent(limit).or_else(|_| self.local.recent(limit))
    }
}
