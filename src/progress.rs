use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Snapshot of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub tokens: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Paused,
    Stopped,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    BatchCompleted,
    Paused,
    Resumed,
    Stopped,
    Finished,
}

impl EventKind {
    pub fn phase(self) -> Phase {
        match self {
            EventKind::BatchCompleted | EventKind::Resumed => Phase::Running,
            EventKind::Paused => Phase::Paused,
            EventKind::Stopped => Phase::Stopped,
            EventKind::Finished => Phase::Finished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub kind: EventKind,
    pub progress: Progress,
}

impl ProgressEvent {
    pub fn report(&self) -> ProgressReport {
        report(self.progress, self.kind.phase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub percent: u8,
    pub status: String,
}

/// Projects counters onto a percentage and a one-line status for the host.
pub fn report(progress: Progress, phase: Phase) -> ProgressReport {
    let percent = if progress.total == 0 {
        100
    } else {
        let completed = progress.completed.min(progress.total);
        (completed * 100 / progress.total) as u8
    };
    let counts = format!(
        "{}/{} batches, {} tokens",
        progress.completed, progress.total, progress.tokens
    );
    let status = match phase {
        Phase::Running => format!("Translating... {}% ({})", percent, counts),
        Phase::Paused => format!("Paused at {}% ({})", percent, counts),
        Phase::Stopped => format!("Stopped at {}% ({})", percent, counts),
        Phase::Finished => format!("Translation finished ({})", counts),
    };
    ProgressReport { percent, status }
}

/// Receives progress events from a running session.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver only means nobody is watching any more.
        let _ = self.send(event);
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        info!("{}", event.report().status);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) {}
}

impl<S: ProgressSink + ?Sized> ProgressSink for &S {
    fn emit(&self, event: ProgressEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(completed: usize, total: usize, tokens: u64) -> Progress {
        Progress {
            completed,
            total,
            tokens,
        }
    }

    #[test]
    fn percent_follows_completed_batches() {
        assert_eq!(report(progress(0, 3, 0), Phase::Running).percent, 0);
        assert_eq!(report(progress(1, 3, 10), Phase::Running).percent, 33);
        assert_eq!(report(progress(3, 3, 10), Phase::Finished).percent, 100);
        assert_eq!(report(progress(0, 0, 0), Phase::Finished).percent, 100);
    }

    #[test]
    fn status_names_the_phase() {
        let running = report(progress(2, 4, 120), Phase::Running);
        assert_eq!(running.status, "Translating... 50% (2/4 batches, 120 tokens)");
        let paused = report(progress(2, 4, 120), Phase::Paused);
        assert_eq!(paused.status, "Paused at 50% (2/4 batches, 120 tokens)");
        let stopped = report(progress(1, 4, 0), Phase::Stopped);
        assert!(stopped.status.starts_with("Stopped at 25%"));
    }

    #[tokio::test]
    async fn channel_sink_delivers_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let event = ProgressEvent {
            kind: EventKind::BatchCompleted,
            progress: progress(1, 2, 5),
        };
        tx.emit(event);
        drop(tx);
        assert_eq!(rx.recv().await, Some(event));
        assert_eq!(rx.recv().await, None);
    }
}
