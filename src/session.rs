use anyhow::{Result, anyhow};
use std::cell::Cell;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::progress::Progress;

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const MAX_CONCURRENCY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlState {
    pub paused: bool,
    pub stopped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(ControlCommand::Pause),
            "resume" => Ok(ControlCommand::Resume),
            "stop" => Ok(ControlCommand::Stop),
            other => Err(anyhow!(
                "unknown control command '{}' (expected pause, resume or stop)",
                other
            )),
        }
    }
}

/// Pause/stop switch shared between the host and the workers of a session.
/// Cloning is cheap and the handle can be moved to other threads.
#[derive(Debug, Clone)]
pub struct SessionControl {
    sender: Arc<watch::Sender<ControlState>>,
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionControl {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ControlState::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn state(&self) -> ControlState {
        *self.sender.borrow()
    }

    /// Returns `true` when the command changed the state.
    pub fn apply(&self, command: ControlCommand) -> bool {
        self.sender.send_if_modified(|state| match command {
            ControlCommand::Pause if !state.stopped && !state.paused => {
                state.paused = true;
                true
            }
            ControlCommand::Resume if !state.stopped && state.paused => {
                state.paused = false;
                true
            }
            ControlCommand::Stop if !state.stopped => {
                state.stopped = true;
                true
            }
            _ => false,
        })
    }

    pub fn pause(&self) -> bool {
        self.apply(ControlCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.apply(ControlCommand::Resume)
    }

    pub fn stop(&self) -> bool {
        self.apply(ControlCommand::Stop)
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlState> {
        self.sender.subscribe()
    }
}

/// Parameters of one translation run.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub target_language: String,
    pub service: String,
    /// Passed along with every batch, usually the document title.
    pub context: String,
    pub concurrency: usize,
    pub batch_size: usize,
    pub show_indicator: bool,
    pub hover: bool,
}

impl SessionRequest {
    pub fn new(target_language: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
            service: service.into(),
            context: String::new(),
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: crate::batch::DEFAULT_BATCH_SIZE,
            show_indicator: true,
            hover: true,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// Counters of a running session. Workers share it by reference on a single
/// task, so plain cells are enough.
#[derive(Debug)]
pub struct Session {
    pub(crate) target_language: String,
    pub(crate) service: String,
    pub(crate) context: String,
    pub(crate) control: SessionControl,
    total: usize,
    cursor: Cell<usize>,
    completed: Cell<usize>,
    failed: Cell<usize>,
    skipped: Cell<usize>,
    tokens: Cell<u64>,
}

impl Session {
    pub fn new(request: &SessionRequest, total: usize, control: SessionControl) -> Self {
        Self {
            target_language: request.target_language.clone(),
            service: request.service.clone(),
            context: request.context.clone(),
            control,
            total,
            cursor: Cell::new(0),
            completed: Cell::new(0),
            failed: Cell::new(0),
            skipped: Cell::new(0),
            tokens: Cell::new(0),
        }
    }

    /// Hands out the next unclaimed batch index.
    pub(crate) fn claim_next(&self) -> Option<usize> {
        let next = self.cursor.get();
        if next >= self.total {
            return None;
        }
        self.cursor.set(next + 1);
        Some(next)
    }

    pub(crate) fn record_completed(&self, tokens: u64) {
        if self.completed.get() < self.total {
            self.completed.set(self.completed.get() + 1);
        }
        self.tokens.set(self.tokens.get().saturating_add(tokens));
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.set(self.skipped.get() + 1);
        self.record_completed(0);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.set(self.failed.get() + 1);
    }

    pub fn claimed(&self) -> usize {
        self.cursor.get()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed.get(),
            total: self.total,
            tokens: self.tokens.get(),
        }
    }

    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            completed: self.completed.get(),
            total: self.total,
            failed: self.failed.get(),
            skipped: self.skipped.get(),
            tokens: self.tokens.get(),
            stopped: self.control.state().stopped,
        }
    }
}

/// Result of a finished run. Failed batches are only visible as a count;
/// their causes go to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tokens: u64,
    pub stopped: bool,
}
