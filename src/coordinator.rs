//! Drives a translation session: a bounded set of workers pulls batches from a
//! shared cursor, asks the translator for each one and commits the results
//! through the state store.
//!
//! Workers are plain futures joined on the calling task, so the document and
//! the counters are shared by reference without locking. Pause and stop go
//! through [`SessionControl`], which may be driven from any thread.

use anyhow::Result;
use futures_util::future::join_all;
use std::cell::{Cell, RefCell};
use std::pin::pin;
use tracing::{debug, info, warn};

use crate::batch::{Batch, group_units};
use crate::document::Document;
use crate::error::{PageError, PageResult, StateError};
use crate::hover::GroupId;
use crate::locator::{Scope, TextUnit, UnitId, locate};
use crate::progress::{EventKind, ProgressEvent, ProgressSink};
use crate::services::Translate;
use crate::services::response::reconcile;
use crate::session::{ControlState, Session, SessionControl, SessionOutcome, SessionRequest};
use crate::state::{ApplyOptions, NodeStateStore, RevertSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Translated { tokens: u64, applied: usize },
    Skipped,
}

/// A document together with everything needed to translate and restore it.
#[derive(Debug)]
pub struct PageTranslator {
    document: Document,
    store: RefCell<NodeStateStore>,
    active: Cell<bool>,
    control: RefCell<Option<SessionControl>>,
}

impl PageTranslator {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            store: RefCell::new(NodeStateStore::new()),
            active: Cell::new(false),
            control: RefCell::new(None),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Units under `scope`. A text node keeps the same [`UnitId`] on every
    /// scan until the page is reverted.
    pub fn locate(&self, scope: &Scope) -> Vec<TextUnit> {
        let units = locate(&self.document, scope);
        self.store.borrow_mut().identify(units)
    }

    pub fn is_translating(&self) -> bool {
        self.active.get()
    }

    /// Control handle of the running session, if any.
    pub fn control(&self) -> Option<SessionControl> {
        self.control.borrow().clone()
    }

    /// Translates every unit under `scope`. Fails immediately when another
    /// session is running on this translator or when there is nothing to
    /// translate. Batch failures are logged and counted, not returned.
    pub async fn translate<T, S>(
        &self,
        request: &SessionRequest,
        scope: &Scope,
        translator: &T,
        control: SessionControl,
        sink: &S,
    ) -> PageResult<SessionOutcome>
    where
        T: Translate + ?Sized,
        S: ProgressSink + ?Sized,
    {
        if self.active.get() {
            return Err(StateError::AlreadyInProgress.into());
        }
        let _guard = ActiveGuard::enter(self, control.clone());

        let units = self.locate(scope);
        if units.is_empty() {
            return Err(PageError::EmptyInput);
        }
        let unit_count = units.len();
        let batches = group_units(units, request.batch_size);
        let session = Session::new(request, batches.len(), control);
        let workers = request.concurrency_limit().min(batches.len());
        let options = ApplyOptions {
            indicator: request.show_indicator,
            hover: request.hover,
        };
        info!(
            "translating {} text units in {} batches to {} via {} ({} workers)",
            unit_count,
            batches.len(),
            session.target_language,
            session.service,
            workers
        );

        let pool = join_all((0..workers).map(|worker| {
            self.run_worker(worker, &session, &batches, translator, sink, options)
        }));
        watch_session(pool, &session, sink).await;

        self.store.borrow_mut().mark_completed();
        let outcome = session.outcome();
        sink.emit(ProgressEvent {
            kind: EventKind::Finished,
            progress: session.progress(),
        });
        info!(
            "session finished: {}/{} batches, {} failed, {} skipped, {} tokens{}",
            outcome.completed,
            outcome.total,
            outcome.failed,
            outcome.skipped,
            outcome.tokens,
            if outcome.stopped { " (stopped)" } else { "" }
        );
        Ok(outcome)
    }

    /// Restores the document to its state before the last completed session.
    pub fn revert(&self) -> PageResult<RevertSummary> {
        if self.active.get() {
            return Err(StateError::AlreadyInProgress.into());
        }
        let summary = self.store.borrow_mut().revert()?;
        info!(
            "reverted {} text units, removed {} hover listeners",
            summary.restored, summary.listeners_removed
        );
        Ok(summary)
    }

    pub fn hover_group_of(&self, unit: UnitId) -> Option<GroupId> {
        self.store.borrow().hover_group_of(unit)
    }

    pub fn hover_enter(&self, group: GroupId) {
        self.store.borrow().on_enter(group);
    }

    pub fn hover_leave(&self, group: GroupId) {
        self.store.borrow().on_leave(group);
    }

    pub fn translated_units(&self) -> usize {
        self.store.borrow().len()
    }

    async fn run_worker<T, S>(
        &self,
        worker: usize,
        session: &Session,
        batches: &[Batch],
        translator: &T,
        sink: &S,
        options: ApplyOptions,
    ) where
        T: Translate + ?Sized,
        S: ProgressSink + ?Sized,
    {
        let mut control = session.control.subscribe();
        loop {
            let state = match control.wait_for(|state| state.stopped || !state.paused).await {
                Ok(state) => *state,
                Err(_) => break,
            };
            if state.stopped {
                debug!("worker {} observed stop", worker);
                break;
            }
            let Some(index) = session.claim_next() else {
                break;
            };
            let batch = &batches[index];
            debug!(
                "worker {} claimed batch {} ({} units)",
                worker,
                batch.index,
                batch.len()
            );

            match self.process_batch(session, batch, translator, options).await {
                Ok(BatchOutcome::Translated { tokens, applied }) => {
                    debug!(
                        "batch {} applied {} translations ({} tokens)",
                        batch.index, applied, tokens
                    );
                    session.record_completed(tokens);
                }
                Ok(BatchOutcome::Skipped) => {
                    debug!("batch {} has no text, skipped", batch.index);
                    session.record_skipped();
                }
                Err(err) => {
                    warn!("{:#}", PageError::service(batch.index, err));
                    session.record_failed();
                    continue;
                }
            }
            sink.emit(ProgressEvent {
                kind: EventKind::BatchCompleted,
                progress: session.progress(),
            });
        }
    }

    async fn process_batch<T>(
        &self,
        session: &Session,
        batch: &Batch,
        translator: &T,
        options: ApplyOptions,
    ) -> Result<BatchOutcome>
    where
        T: Translate + ?Sized,
    {
        let pending: Vec<(&TextUnit, String)> = batch
            .units
            .iter()
            .map(|unit| (unit, unit.text()))
            .filter(|(_, text)| !text.trim().is_empty())
            .collect();
        if pending.is_empty() {
            return Ok(BatchOutcome::Skipped);
        }
        let texts: Vec<String> = pending
            .iter()
            .map(|(_, text)| text.trim().to_string())
            .collect();

        let result = translator
            .translate(&texts, &session.target_language, &session.context)
            .await?;
        let translations = reconcile(result.translations, texts.len());

        let mut store = self.store.borrow_mut();
        let mut applied = 0usize;
        for (((unit, current), original), translated) in
            pending.iter().zip(&texts).zip(&translations)
        {
            let translated = translated.trim();
            if translated.is_empty() || translated == original.as_str() {
                continue;
            }
            store.apply(unit, &preserve_whitespace(current, translated), options);
            applied += 1;
        }
        Ok(BatchOutcome::Translated {
            tokens: result.tokens,
            applied,
        })
    }
}

/// Polls the worker pool to completion while reporting pause, resume and
/// stop transitions as they happen.
async fn watch_session<F, S>(pool: F, session: &Session, sink: &S)
where
    F: std::future::Future,
    S: ProgressSink + ?Sized,
{
    let mut pool = pin!(pool);
    let mut changes = session.control.subscribe();
    let mut last = *changes.borrow_and_update();
    loop {
        tokio::select! {
            _ = &mut pool => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    pool.await;
                    break;
                }
                let state = *changes.borrow_and_update();
                if let Some(kind) = transition(last, state) {
                    sink.emit(ProgressEvent {
                        kind,
                        progress: session.progress(),
                    });
                }
                last = state;
            }
        }
    }
}

/// Marks the translator busy for the lifetime of a session.
struct ActiveGuard<'a> {
    translator: &'a PageTranslator,
}

impl<'a> ActiveGuard<'a> {
    fn enter(translator: &'a PageTranslator, control: SessionControl) -> Self {
        translator.active.set(true);
        *translator.control.borrow_mut() = Some(control);
        Self { translator }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.translator.active.set(false);
        self.translator.control.borrow_mut().take();
    }
}

fn transition(last: ControlState, next: ControlState) -> Option<EventKind> {
    if next.stopped {
        return (!last.stopped).then_some(EventKind::Stopped);
    }
    match (last.paused, next.paused) {
        (false, true) => Some(EventKind::Paused),
        (true, false) => Some(EventKind::Resumed),
        _ => None,
    }
}

/// Puts `translated` between the leading and trailing whitespace of
/// `original`.
fn preserve_whitespace(original: &str, translated: &str) -> String {
    let Some((start, end)) = split_text_bounds(original) else {
        return translated.to_string();
    };
    format!("{}{}{}", &original[..start], translated, &original[end..])
}

fn split_text_bounds(text: &str) -> Option<(usize, usize)> {
    let start = text.char_indices().find(|(_, ch)| !ch.is_whitespace())?.0;
    let (last, ch) = text.char_indices().rev().find(|(_, ch)| !ch.is_whitespace())?;
    let end = last + ch.len_utf8();
    (start < end).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_around_text_is_kept() {
        assert_eq!(preserve_whitespace("  Hello \n", "Hola"), "  Hola \n");
        assert_eq!(preserve_whitespace("Hello", "Hola"), "Hola");
        assert_eq!(preserve_whitespace("\u{a0}Hé", "Olá"), "\u{a0}Olá");
        assert_eq!(preserve_whitespace("   ", "x"), "x");
    }

    #[test]
    fn transitions_follow_control_changes() {
        let running = ControlState::default();
        let paused = ControlState {
            paused: true,
            stopped: false,
        };
        let stopped = ControlState {
            paused: false,
            stopped: true,
        };
        assert_eq!(transition(running, paused), Some(EventKind::Paused));
        assert_eq!(transition(paused, running), Some(EventKind::Resumed));
        assert_eq!(transition(paused, stopped), Some(EventKind::Stopped));
        assert_eq!(transition(stopped, stopped), None);
        assert_eq!(transition(running, running), None);
    }
}
