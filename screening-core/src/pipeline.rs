//! Screening pipeline
//!
//! Walks the roster in order, scores every entry against every alias in the
//! [`ReferenceIndex`], and expands each hit to all aliases of the implicated
//! entity. Results are reported through a [`ScreeningObserver`]:
//!
//! ```text
//! on_progress(0, n) [on_match] on_progress(1, n) [on_match] ... on_progress(n, n) on_complete(m, n)
//! ```
//!
//! `on_complete` is always the last call of a run. The roster is never
//! mutated here; owners merge the emitted [`ScreeningOutcome`]s themselves.

use crate::error::IngestError;
use crate::ingest::ReferenceIndex;
use crate::matcher::{NameMatcher, NameQuery};
use crate::types::{RosterEntry, RunState, ScreeningOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Receives the events of one screening run, in emission order
pub trait ScreeningObserver {
    /// Entry `current` of `total` is about to be screened; `(total, total)` once done
    fn on_progress(&mut self, current: usize, total: usize);

    /// `entry` matched at least one sanctioned entity
    fn on_match(&mut self, entry: &RosterEntry, outcome: &ScreeningOutcome);

    /// Terminal event: number of matched entries out of `total`
    fn on_complete(&mut self, matched: usize, total: usize);
}

/// Adapts three closures to [`ScreeningObserver`]
pub struct FnObserver<P, M, C> {
    on_progress: P,
    on_match: M,
    on_complete: C,
}

impl<P, M, C> FnObserver<P, M, C>
where
    P: FnMut(usize, usize),
    M: FnMut(&RosterEntry, &ScreeningOutcome),
    C: FnMut(usize, usize),
{
    pub fn new(on_progress: P, on_match: M, on_complete: C) -> Self {
        Self {
            on_progress,
            on_match,
            on_complete,
        }
    }
}

impl<P, M, C> std::fmt::Debug for FnObserver<P, M, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

impl<P, M, C> ScreeningObserver for FnObserver<P, M, C>
where
    P: FnMut(usize, usize),
    M: FnMut(&RosterEntry, &ScreeningOutcome),
    C: FnMut(usize, usize),
{
    fn on_progress(&mut self, current: usize, total: usize) {
        (self.on_progress)(current, total)
    }

    fn on_match(&mut self, entry: &RosterEntry, outcome: &ScreeningOutcome) {
        (self.on_match)(entry, outcome)
    }

    fn on_complete(&mut self, matched: usize, total: usize) {
        (self.on_complete)(matched, total)
    }
}

/// Observer events as delivered over a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScreeningEvent {
    Progress {
        current: usize,
        total: usize,
    },
    Match {
        entry: RosterEntry,
        outcome: ScreeningOutcome,
    },
    Completed {
        matched: usize,
        total: usize,
    },
}

/// Forwards observer calls into an unbounded channel.
///
/// A dropped receiver is not an error: the run keeps going and its summary is
/// still available from the join handle.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ScreeningEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ScreeningEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ScreeningEvent) {
        let _ = self.tx.send(event);
    }
}

impl ScreeningObserver for ChannelObserver {
    fn on_progress(&mut self, current: usize, total: usize) {
        self.send(ScreeningEvent::Progress { current, total });
    }

    fn on_match(&mut self, entry: &RosterEntry, outcome: &ScreeningOutcome) {
        self.send(ScreeningEvent::Match {
            entry: entry.clone(),
            outcome: outcome.clone(),
        });
    }

    fn on_complete(&mut self, matched: usize, total: usize) {
        self.send(ScreeningEvent::Completed { matched, total });
    }
}

/// What a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    /// Roster size
    pub total: usize,
    /// Entries screened before completion or cancellation
    pub processed: usize,
    pub matched: usize,
    /// Outcomes of matched entries, in roster order
    pub outcomes: Vec<ScreeningOutcome>,
    /// Why the run did not iterate, when the index was unavailable
    pub index_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Screens rosters against a reference index
#[derive(Debug, Clone, Default)]
pub struct ScreeningPipeline {
    matcher: NameMatcher,
}

impl ScreeningPipeline {
    pub fn new(matcher: NameMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &NameMatcher {
        &self.matcher
    }

    /// Screen one entry against every alias in the index.
    pub fn screen_entry(&self, position: usize, entry: &RosterEntry, index: &ReferenceIndex) -> ScreeningOutcome {
        let query = NameQuery::new(&entry.given_name, &entry.surname);
        let mut entities: BTreeSet<&str> = BTreeSet::new();
        let mut best_score = 0.0_f64;

        for indexed in index.indexed() {
            let decision = self.matcher.score_prepared(&query, &indexed.prepared);
            if decision.is_match {
                debug!(
                    "Roster entry {} matched entity {} (score {:.2})",
                    position, indexed.alias.entity_id, decision.combined
                );
                entities.insert(indexed.alias.entity_id.as_str());
                best_score = best_score.max(decision.combined);
            }
        }

        if entities.is_empty() {
            return ScreeningOutcome::clear(position);
        }

        // Name parts of one entity are often spread over several alias rows,
        // so every alias of a hit entity is reported.
        let matching_names = index
            .aliases()
            .filter(|alias| entities.contains(alias.entity_id.as_str()))
            .map(|alias| alias.whole_name.clone())
            .collect();

        ScreeningOutcome {
            position,
            matched: true,
            matching_names,
            entity_ids: entities.into_iter().map(str::to_string).collect(),
            best_score,
        }
    }

    /// Screen the whole roster sequentially.
    ///
    /// `cancel` is checked before each entry; a cancelled run skips the final
    /// progress event but still ends with `on_complete`.
    pub fn run<O>(
        &self,
        roster: &[RosterEntry],
        index: &ReferenceIndex,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> RunSummary
    where
        O: ScreeningObserver + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = roster.len();
        let mut outcomes = Vec::new();
        let mut processed = 0;
        let mut state = RunState::Completed;

        info!(
            "Screening run {}: {} roster entries against {} aliases",
            run_id,
            total,
            index.len()
        );

        for (position, entry) in roster.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Screening run {} cancelled after {} of {} entries", run_id, processed, total);
                state = RunState::Cancelled;
                break;
            }

            observer.on_progress(position, total);

            let outcome = self.screen_entry(position, entry, index);
            processed += 1;

            if outcome.matched {
                observer.on_match(entry, &outcome);
                outcomes.push(outcome);
            }
        }

        let matched = outcomes.len();
        if state == RunState::Completed {
            observer.on_progress(total, total);
        }
        observer.on_complete(matched, total);

        info!(
            "Screening run {} {:?}: {} matches in {} of {} entries",
            run_id, state, matched, processed, total
        );

        RunSummary {
            run_id,
            state,
            total,
            processed,
            matched,
            outcomes,
            index_error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Report a run that cannot start because the index failed to build.
    pub fn report_unavailable<O>(&self, observer: &mut O, reason: &IngestError) -> RunSummary
    where
        O: ScreeningObserver + ?Sized,
    {
        error!("Screening aborted, reference index unavailable: {}", reason);
        observer.on_complete(0, 0);

        let now = Utc::now();
        RunSummary {
            run_id: Uuid::new_v4(),
            state: RunState::Completed,
            total: 0,
            processed: 0,
            matched: 0,
            outcomes: Vec::new(),
            index_error: Some(reason.to_string()),
            started_at: now,
            finished_at: now,
        }
    }
}

/// Handle to a screening run executing in the background
#[derive(Debug)]
pub struct ScreeningHandle {
    events: mpsc::UnboundedReceiver<ScreeningEvent>,
    state: watch::Receiver<RunState>,
    cancel: CancellationToken,
    task: JoinHandle<RunSummary>,
}

impl ScreeningHandle {
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Wait for the next state transition
    pub async fn state_changed(&mut self) -> RunState {
        let _ = self.state.changed().await;
        *self.state.borrow()
    }

    /// Stop before the next roster entry
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the run has finished and all events were read
    pub async fn next_event(&mut self) -> Option<ScreeningEvent> {
        self.events.recv().await
    }

    /// Wait for the run to finish
    pub async fn join(self) -> crate::Result<RunSummary> {
        Ok(self.task.await?)
    }
}

/// Run a screening on the blocking pool.
///
/// An `Err` index is reported as `on_complete(0, 0)` without iterating.
pub fn spawn_screening(
    pipeline: Arc<ScreeningPipeline>,
    roster: Arc<[RosterEntry]>,
    index: Result<Arc<ReferenceIndex>, IngestError>,
    cancel: CancellationToken,
) -> ScreeningHandle {
    let (tx, events) = mpsc::unbounded_channel();
    let (state_tx, state) = watch::channel(RunState::Idle);
    let run_cancel = cancel.clone();

    let task = tokio::task::spawn_blocking(move || {
        let mut observer = ChannelObserver::new(tx);
        let _ = state_tx.send(RunState::Running);

        let summary = match index {
            Ok(index) => pipeline.run(&roster, &index, &mut observer, &run_cancel),
            Err(reason) => pipeline.report_unavailable(&mut observer, &reason),
        };

        let _ = state_tx.send(summary.state);
        summary
    });

    ScreeningHandle {
        events,
        state,
        cancel,
        task,
    }
}
