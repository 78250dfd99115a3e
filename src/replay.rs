// Copyright 2025 Cowboy AI, LLC.

//! Rebuilding aggregate state by folding an ordered event log
//!
//! Replay is a pure fold: the same log and initial state always give the same
//! result. A replay may stop between events; [`Replay::resume`] continues after
//! the last fully applied event and refuses to continue if the log's prefix has
//! changed underneath it (for example after a foreign event was reinserted).

use crate::events::Event;
use crate::identifiers::EventId;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// State rebuilt from events
pub trait Aggregate: Clone {
    /// Return the state after applying `event`; must not depend on anything
    /// but `self` and `event`
    fn apply(&self, event: &Event) -> Self;
}

/// Fold `events` in order starting from `initial`
pub fn replay<A: Aggregate>(initial: A, events: &[Event]) -> A {
    events.iter().fold(initial, |state, event| state.apply(event))
}

/// Errors that can occur when resuming a replay
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    /// The log no longer starts with the events already applied
    #[error("Replay diverged at position {position}: expected event {expected}, found {}", found_label(.found))]
    Diverged {
        /// Index of the last applied event
        position: usize,
        /// Event applied at that index
        expected: EventId,
        /// Event now found at that index
        found: Option<EventId>,
    },
}

fn found_label(found: &Option<EventId>) -> String {
    found.map_or_else(|| "end of log".to_string(), |id| id.to_string())
}

/// Statistics collected during a replay run
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayStats {
    /// Events applied in this run
    pub events_processed: u64,
    /// Events applied since the replay started
    pub total_applied: u64,
    /// Whether the end of the log was reached
    pub completed: bool,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
    /// Average events applied per second
    pub events_per_second: f64,
}

/// Resumable fold over an event log
#[derive(Debug, Clone)]
pub struct Replay<A> {
    state: A,
    applied: usize,
    last_event_id: Option<EventId>,
}

impl<A: Aggregate> Replay<A> {
    /// Start a replay from an initial state
    pub fn new(initial: A) -> Self {
        Self {
            state: initial,
            applied: 0,
            last_event_id: None,
        }
    }

    /// Current state
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Finish and take the state
    pub fn into_state(self) -> A {
        self.state
    }

    /// Number of events applied so far
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Id of the last applied event
    pub fn last_event_id(&self) -> Option<EventId> {
        self.last_event_id
    }

    /// Apply up to `max_events` further events (all remaining when `None`)
    pub fn run(&mut self, events: &[Event], max_events: Option<usize>) -> ReplayStats {
        let start = Instant::now();
        let remaining = events.len().saturating_sub(self.applied);
        let budget = max_events.map_or(remaining, |m| m.min(remaining));

        for event in events.iter().skip(self.applied).take(budget) {
            // State and cursor move together, so an interruption between
            // events always leaves a consistent checkpoint.
            self.state = self.state.apply(event);
            self.applied += 1;
            self.last_event_id = Some(event.event_id());
        }

        let elapsed = start.elapsed();
        let stats = ReplayStats {
            events_processed: budget as u64,
            total_applied: self.applied as u64,
            completed: self.applied >= events.len(),
            duration_ms: elapsed.as_millis() as u64,
            events_per_second: if elapsed.as_secs_f64() > 0.0 {
                budget as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
        };

        debug!(
            processed = stats.events_processed,
            total = stats.total_applied,
            completed = stats.completed,
            "Replay run finished"
        );
        stats
    }

    /// Continue after the last applied event.
    ///
    /// Fails if `events` no longer has the last applied event at the same
    /// position; callers then start over from the initial state.
    pub fn resume(&mut self, events: &[Event]) -> Result<ReplayStats, ReplayError> {
        if let Some(expected) = self.last_event_id {
            let position = self.applied - 1;
            let found = events.get(position).map(Event::event_id);
            if found != Some(expected) {
                info!(
                    position,
                    expected = %expected,
                    "Log changed under replay; restart required"
                );
                return Err(ReplayError::Diverged {
                    position,
                    expected,
                    found,
                });
            }
        }
        Ok(self.run(events, None))
    }
}
