// Copyright 2025 Cowboy AI, LLC.

//! Per-aggregate event log kept in causal order

use crate::errors::{EventError, EventResult};
use crate::events::Event;
use crate::identifiers::{AggregateId, EventId};
use crate::ordering::causal_order;
use crate::replay::{replay, Aggregate};
use crate::vector_clock::VectorClock;
use std::collections::HashMap;
use tracing::debug;

/// What happened when an event was offered to a log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The event was new and now sits at `position`
    Inserted {
        /// Index of the event after re-ordering
        position: usize,
    },
    /// An identical event was already present
    Duplicate,
}

/// Ordered, append-only (in the logical sense) history of one aggregate.
///
/// Events are never modified once inserted. A late-arriving foreign event may
/// land before events already present, which is why the whole log is handed
/// back to the store via `replace_log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    aggregate_id: AggregateId,
    events: Vec<Event>,
    // event id -> position in `events`
    index: HashMap<EventId, usize>,
    // merge of every clock in the log
    frontier: VectorClock,
}

impl EventLog {
    /// Create an empty log
    pub fn new(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            events: Vec::new(),
            index: HashMap::new(),
            frontier: VectorClock::new(),
        }
    }

    /// Build a log from events in any order
    pub fn from_events(
        aggregate_id: AggregateId,
        events: impl IntoIterator<Item = Event>,
    ) -> EventResult<Self> {
        let mut batch = Self::new(aggregate_id).into_batch();
        for event in events {
            batch.stage(event)?;
        }
        Ok(batch.finish())
    }

    fn check(&self, event: &Event) -> EventResult<bool> {
        if event.aggregate_id() != &self.aggregate_id {
            return Err(EventError::invalid_argument(
                "aggregate_id",
                format!(
                    "event {} targets {} but the log belongs to {}",
                    event.event_id(),
                    event.aggregate_id(),
                    self.aggregate_id
                ),
            ));
        }
        match self.get(event.event_id()) {
            Some(existing) if existing != event => Err(EventError::invalid_argument(
                "event_id",
                format!(
                    "event id {} reused with different content in aggregate {}",
                    event.event_id(),
                    self.aggregate_id
                ),
            )),
            Some(_) => Ok(false),
            None => Ok(true),
        }
    }

    fn push(&mut self, event: Event) {
        self.frontier = self.frontier.merge(event.vector_clock());
        self.index.insert(event.event_id(), self.events.len());
        self.events.push(event);
    }

    fn reorder(&mut self) {
        self.events = causal_order(std::mem::take(&mut self.events));
        self.index = self
            .events
            .iter()
            .enumerate()
            .map(|(position, e)| (e.event_id(), position))
            .collect();
    }

    /// Insert an event at its causal position.
    ///
    /// Re-delivery of an identical event is a no-op. A different event that
    /// reuses an existing id, or an event for another aggregate, is rejected
    /// and the log is left unchanged.
    pub fn insert(&mut self, event: Event) -> EventResult<InsertOutcome> {
        if !self.check(&event)? {
            debug!(event_id = %event.event_id(), "Skipping duplicate event");
            return Ok(InsertOutcome::Duplicate);
        }

        let event_id = event.event_id();
        // An event that has seen everything in the log goes last.
        let appends = event.vector_clock().dominates(&self.frontier);
        self.push(event);
        if !appends {
            self.reorder();
        }

        let position = self.index.get(&event_id).copied().unwrap_or(self.events.len() - 1);

        debug!(
            aggregate_id = %self.aggregate_id,
            event_id = %event_id,
            position,
            len = self.events.len(),
            "Inserted event"
        );
        Ok(InsertOutcome::Inserted { position })
    }

    /// Start inserting many events with a single re-order at the end
    pub fn into_batch(self) -> EventLogBatch {
        EventLogBatch {
            log: self,
            unordered: false,
            staged: 0,
        }
    }

    /// Aggregate this log belongs to
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    /// Events in causal order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the ordered events
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Find an event by id
    pub fn get(&self, event_id: EventId) -> Option<&Event> {
        self.index.get(&event_id).map(|&position| &self.events[position])
    }

    /// True if an event with this id is present
    pub fn contains(&self, event_id: EventId) -> bool {
        self.index.contains_key(&event_id)
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the log holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Merge of every clock in the log
    pub fn frontier(&self) -> &VectorClock {
        &self.frontier
    }

    /// Fold the log from `initial`
    pub fn replay<A: Aggregate>(&self, initial: A) -> A {
        replay(initial, &self.events)
    }
}

/// Several insertions into one [`EventLog`] sharing a single re-order.
///
/// Each staged event is checked against the log and the events staged before
/// it. Events that have seen everything already staged keep the log in order;
/// anything else defers one re-order to [`EventLogBatch::finish`].
#[derive(Debug)]
pub struct EventLogBatch {
    log: EventLog,
    unordered: bool,
    staged: usize,
}

impl EventLogBatch {
    /// Stage an event; `Ok(false)` if it was already present
    pub fn stage(&mut self, event: Event) -> EventResult<bool> {
        if !self.log.check(&event)? {
            return Ok(false);
        }
        if !event.vector_clock().dominates(&self.log.frontier) {
            self.unordered = true;
        }
        self.log.push(event);
        self.staged += 1;
        Ok(true)
    }

    /// Aggregate the batch targets
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.log.aggregate_id
    }

    /// Number of new events staged so far
    pub fn staged(&self) -> usize {
        self.staged
    }

    /// Restore causal order and hand back the log
    pub fn finish(mut self) -> EventLog {
        if self.unordered {
            self.log.reorder();
            debug!(
                aggregate_id = %self.log.aggregate_id,
                len = self.log.events.len(),
                staged = self.staged,
                "Re-ordered log after batch"
            );
        }
        self.log
    }
}
