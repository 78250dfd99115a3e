// Copyright 2025 Cowboy AI, LLC.

//! Event store interface and an in-memory implementation
//!
//! Persistence mechanics live outside this crate. The store only has to keep
//! one ordered log per aggregate and let sync replace it wholesale when a
//! foreign event is reinserted at its causal position.

use crate::errors::{EventError, EventResult};
use crate::event_log::EventLog;
use crate::events::Event;
use crate::identifiers::AggregateId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage for per-aggregate event logs
#[async_trait]
pub trait EventStore: Send + Sync + fmt::Debug {
    /// Append a locally authored event to the aggregate's log
    async fn append(&self, aggregate_id: &AggregateId, event: Event) -> EventResult<()>;

    /// Load the aggregate's log in stored order (empty if unknown)
    async fn load_log(&self, aggregate_id: &AggregateId) -> EventResult<Vec<Event>>;

    /// Replace the aggregate's log with a reordered sequence
    async fn replace_log(&self, aggregate_id: &AggregateId, events: Vec<Event>)
        -> EventResult<()>;
}

/// In-memory event store for tests and single-process use
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    logs: Arc<RwLock<HashMap<AggregateId, Vec<Event>>>>,
}

impl InMemoryEventStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregates with at least one event
    pub async fn aggregate_count(&self) -> usize {
        self.logs.read().await.len()
    }
}

fn ensure_aggregate(aggregate_id: &AggregateId, event: &Event) -> EventResult<()> {
    if event.aggregate_id() != aggregate_id {
        return Err(EventError::invalid_argument(
            "aggregate_id",
            format!(
                "event {} belongs to {}, not {}",
                event.event_id(),
                event.aggregate_id(),
                aggregate_id
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, aggregate_id: &AggregateId, event: Event) -> EventResult<()> {
        ensure_aggregate(aggregate_id, &event)?;

        let mut logs = self.logs.write().await;
        let log = logs.entry(aggregate_id.clone()).or_default();
        if let Some(existing) = log.iter().find(|e| e.is_same_event(&event)) {
            if existing == &event {
                return Ok(());
            }
            return Err(EventError::invalid_argument(
                "event_id",
                format!("event id {} reused with different content", event.event_id()),
            ));
        }

        debug!(
            aggregate_id = %aggregate_id,
            event_id = %event.event_id(),
            sequence = log.len(),
            "Appended event"
        );
        log.push(event);
        Ok(())
    }

    async fn load_log(&self, aggregate_id: &AggregateId) -> EventResult<Vec<Event>> {
        let logs = self.logs.read().await;
        Ok(logs.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn replace_log(
        &self,
        aggregate_id: &AggregateId,
        events: Vec<Event>,
    ) -> EventResult<()> {
        for event in &events {
            ensure_aggregate(aggregate_id, event)?;
        }

        let mut logs = self.logs.write().await;
        debug!(
            aggregate_id = %aggregate_id,
            len = events.len(),
            "Replaced log"
        );
        logs.insert(aggregate_id.clone(), events);
        Ok(())
    }
}

/// Load an aggregate's log as a causally ordered [`EventLog`]
pub async fn load_event_log(
    store: &dyn EventStore,
    aggregate_id: &AggregateId,
) -> EventResult<EventLog> {
    let events = store.load_log(aggregate_id).await?;
    EventLog::from_events(aggregate_id.clone(), events)
}
