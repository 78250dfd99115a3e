// Copyright 2025 Cowboy AI, LLC.

//! Device-side sync: authoring local events and ingesting foreign ones
//!
//! Transport is someone else's job; a [`Device`] hands out encoded bytes for
//! every event it authors and accepts encoded bytes from its peers. A foreign
//! event is decoded, merged into the device clock, and inserted into its
//! aggregate's log at the causal position, after which the store's copy of
//! the log is replaced.

use crate::config::SyncConfig;
use crate::device_clock::DeviceClock;
use crate::errors::{EventError, EventResult};
use crate::event_log::{EventLogBatch, InsertOutcome};
use crate::events::{Event, EventPayload};
use crate::identifiers::{AggregateId, DeviceId, EventId};
use crate::infrastructure::event_store::{load_event_log, EventStore};
use crate::infrastructure::event_versioning::Upcaster;
use crate::replay::Aggregate;
use crate::serializer::EventSerializer;
use crate::vector_clock::VectorClock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// An event authored on this device together with its wire form
#[derive(Debug, Clone)]
pub struct AuthoredEvent {
    /// The stamped event
    pub event: Event,
    /// Encoded envelope, ready for transport
    pub bytes: Vec<u8>,
}

/// Result of ingesting one foreign event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// The event that was ingested
    pub event_id: EventId,
    /// Aggregate whose log received it
    pub aggregate_id: AggregateId,
    /// Whether it was new or already known
    pub outcome: InsertOutcome,
}

/// A buffer that could not be ingested
#[derive(Debug)]
pub struct IngestFailure {
    /// Position of the buffer in the batch; for a failed write-back, the
    /// first buffer that touched the aggregate
    pub index: usize,
    /// Why it was rejected
    pub error: EventError,
}

/// Summary of a batch ingestion
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Events inserted into a log
    pub applied: usize,
    /// Events already present
    pub duplicates: usize,
    /// Buffers that failed, with their batch index
    pub failures: Vec<IngestFailure>,
    /// Set when the batch stopped early because of `halt_on_error`
    pub halted: bool,
}

impl SyncReport {
    /// True if every buffer was ingested
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One device participating in sync
#[derive(Debug)]
pub struct Device {
    clock: DeviceClock,
    store: Arc<dyn EventStore>,
    serializer: EventSerializer,
    config: SyncConfig,
    // Serialises read-modify-write of logs between authoring and ingestion.
    writer: Mutex<()>,
}

impl Device {
    /// Start a device with an empty clock
    pub fn new(device_id: DeviceId, store: Arc<dyn EventStore>, config: SyncConfig) -> Self {
        Self::resume(device_id, VectorClock::new(), store, config)
    }

    /// Restore a device with a persisted clock
    pub fn resume(
        device_id: DeviceId,
        clock: VectorClock,
        store: Arc<dyn EventStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            clock: DeviceClock::resume(device_id, clock),
            store,
            serializer: EventSerializer::with_config(config.serializer.clone()),
            config,
            writer: Mutex::new(()),
        }
    }

    /// This device's identifier
    pub fn device_id(&self) -> &DeviceId {
        self.clock.device_id()
    }

    /// Snapshot of the device clock
    pub fn clock(&self) -> VectorClock {
        self.clock.current()
    }

    /// Codec used by this device
    pub fn serializer(&self) -> &EventSerializer {
        &self.serializer
    }

    /// Register an upcaster for older payload versions received from peers
    pub fn register_upcaster(&mut self, event_type: impl Into<String>, upcaster: Box<dyn Upcaster>) {
        self.serializer.register_upcaster(event_type, upcaster);
    }

    /// Author an event, append it locally, and encode it for peers
    pub async fn author(
        &self,
        aggregate_id: &AggregateId,
        payload: impl Into<EventPayload>,
    ) -> EventResult<AuthoredEvent> {
        let payload = payload.into();
        let _writer = self.writer.lock().await;

        let event = self.clock.author(|clock| {
            Event::new(aggregate_id.clone(), self.device_id().clone(), clock, payload)
        })?;
        let bytes = self.serializer.encode(&event)?;
        self.store.append(aggregate_id, event.clone()).await?;

        debug!(
            device_id = %self.device_id(),
            aggregate_id = %aggregate_id,
            event_id = %event.event_id(),
            event_type = event.event_type(),
            "Authored event"
        );
        Ok(AuthoredEvent { event, bytes })
    }

    /// Ingest one encoded foreign event
    pub async fn ingest(&self, bytes: &[u8]) -> EventResult<IngestOutcome> {
        let event = self.serializer.decode(bytes)?;
        self.ingest_event(event).await
    }

    /// Ingest an already decoded foreign event
    pub async fn ingest_event(&self, event: Event) -> EventResult<IngestOutcome> {
        let aggregate_id = event.aggregate_id().clone();
        let event_id = event.event_id();
        let foreign_clock = event.vector_clock().clone();

        let _writer = self.writer.lock().await;

        let mut log = load_event_log(self.store.as_ref(), &aggregate_id).await?;
        let outcome = log.insert(event)?;

        if let InsertOutcome::Inserted { .. } = outcome {
            self.store
                .replace_log(&aggregate_id, log.into_events())
                .await?;
        }
        self.clock.observe(&foreign_clock);

        debug!(
            device_id = %self.device_id(),
            aggregate_id = %aggregate_id,
            event_id = %event_id,
            outcome = ?outcome,
            "Ingested event"
        );
        Ok(IngestOutcome {
            event_id,
            aggregate_id,
            outcome,
        })
    }

    /// Ingest a batch of encoded events.
    ///
    /// A bad buffer is recorded and skipped so one corrupt event does not
    /// abort the session, unless `halt_on_error` is configured. Each touched
    /// aggregate is loaded once, re-ordered once and written back once.
    pub async fn ingest_batch<B: AsRef<[u8]>>(&self, batch: &[B]) -> SyncReport {
        let mut report = SyncReport::default();
        let _writer = self.writer.lock().await;
        // aggregate -> (first batch index touching it, staged log)
        let mut pending: HashMap<AggregateId, (usize, EventLogBatch)> = HashMap::new();

        for (index, bytes) in batch.iter().enumerate() {
            match self.stage(&mut pending, index, bytes.as_ref()).await {
                Ok(true) => report.applied += 1,
                Ok(false) => report.duplicates += 1,
                Err(error) => {
                    warn!(
                        device_id = %self.device_id(),
                        index,
                        error = %error,
                        "Failed to ingest event"
                    );
                    report.failures.push(IngestFailure { index, error });
                    if self.config.halt_on_error {
                        report.halted = true;
                        break;
                    }
                }
            }
        }

        for (aggregate_id, (first_index, staged)) in pending {
            if staged.staged() == 0 {
                continue;
            }
            let count = staged.staged();
            let log = staged.finish();
            if let Err(error) = self.store.replace_log(&aggregate_id, log.into_events()).await {
                warn!(
                    device_id = %self.device_id(),
                    aggregate_id = %aggregate_id,
                    error = %error,
                    "Failed to write back ingested events"
                );
                report.applied -= count;
                report.failures.push(IngestFailure {
                    index: first_index,
                    error,
                });
            }
        }

        info!(
            device_id = %self.device_id(),
            applied = report.applied,
            duplicates = report.duplicates,
            failures = report.failures.len(),
            halted = report.halted,
            "Sync batch ingested"
        );
        report
    }

    async fn stage(
        &self,
        pending: &mut HashMap<AggregateId, (usize, EventLogBatch)>,
        index: usize,
        bytes: &[u8],
    ) -> EventResult<bool> {
        let event = self.serializer.decode(bytes)?;
        let aggregate_id = event.aggregate_id().clone();
        let foreign_clock = event.vector_clock().clone();

        let (_, staged) = match pending.entry(aggregate_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let log = load_event_log(self.store.as_ref(), entry.key()).await?;
                entry.insert((index, log.into_batch()))
            }
        };
        let inserted = staged.stage(event)?;
        self.clock.observe(&foreign_clock);
        Ok(inserted)
    }

    /// Rebuild an aggregate by replaying its stored log
    pub async fn rebuild<A: Aggregate>(&self, aggregate_id: &AggregateId, initial: A) -> EventResult<A> {
        let log = load_event_log(self.store.as_ref(), aggregate_id).await?;
        Ok(log.replay(initial))
    }

    /// Encoded form of every event in an aggregate's log, for sending to a peer
    pub async fn export(&self, aggregate_id: &AggregateId) -> EventResult<Vec<Vec<u8>>> {
        let log = self.store.load_log(aggregate_id).await?;
        log.iter().map(|event| self.serializer.encode(event)).collect()
    }
}
