// Copyright 2025 Cowboy AI, LLC.

//! # Budget Events
//!
//! Event-sourcing core for a budgeting application that syncs between
//! devices without a central server.
//!
//! Every change is recorded as an immutable [`Event`] stamped with a
//! [`VectorClock`]. Devices exchange encoded events, merge foreign clocks into
//! their own, and keep each aggregate's log in a deterministic causal order so
//! that replay gives the same state everywhere.
//!
//! - **Vector clocks**: [`VectorClock`] and the per-device [`DeviceClock`]
//! - **Events**: [`Event`], [`EventMetadata`] and the [`EventPayload`] union
//! - **Ordering**: [`causal_cmp`] and [`causal_order`]
//! - **Codec**: [`EventSerializer`] with a registry of known event types
//! - **Logs and replay**: [`EventLog`], [`Aggregate`], [`Replay`]
//! - **Sync**: [`Device`] over any [`EventStore`]
//!
//! ## Example
//!
//! ```rust
//! use budget_events::{Event, EventSerializer, VectorClock, AccountCreated};
//!
//! let event = Event::create(
//!     "account-1",
//!     "dev-A",
//!     VectorClock::from_entries([("dev-A", 1)]),
//!     AccountCreated::new("Checking"),
//! )?;
//!
//! let serializer = EventSerializer::new();
//! let bytes = serializer.encode(&event)?;
//! assert_eq!(serializer.decode(&bytes)?, event);
//! # Ok::<(), budget_events::EventError>(())
//! ```

#![warn(missing_docs)]

mod account;
mod config;
mod device_clock;
mod errors;
mod event_log;
mod events;
mod identifiers;
mod ordering;
mod replay;
mod serializer;
mod vector_clock;
pub mod infrastructure;

pub use account::{Account, AccountStatus};
pub use config::{CompatibilityMode, SerializerConfig, SyncConfig};
pub use device_clock::DeviceClock;
pub use errors::{EventError, EventResult};
pub use event_log::{EventLog, EventLogBatch, InsertOutcome};
pub use events::{
    AccountClosed, AccountCreated, AccountNameChanged, DomainEvent, Event, EventMetadata,
    EventPayload,
};
pub use identifiers::{AggregateId, DeviceId, EventId};
pub use infrastructure::{
    load_event_log, AuthoredEvent, Device, EventStore, InMemoryEventStore, IngestFailure,
    IngestOutcome, SchemaEvolution, SimpleUpcaster, SyncReport, Upcaster,
};
pub use ordering::{causal_cmp, causal_order, tie_break};
pub use replay::{replay, Aggregate, Replay, ReplayError, ReplayStats};
pub use serializer::{lookup_schema, registered_schemas, EventEnvelope, EventSchema, EventSerializer};
pub use vector_clock::{ClockOrdering, VectorClock};
