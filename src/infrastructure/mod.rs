// Copyright 2025 Cowboy AI, LLC.

//! Infrastructure layer
//!
//! This module contains the pieces that touch storage and peers:
//! - Event store trait and in-memory implementation
//! - Payload schema evolution (upcasters)
//! - Device sync glue for authoring and ingesting events

pub mod event_store;
/// Event versioning and schema evolution support
pub mod event_versioning;
pub mod sync;

pub use event_store::{load_event_log, EventStore, InMemoryEventStore};
pub use event_versioning::{SchemaEvolution, SimpleUpcaster, Upcaster};
pub use sync::{AuthoredEvent, Device, IngestFailure, IngestOutcome, SyncReport};
