// Copyright 2025 Cowboy AI, LLC.

//! Domain events
//!
//! An [`Event`] is shared metadata ([`EventMetadata`]) plus one concrete
//! payload from the closed [`EventPayload`] union. Events are immutable once
//! built: there are no mutable accessors, and a log only ever supersedes an
//! event with later ones.

use crate::errors::{EventError, EventResult};
use crate::identifiers::{AggregateId, DeviceId, EventId};
use crate::vector_clock::VectorClock;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Implemented by every concrete event payload
///
/// # Examples
///
/// ```rust
/// use budget_events::{AccountCreated, DomainEvent};
///
/// let created = AccountCreated::new("Checking");
/// assert_eq!(created.event_type(), "AccountCreated");
/// assert_eq!(AccountCreated::FIELDS, &["name"]);
/// ```
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + fmt::Debug + Into<EventPayload>
{
    /// Discriminator written to the envelope
    const EVENT_TYPE: &'static str;

    /// Current payload schema version
    const SCHEMA_VERSION: u32 = 1;

    /// Payload field names known to this schema version
    const FIELDS: &'static [&'static str];

    /// Get the event type name
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    /// Get the schema version
    fn schema_version(&self) -> u32 {
        Self::SCHEMA_VERSION
    }
}

/// A new account was opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountCreated {
    /// Display name of the account
    pub name: String,
}

impl AccountCreated {
    /// Create the payload
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DomainEvent for AccountCreated {
    const EVENT_TYPE: &'static str = "AccountCreated";
    const FIELDS: &'static [&'static str] = &["name"];
}

/// An account was renamed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountNameChanged {
    /// New display name
    pub name: String,
}

impl AccountNameChanged {
    /// Create the payload
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DomainEvent for AccountNameChanged {
    const EVENT_TYPE: &'static str = "AccountNameChanged";
    const FIELDS: &'static [&'static str] = &["name"];
}

/// An account was closed; it carries no payload fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AccountClosed {}

impl AccountClosed {
    /// Create the payload
    pub fn new() -> Self {
        Self {}
    }
}

impl DomainEvent for AccountClosed {
    const EVENT_TYPE: &'static str = "AccountClosed";
    const FIELDS: &'static [&'static str] = &[];
}

/// Closed union of every concrete event payload.
///
/// Adding a variant means adding a case here and an entry in the serializer
/// registry; the exhaustive matches below keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// See [`AccountCreated`]
    AccountCreated(AccountCreated),
    /// See [`AccountNameChanged`]
    AccountNameChanged(AccountNameChanged),
    /// See [`AccountClosed`]
    AccountClosed(AccountClosed),
}

impl EventPayload {
    /// Discriminator of the concrete variant
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::AccountCreated(e) => e.event_type(),
            EventPayload::AccountNameChanged(e) => e.event_type(),
            EventPayload::AccountClosed(e) => e.event_type(),
        }
    }

    /// Schema version of the concrete variant
    pub fn schema_version(&self) -> u32 {
        match self {
            EventPayload::AccountCreated(e) => e.schema_version(),
            EventPayload::AccountNameChanged(e) => e.schema_version(),
            EventPayload::AccountClosed(e) => e.schema_version(),
        }
    }

    /// Payload fields as a JSON object
    pub fn to_json(&self) -> EventResult<serde_json::Value> {
        let value = match self {
            EventPayload::AccountCreated(e) => serde_json::to_value(e),
            EventPayload::AccountNameChanged(e) => serde_json::to_value(e),
            EventPayload::AccountClosed(e) => serde_json::to_value(e),
        };
        value.map_err(|e| EventError::malformed(format!("payload not encodable: {e}")))
    }
}

impl From<AccountCreated> for EventPayload {
    fn from(e: AccountCreated) -> Self {
        EventPayload::AccountCreated(e)
    }
}

impl From<AccountNameChanged> for EventPayload {
    fn from(e: AccountNameChanged) -> Self {
        EventPayload::AccountNameChanged(e)
    }
}

impl From<AccountClosed> for EventPayload {
    fn from(e: AccountClosed) -> Self {
        EventPayload::AccountClosed(e)
    }
}

/// Identity and causal metadata shared by every event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    /// Globally unique, never reused
    pub event_id: EventId,
    /// The entity the event mutates
    pub aggregate_id: AggregateId,
    /// The authoring device
    pub device_id: DeviceId,
    /// Wall-clock time at authoring; advisory only, never used for ordering
    pub timestamp: DateTime<Utc>,
    /// Authoring device's clock, already incremented for this event
    pub vector_clock: VectorClock,
}

/// An immutable domain event.
///
/// `PartialEq` compares every field, payload included. Use
/// [`Event::is_same_event`] for identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    metadata: EventMetadata,
    payload: EventPayload,
}

impl Event {
    /// Author a new event, generating its id and capturing the current time.
    ///
    /// `vector_clock` must already carry this device's increment.
    pub fn new(
        aggregate_id: AggregateId,
        device_id: DeviceId,
        vector_clock: VectorClock,
        payload: impl Into<EventPayload>,
    ) -> EventResult<Self> {
        Self::from_parts(
            EventMetadata {
                event_id: EventId::new(),
                aggregate_id,
                device_id,
                timestamp: Utc::now(),
                vector_clock,
            },
            payload.into(),
        )
    }

    /// Author a new event from raw identifier strings.
    ///
    /// Empty or blank identifiers are rejected with
    /// [`EventError::InvalidArgument`].
    pub fn create(
        aggregate_id: &str,
        device_id: &str,
        vector_clock: VectorClock,
        payload: impl Into<EventPayload>,
    ) -> EventResult<Self> {
        Self::new(
            AggregateId::new(aggregate_id)?,
            DeviceId::new(device_id)?,
            vector_clock,
            payload,
        )
    }

    /// Assemble an event from existing metadata (decoding, fixtures)
    pub fn from_parts(metadata: EventMetadata, payload: EventPayload) -> EventResult<Self> {
        if metadata.vector_clock.get(metadata.device_id.as_str()) == 0 {
            return Err(EventError::invalid_argument(
                "vector_clock",
                format!(
                    "clock carries no entry for authoring device {}",
                    metadata.device_id
                ),
            ));
        }
        Ok(Self { metadata, payload })
    }

    /// Split into metadata and payload
    pub fn into_parts(self) -> (EventMetadata, EventPayload) {
        (self.metadata, self.payload)
    }

    /// Shared metadata
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// Concrete payload
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Event identifier
    pub fn event_id(&self) -> EventId {
        self.metadata.event_id
    }

    /// Aggregate identifier
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.metadata.aggregate_id
    }

    /// Authoring device
    pub fn device_id(&self) -> &DeviceId {
        &self.metadata.device_id
    }

    /// Wall-clock authoring time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.metadata.timestamp
    }

    /// Clock snapshot taken at authoring
    pub fn vector_clock(&self) -> &VectorClock {
        &self.metadata.vector_clock
    }

    /// Discriminator of the payload variant
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Identity comparison: true iff both carry the same event id
    pub fn is_same_event(&self, other: &Event) -> bool {
        self.metadata.event_id == other.metadata.event_id
    }
}
