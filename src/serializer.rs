// Copyright 2025 Cowboy AI, LLC.

//! Event codec
//!
//! Events are written as a self-describing JSON envelope:
//!
//! ```json
//! {
//!   "type": "AccountCreated",
//!   "schema_version": 1,
//!   "event_id": "6f1c…",
//!   "aggregate_id": "account-1",
//!   "device_id": "dev-A",
//!   "timestamp": "2024-03-01T12:00:00.123456789Z",
//!   "vector_clock": { "dev-A": 1 },
//!   "payload": { "name": "Checking" }
//! }
//! ```
//!
//! Decoding dispatches on `type` through a static registry, so every variant
//! is known at compile time. A decode either yields a complete event or an
//! error; it never produces a partially populated event.

use crate::config::{CompatibilityMode, SerializerConfig};
use crate::errors::{EventError, EventResult};
use crate::events::{
    AccountClosed, AccountCreated, AccountNameChanged, DomainEvent, Event, EventMetadata,
    EventPayload,
};
use crate::identifiers::{AggregateId, DeviceId, EventId};
use crate::infrastructure::event_versioning::{SchemaEvolution, Upcaster};
use crate::vector_clock::VectorClock;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, warn};

fn default_schema_version() -> u32 {
    1
}

/// Wire form of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EventEnvelope {
    /// Discriminator naming the concrete event type
    #[serde(rename = "type")]
    pub event_type: String,

    /// Payload schema version; envelopes written before versioning was
    /// introduced carry none and are read as version 1
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Event identifier
    pub event_id: EventId,

    /// Aggregate the event mutates
    pub aggregate_id: AggregateId,

    /// Authoring device
    pub device_id: DeviceId,

    /// Authoring wall-clock time (RFC 3339, nanosecond precision)
    pub timestamp: DateTime<Utc>,

    /// Device → counter map
    pub vector_clock: VectorClock,

    /// Variant-specific fields
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build the wire form of an event
    pub fn from_event(event: &Event) -> EventResult<Self> {
        let metadata = event.metadata();
        Ok(Self {
            event_type: event.event_type().to_string(),
            schema_version: event.payload().schema_version(),
            event_id: metadata.event_id,
            aggregate_id: metadata.aggregate_id.clone(),
            device_id: metadata.device_id.clone(),
            timestamp: metadata.timestamp,
            vector_clock: metadata.vector_clock.clone(),
            payload: event.payload().to_json()?,
        })
    }
}

/// Registry entry for one concrete event type
#[derive(Debug, Clone, Copy)]
pub struct EventSchema {
    /// Discriminator
    pub event_type: &'static str,
    /// Current payload schema version
    pub schema_version: u32,
    /// Payload fields known to the current version
    pub fields: &'static [&'static str],
    decode: fn(serde_json::Value) -> EventResult<EventPayload>,
}

impl EventSchema {
    /// Decode a payload object of this type
    pub fn decode(&self, payload: serde_json::Value) -> EventResult<EventPayload> {
        (self.decode)(payload)
    }
}

fn decode_as<E: DomainEvent>(payload: serde_json::Value) -> EventResult<EventPayload> {
    serde_json::from_value::<E>(payload)
        .map(Into::into)
        .map_err(|e| EventError::malformed(format!("invalid {} payload: {e}", E::EVENT_TYPE)))
}

macro_rules! schema {
    ($event:ty) => {
        EventSchema {
            event_type: <$event as DomainEvent>::EVENT_TYPE,
            schema_version: <$event as DomainEvent>::SCHEMA_VERSION,
            fields: <$event as DomainEvent>::FIELDS,
            decode: decode_as::<$event>,
        }
    };
}

static REGISTRY: &[EventSchema] = &[
    schema!(AccountCreated),
    schema!(AccountNameChanged),
    schema!(AccountClosed),
];

/// All registered event schemas
pub fn registered_schemas() -> &'static [EventSchema] {
    REGISTRY
}

/// Look up the schema for a discriminator
pub fn lookup_schema(event_type: &str) -> Option<&'static EventSchema> {
    REGISTRY.iter().find(|s| s.event_type == event_type)
}

/// Encodes and decodes events
#[derive(Debug, Default)]
pub struct EventSerializer {
    config: SerializerConfig,
    evolution: SchemaEvolution,
}

impl EventSerializer {
    /// Create a lenient serializer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer with the given configuration
    pub fn with_config(config: SerializerConfig) -> Self {
        Self {
            config,
            evolution: SchemaEvolution::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Register an upcaster for older payload versions of `event_type`
    pub fn register_upcaster(&mut self, event_type: impl Into<String>, upcaster: Box<dyn Upcaster>) {
        self.evolution.register(event_type, upcaster);
    }

    /// Write an event to `writer`
    pub fn serialize<W: Write>(&self, event: &Event, writer: W) -> EventResult<()> {
        let envelope = EventEnvelope::from_event(event)?;
        let written = if self.config.pretty {
            serde_json::to_writer_pretty(writer, &envelope)
        } else {
            serde_json::to_writer(writer, &envelope)
        };
        written.map_err(|e| {
            if e.is_io() {
                EventError::Io(e.into())
            } else {
                EventError::malformed(e.to_string()).with_context(
                    Some(event.event_id().to_string()),
                    Some(event.aggregate_id().to_string()),
                )
            }
        })?;

        debug!(
            event_id = %event.event_id(),
            aggregate_id = %event.aggregate_id(),
            event_type = event.event_type(),
            "Encoded event"
        );
        Ok(())
    }

    /// Encode an event to bytes
    pub fn encode(&self, event: &Event) -> EventResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(event, &mut buf)?;
        Ok(buf)
    }

    /// Read one event from `reader`, consuming it to the end
    pub fn deserialize<R: Read>(&self, mut reader: R) -> EventResult<Event> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        self.decode(&buf)
    }

    /// Decode an event from bytes
    pub fn decode(&self, bytes: &[u8]) -> EventResult<Event> {
        let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| {
            warn!(len = bytes.len(), error = %e, "Rejected undecodable event bytes");
            EventError::malformed(format!("not a valid event envelope: {e}"))
        })?;
        self.decode_value(value)
    }

    /// Decode an event from an already parsed JSON value
    pub fn decode_value(&self, value: serde_json::Value) -> EventResult<Event> {
        let event_id = string_field(&value, "event_id");
        let aggregate_id = string_field(&value, "aggregate_id");

        self.decode_envelope(value)
            .map_err(|e| {
                let e = e.with_context(event_id.clone(), aggregate_id.clone());
                warn!(
                    event_id = event_id.as_deref().unwrap_or("-"),
                    aggregate_id = aggregate_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Rejected event"
                );
                e
            })
            .inspect(|event| {
                debug!(
                    event_id = %event.event_id(),
                    aggregate_id = %event.aggregate_id(),
                    event_type = event.event_type(),
                    "Decoded event"
                );
            })
    }

    fn decode_envelope(&self, value: serde_json::Value) -> EventResult<Event> {
        let object = value
            .as_object()
            .ok_or_else(|| EventError::malformed("envelope is not a JSON object"))?;

        let event_type = match object.get("type") {
            Some(serde_json::Value::String(t)) => t.clone(),
            Some(_) => return Err(EventError::malformed("`type` is not a string")),
            None => return Err(EventError::malformed("missing `type` discriminator")),
        };

        let schema = lookup_schema(&event_type).ok_or_else(|| EventError::UnknownEventType {
            event_type: event_type.clone(),
            event_id: None,
            aggregate_id: None,
        })?;

        let envelope: EventEnvelope = serde_json::from_value(value)
            .map_err(|e| EventError::malformed(format!("invalid envelope: {e}")))?;

        let payload = self.prepare_payload(schema, &envelope)?;
        let payload = schema.decode(payload)?;

        Event::from_parts(
            EventMetadata {
                event_id: envelope.event_id,
                aggregate_id: envelope.aggregate_id,
                device_id: envelope.device_id,
                timestamp: envelope.timestamp,
                vector_clock: envelope.vector_clock,
            },
            payload,
        )
        .map_err(|e| EventError::malformed(e.to_string()))
    }

    fn prepare_payload(
        &self,
        schema: &EventSchema,
        envelope: &EventEnvelope,
    ) -> EventResult<serde_json::Value> {
        if !envelope.payload.is_object() {
            return Err(EventError::malformed(format!(
                "{} payload is not a JSON object",
                schema.event_type
            )));
        }

        let strict = self.config.compatibility == CompatibilityMode::Strict;

        if envelope.schema_version > schema.schema_version && strict {
            return Err(EventError::malformed(format!(
                "{} schema version {} is newer than supported version {}",
                schema.event_type, envelope.schema_version, schema.schema_version
            )));
        }

        let payload = self.evolution.upcast(
            schema.event_type,
            envelope.payload.clone(),
            envelope.schema_version,
            schema.schema_version,
        )?;

        if strict {
            if let Some(map) = payload.as_object() {
                let unknown: Vec<&str> = map
                    .keys()
                    .map(String::as_str)
                    .filter(|k| !schema.fields.iter().any(|f| f == k))
                    .collect();
                if !unknown.is_empty() {
                    return Err(EventError::malformed(format!(
                        "unknown {} payload fields: {}",
                        schema.event_type,
                        unknown.join(", ")
                    )));
                }
            }
        }

        Ok(payload)
    }

    /// JSON Schema describing the envelope
    pub fn envelope_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EventEnvelope)
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::event_versioning::SimpleUpcaster;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_event(payload: impl Into<EventPayload>) -> Event {
        Event::from_parts(
            EventMetadata {
                event_id: EventId::from_uuid(Uuid::from_u128(0x1234)),
                aggregate_id: AggregateId::new("account-1").unwrap(),
                device_id: DeviceId::new("dev-A").unwrap(),
                timestamp: Utc
                    .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
                    .unwrap()
                    .checked_add_signed(chrono::Duration::nanoseconds(123_456_789))
                    .unwrap(),
                vector_clock: VectorClock::from_entries([("dev-A", 1)]),
            },
            payload.into(),
        )
        .unwrap()
    }

    fn envelope_json(payload: serde_json::Value) -> serde_json::Value {
        let bytes = EventSerializer::new()
            .encode(&sample_event(AccountCreated::new("Checking")))
            .unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["payload"] = payload;
        value
    }

    #[test]
    fn test_envelope_layout() {
        let bytes = EventSerializer::new()
            .encode(&sample_event(AccountCreated::new("Checking")))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "AccountCreated",
                "schema_version": 1,
                "event_id": "00000000-0000-0000-0000-000000001234",
                "aggregate_id": "account-1",
                "device_id": "dev-A",
                "timestamp": "2024-03-01T12:00:00.123456789Z",
                "vector_clock": { "dev-A": 1 },
                "payload": { "name": "Checking" }
            })
        );
    }

    #[test]
    fn test_registry_covers_every_variant() {
        let payloads: Vec<EventPayload> = vec![
            AccountCreated::new("a").into(),
            AccountNameChanged::new("b").into(),
            AccountClosed::new().into(),
        ];
        for payload in payloads {
            let schema = lookup_schema(payload.event_type()).expect("registered");
            assert_eq!(schema.schema_version, payload.schema_version());
            assert_eq!(schema.decode(payload.to_json().unwrap()).unwrap(), payload);
        }
        assert_eq!(registered_schemas().len(), 3);
    }

    #[test]
    fn test_roundtrip_through_reader_and_writer() {
        let serializer = EventSerializer::new();
        let event = sample_event(AccountClosed::new());

        let mut buf = Vec::new();
        serializer.serialize(&event, &mut buf).unwrap();
        let decoded = serializer.deserialize(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_pretty_output_decodes_identically() {
        let pretty = EventSerializer::with_config(SerializerConfig {
            pretty: true,
            ..SerializerConfig::default()
        });
        let event = sample_event(AccountNameChanged::new("Savings"));
        let bytes = pretty.encode(&event).unwrap();
        assert!(bytes.contains(&b'\n'));
        assert_eq!(EventSerializer::new().decode(&bytes).unwrap(), event);
    }

    #[test]
    fn test_unknown_type_carries_context() {
        let mut value = envelope_json(json!({ "name": "x" }));
        value["type"] = json!("BudgetDeleted");

        let err = EventSerializer::new().decode_value(value).unwrap_err();
        assert!(err.is_unknown_event_type());
        assert_eq!(err.event_id(), Some("00000000-0000-0000-0000-000000001234"));
        assert_eq!(err.aggregate_id(), Some("account-1"));
    }

    #[test]
    fn test_missing_discriminator_is_malformed() {
        let mut value = envelope_json(json!({ "name": "x" }));
        value.as_object_mut().unwrap().remove("type");
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_mistyped_payload_field_is_malformed() {
        let value = envelope_json(json!({ "name": 42 }));
        let err = EventSerializer::new().decode_value(value).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("invalid AccountCreated payload"));
    }

    #[test]
    fn test_missing_payload_field_is_malformed() {
        let value = envelope_json(json!({}));
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_non_object_payload_is_malformed() {
        let value = envelope_json(json!(["Checking"]));
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_empty_ids_are_malformed() {
        let mut value = envelope_json(json!({ "name": "x" }));
        value["device_id"] = json!("");
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_clock_without_author_is_malformed() {
        let mut value = envelope_json(json!({ "name": "x" }));
        value["vector_clock"] = json!({ "dev-B": 4 });
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_negative_counter_is_malformed() {
        let mut value = envelope_json(json!({ "name": "x" }));
        value["vector_clock"] = json!({ "dev-A": -1 });
        assert!(EventSerializer::new().decode_value(value).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_fields_lenient_and_strict() {
        let value = envelope_json(json!({ "name": "Checking", "currency": "EUR" }));

        let lenient = EventSerializer::new().decode_value(value.clone()).unwrap();
        assert_eq!(
            lenient.payload(),
            &EventPayload::AccountCreated(AccountCreated::new("Checking"))
        );

        let err = EventSerializer::with_config(SerializerConfig::strict())
            .decode_value(value)
            .unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("currency"));
    }

    #[test]
    fn test_unknown_envelope_fields_are_ignored() {
        let mut value = envelope_json(json!({ "name": "Checking" }));
        value["signature"] = json!("abc");
        let event = EventSerializer::with_config(SerializerConfig::strict())
            .decode_value(value)
            .unwrap();
        assert_eq!(event, sample_event(AccountCreated::new("Checking")));
    }

    #[test]
    fn test_newer_schema_version() {
        let mut value = envelope_json(json!({ "name": "Checking", "icon": "bank" }));
        value["schema_version"] = json!(2);

        let event = EventSerializer::new().decode_value(value.clone()).unwrap();
        assert_eq!(event, sample_event(AccountCreated::new("Checking")));

        let err = EventSerializer::with_config(SerializerConfig::strict())
            .decode_value(value)
            .unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_missing_schema_version_defaults_to_one() {
        let mut value = envelope_json(json!({ "name": "Checking" }));
        value.as_object_mut().unwrap().remove("schema_version");
        let event = EventSerializer::new().decode_value(value).unwrap();
        assert_eq!(event.event_type(), "AccountCreated");
    }

    #[test]
    fn test_older_schema_version_is_upcast() {
        let mut value = envelope_json(json!({ "title": "Cash" }));
        value["schema_version"] = json!(0);

        let mut serializer = EventSerializer::new();
        assert!(serializer.decode_value(value.clone()).unwrap_err().is_malformed());

        serializer.register_upcaster(
            "AccountCreated",
            Box::new(SimpleUpcaster::new(0, 1, |v| {
                Ok(json!({ "name": v["title"].clone() }))
            })),
        );
        let event = serializer.decode_value(value).unwrap();
        assert_eq!(
            event.payload(),
            &EventPayload::AccountCreated(AccountCreated::new("Cash"))
        );
    }

    #[test]
    fn test_envelope_schema_names_all_fields() {
        let schema = serde_json::to_value(EventSerializer::envelope_schema()).unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for field in [
            "type",
            "schema_version",
            "event_id",
            "aggregate_id",
            "device_id",
            "timestamp",
            "vector_clock",
            "payload",
        ] {
            assert!(properties.contains_key(field), "missing {field}");
        }
    }
}
